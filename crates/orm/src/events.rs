//! Model lifecycle hooks
//!
//! Observers implement `ModelObserver`; closure hooks registered on a
//! definition are wrapped in `CallbackObserver` so both kinds run from one
//! ordered list.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::hook_error::HookError;
use crate::model::ModelInstance;

/// Lifecycle extension points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    BeforeSave,
    AfterSave,
    BeforeCreate,
    AfterCreate,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
    AfterFind,
    AfterFetch,
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookEvent::BeforeSave => "before:save",
            HookEvent::AfterSave => "after:save",
            HookEvent::BeforeCreate => "before:create",
            HookEvent::AfterCreate => "after:create",
            HookEvent::BeforeUpdate => "before:update",
            HookEvent::AfterUpdate => "after:update",
            HookEvent::BeforeDelete => "before:delete",
            HookEvent::AfterDelete => "after:delete",
            HookEvent::AfterFind => "after:find",
            HookEvent::AfterFetch => "after:fetch",
        };
        write!(f, "{}", name)
    }
}

#[async_trait]
pub trait ModelObserver: Send + Sync {
    async fn before_create(&self, _model: &mut ModelInstance) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_create(&self, _model: &mut ModelInstance) -> Result<(), HookError> {
        Ok(())
    }

    async fn before_update(&self, _model: &mut ModelInstance) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_update(&self, _model: &mut ModelInstance) -> Result<(), HookError> {
        Ok(())
    }

    async fn before_save(&self, _model: &mut ModelInstance) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_save(&self, _model: &mut ModelInstance) -> Result<(), HookError> {
        Ok(())
    }

    async fn before_delete(&self, _model: &mut ModelInstance) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_delete(&self, _model: &mut ModelInstance) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_find(&self, _model: &mut ModelInstance) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_fetch(&self, _models: &mut [ModelInstance]) -> Result<(), HookError> {
        Ok(())
    }
}

pub type InstanceHook = Arc<dyn Fn(&mut ModelInstance) -> Result<(), HookError> + Send + Sync>;
pub type FetchHook = Arc<dyn Fn(&mut [ModelInstance]) -> Result<(), HookError> + Send + Sync>;

enum Callback {
    Instance(HookEvent, InstanceHook),
    Fetch(FetchHook),
}

/// A single closure bound to one event
pub struct CallbackObserver {
    callback: Callback,
}

impl CallbackObserver {
    pub fn instance(event: HookEvent, hook: InstanceHook) -> Self {
        Self {
            callback: Callback::Instance(event, hook),
        }
    }

    pub fn fetch(hook: FetchHook) -> Self {
        Self {
            callback: Callback::Fetch(hook),
        }
    }

    fn run(&self, event: HookEvent, model: &mut ModelInstance) -> Result<(), HookError> {
        match &self.callback {
            Callback::Instance(bound, hook) if *bound == event => hook(model),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ModelObserver for CallbackObserver {
    async fn before_create(&self, model: &mut ModelInstance) -> Result<(), HookError> {
        self.run(HookEvent::BeforeCreate, model)
    }

    async fn after_create(&self, model: &mut ModelInstance) -> Result<(), HookError> {
        self.run(HookEvent::AfterCreate, model)
    }

    async fn before_update(&self, model: &mut ModelInstance) -> Result<(), HookError> {
        self.run(HookEvent::BeforeUpdate, model)
    }

    async fn after_update(&self, model: &mut ModelInstance) -> Result<(), HookError> {
        self.run(HookEvent::AfterUpdate, model)
    }

    async fn before_save(&self, model: &mut ModelInstance) -> Result<(), HookError> {
        self.run(HookEvent::BeforeSave, model)
    }

    async fn after_save(&self, model: &mut ModelInstance) -> Result<(), HookError> {
        self.run(HookEvent::AfterSave, model)
    }

    async fn before_delete(&self, model: &mut ModelInstance) -> Result<(), HookError> {
        self.run(HookEvent::BeforeDelete, model)
    }

    async fn after_delete(&self, model: &mut ModelInstance) -> Result<(), HookError> {
        self.run(HookEvent::AfterDelete, model)
    }

    async fn after_find(&self, model: &mut ModelInstance) -> Result<(), HookError> {
        self.run(HookEvent::AfterFind, model)
    }

    async fn after_fetch(&self, models: &mut [ModelInstance]) -> Result<(), HookError> {
        match &self.callback {
            Callback::Fetch(hook) => hook(models),
            _ => Ok(()),
        }
    }
}
