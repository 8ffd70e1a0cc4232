use std::sync::Arc;

use tracing::trace;

use crate::events::{HookEvent, ModelObserver};
use crate::hook_error::HookError;
use crate::model::ModelInstance;

/// Ordered observer list of one model. Observers run in registration order
/// and the first failure stops the chain.
#[derive(Clone, Default)]
pub struct ModelLifecycle {
    observers: Vec<Arc<dyn ModelObserver>>,
}

impl ModelLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_observer(&mut self, observer: Arc<dyn ModelObserver>) {
        self.observers.push(observer);
    }

    pub fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub async fn trigger(&self, event: HookEvent, model: &mut ModelInstance) -> Result<(), HookError> {
        if self.observers.is_empty() {
            return Ok(());
        }
        trace!(model = %model.model_name(), %event, "running hooks");

        for observer in &self.observers {
            match event {
                HookEvent::BeforeCreate => observer.before_create(model).await?,
                HookEvent::AfterCreate => observer.after_create(model).await?,
                HookEvent::BeforeUpdate => observer.before_update(model).await?,
                HookEvent::AfterUpdate => observer.after_update(model).await?,
                HookEvent::BeforeSave => observer.before_save(model).await?,
                HookEvent::AfterSave => observer.after_save(model).await?,
                HookEvent::BeforeDelete => observer.before_delete(model).await?,
                HookEvent::AfterDelete => observer.after_delete(model).await?,
                HookEvent::AfterFind => observer.after_find(model).await?,
                HookEvent::AfterFetch => observer.after_fetch(std::slice::from_mut(model)).await?,
            }
        }
        Ok(())
    }

    pub async fn trigger_fetch(&self, models: &mut [ModelInstance]) -> Result<(), HookError> {
        for observer in &self.observers {
            observer.after_fetch(models).await?;
        }
        Ok(())
    }
}
