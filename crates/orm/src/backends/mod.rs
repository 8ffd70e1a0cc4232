//! Database Backend Abstractions
//!
//! This module provides the storage backends (SQLite, PostgreSQL) behind the
//! common pool and transaction traits.

pub mod core;
pub mod postgres;
pub mod sqlite;

use serde::{Deserialize, Serialize};

// Re-export core traits and types
pub use core::*;
pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackendType {
    #[serde(alias = "postgres", alias = "pg")]
    PostgreSQL,
    #[serde(alias = "sqlite3")]
    SQLite,
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::PostgreSQL => write!(f, "postgresql"),
            DatabaseBackendType::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(DatabaseBackendType::PostgreSQL),
            "sqlite" | "sqlite3" => Ok(DatabaseBackendType::SQLite),
            _ => Err(format!("Unsupported database backend: {}", s)),
        }
    }
}
