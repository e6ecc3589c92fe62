//! Database Backend Abstractions
//!
//! The handle the migrator borrows from the host application, plus the
//! PostgreSQL implementation.

pub mod core;
pub mod postgres;

pub use core::*;
pub use postgres::{DatabasePoolConfig, PostgresPool};
