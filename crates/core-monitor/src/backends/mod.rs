//! Durable attempt log backends

#[cfg(feature = "sqlite")]
pub mod sqlite;
