//! Database driver implementations.
//!
//! - [`mysql`]: TAKP reader over SQLx and PEQ writer over mysql_async
//! - [`memory`]: in-memory source and destination for tests and rehearsals
//!
//! Each driver implements [`SourceReader`](crate::core::SourceReader) and/or
//! [`TargetWriter`](crate::core::TargetWriter); the orchestrator only sees
//! the traits.

pub mod memory;
pub mod mysql;

pub use memory::{MemoryDatabase, MemorySource, MemoryTarget};
pub use mysql::{MysqlReader, MysqlWriter};
