//! Core abstractions shared by the drivers and the orchestrator.
//!
//! - [`value`]: SQL value representation
//! - [`row`]: ordered rows of values
//! - [`record`]: the source record graph of one character
//! - [`traits`]: source reader, target writer and row sink
//! - [`identifier`]: MySQL identifier quoting

pub mod identifier;
pub mod record;
pub mod row;
pub mod traits;
pub mod value;

pub use record::{CharacterRecord, SourceCharacter, TableRows};
pub use row::Row;
pub use traits::{RowSink, SourceReader, TargetWriter};
pub use value::SqlValue;
