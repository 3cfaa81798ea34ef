//! # takp-peq-transfer
//!
//! Copy one EverQuest character from a TAKP (EQMacEmu) schema into a PEQ
//! (EQEmu) schema.
//!
//! The transfer reads the character, its account and every dependent row
//! from the source, renames and defaults columns for the PEQ layout,
//! renumbers inventory slots, and writes the whole graph to the destination
//! in one transaction with freshly assigned ids:
//!
//! - **Read-only source**: source sessions run in read-only transaction mode
//! - **Fail-closed**: an existing destination character is never touched
//! - **Atomic**: a failed insert rolls back every row of the character
//! - **Dry run**: build the full plan without writing
//!
//! ## Example
//!
//! ```rust,no_run
//! use takp_peq_transfer::{Config, Orchestrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let summary = orchestrator.run("Fippy", false).await?;
//!     println!("Copied {} rows", summary.dependent_rows);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod mapping;
pub mod orchestrator;
pub mod plan;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig};
pub use core::{CharacterRecord, Row, RowSink, SourceReader, SqlValue, TargetWriter};
pub use drivers::{MemoryDatabase, MemorySource, MemoryTarget, MysqlReader, MysqlWriter};
pub use error::{Result, TransferError, EXIT_USAGE_ERROR};
pub use orchestrator::{MigrationSummary, Orchestrator};
pub use plan::{TransferPlan, WriteOutcome};
