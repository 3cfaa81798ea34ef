//! MySQL/MariaDB database driver.
//!
//! - [`MysqlReader`]: TAKP source reader (SQLx, read-only sessions)
//! - [`MysqlWriter`]: PEQ destination writer (mysql_async, one transaction
//!   per character)
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod reader;
mod writer;

pub use reader::MysqlReader;
pub use writer::MysqlWriter;
