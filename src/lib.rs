//! # hartodb
//!
//! An embedded, file-backed tabular storage engine with:
//! - Fixed-width binary record slots, one data file per table
//! - Append-only side files for unbounded `ref` text
//! - Lock-free monotonic ids derived from wall-clock nanoseconds
//! - Staged transactions applied on commit
//! - A background worker that compacts tombstones and orphaned ref bytes
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                              │
//! │                 (one handle per database root)               │
//! └──────┬──────────────────┬──────────────────┬────────────────┘
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//!  ┌───────────┐    ┌──────────────┐   ┌──────────────┐
//!  │  Catalog  │    │ Transactions │   │   Cleanup    │
//!  │ (schemas, │    │  (staging)   │   │   worker     │
//!  │  tables)  │    └──────┬───────┘   └──────┬───────┘
//!  └───────────┘           │                  │
//!                          ▼                  ▼
//!                  ┌──────────────────────────────┐
//!                  │ TableManager (per-table lock)│
//!                  └───────┬──────────────┬───────┘
//!                          │              │
//!                          ▼              ▼
//!                   ┌────────────┐  ┌────────────┐
//!                   │   Codec    │  │  Ref data  │
//!                   │ (slots)    │  │ (side file)│
//!                   └────────────┘  └────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use hartodb::{Engine, Field, FieldValues, Value};
//!
//! # fn main() -> hartodb::Result<()> {
//! let db = Engine::open_path(std::path::Path::new("./hartoDB"))?;
//! db.create_schema("s")?;
//! let t = db.create_table("s", "t", vec![Field::string("name", 16), Field::int("age")])?;
//!
//! let mut values = FieldValues::new();
//! values.insert("name".into(), Value::from("Alice"));
//! values.insert("age".into(), Value::Int(30));
//! let record = db.insert(&t, values)?;
//!
//! for row in db.current_records(&t)? {
//!     let row = row?;
//!     assert_eq!(row.id(), record.id());
//! }
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod field;
pub mod codec;
pub mod id;
pub mod catalog;
pub mod refdata;
pub mod table;
pub mod txn;
pub mod cleanup;
pub mod response;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorClass, HartoError, Result};
pub use config::{Config, SyncStrategy};
pub use field::{Constraint, Field, FieldType};
pub use codec::{FieldValues, RefSpan, Value};
pub use catalog::Table;
pub use table::{Record, RecordIter};
pub use txn::{Transaction, TxnState};
pub use cleanup::CompactionStats;
pub use response::{Response, Status};
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of hartodb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
