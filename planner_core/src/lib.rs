#![forbid(unsafe_code)]

//! Core domain model and business logic for the workout planner.
//!
//! This crate provides:
//! - Domain types (plans, weeks, days, sessions, moveframes, movelaps)
//! - Ordering, status, work-role, and storage-zone rules
//! - Copy / move / switch reorganization across the hierarchy
//! - Persistence (memory and file stores, operation journal)
//! - Identity and access checks

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod repository;
pub mod zone;
pub mod ordering;
pub mod status;
pub mod work_role;
pub mod identity;
pub mod hierarchy;
pub mod coordinator;
pub mod totals;
pub mod store;
pub mod journal;
pub mod planner;

// Re-export commonly used types
pub use error::{Error, ErrorKind, Result};
pub use types::*;
pub use config::Config;
pub use identity::{IdentityProvider, StaticTokens};
pub use journal::{JournalEntry, JsonlJournal, OperationSink};
pub use planner::Planner;
pub use repository::{MemoryRepository, Repository};
pub use store::{FileStore, MemoryStore, UnitOfWork};
pub use totals::{SportTotals, Totals};
