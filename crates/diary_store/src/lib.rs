//! Storage for the diary study platform.
//!
//! This crate provides the [`DiaryStore`] abstraction over users, courses,
//! apps, memberships, stopwords and entries. It ships an in-memory store
//! (tests and single-process mode) and a SQLite store.
//!
//! Every method is atomic. Enrollment and stopword reconciliation are
//! check-and-write operations executed under a single lock or transaction,
//! and [`DiaryStore::load_chain`] reads the course/app/entry hierarchy from
//! one consistent snapshot.

mod error;
mod ledger;
mod memory;
mod snapshot;
mod sqlite;
mod traits;

pub use error::*;
pub use ledger::*;
pub use memory::*;
pub use snapshot::*;
pub use sqlite::*;
pub use traits::*;
