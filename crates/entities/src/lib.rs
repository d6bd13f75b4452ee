//! Core entity definitions for the diary study platform.
//!
//! This crate defines the data types shared by every layer: users and their
//! role profiles, courses, apps (time-boxed journaling assignments), the
//! per-app stopword ledger rows and journal entries.

mod app;
mod course;
mod entry;
mod stopword;
mod user;

pub use app::*;
pub use course::*;
pub use entry::*;
pub use stopword::*;
pub use user::*;

/// Identifier of a [`User`] and of its role profile.
pub type UserId = i64;
/// Identifier of a [`Course`].
pub type CourseId = i64;
/// Identifier of an [`App`].
pub type AppId = i64;
/// Identifier of an [`Entry`].
pub type EntryId = i64;
/// Identifier of a [`Stopword`] row.
pub type StopwordId = i64;
