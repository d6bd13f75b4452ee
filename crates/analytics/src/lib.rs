//! Entry analytics for the diary study platform.
//!
//! This crate provides:
//! - The [`TextAnalyticsEngine`] seam every NLP primitive goes through
//! - [`LexicalEngine`], a dependency-free engine good enough to run the
//!   server without an external model
//! - The [`Aggregator`], which fans per-entry work out to the engine and
//!   assembles word clouds, sentiment scatters and sentence highlights
//!
//! Access checks happen before this crate is reached: the aggregator is
//! handed exactly the entries the caller may see.

mod aggregator;
mod engine;
mod error;
mod lexical;
mod limit;
mod stopwords;

pub use aggregator::*;
pub use engine::*;
pub use error::*;
pub use lexical::*;
pub use limit::*;
pub use stopwords::*;
