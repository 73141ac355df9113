//! jarshade engine: per-target composition of platform mod archives.
//!
//! The pipeline for one target runs resolve -> load -> relocate ->
//! remap (optional) -> minimize -> compose; see [`pipeline`]. Every stage is
//! a pure transformation over in-memory [`class::ClassFile`] units except the
//! initial archive reads and the final temp-file-and-rename write.

pub mod archive;
pub mod class;
pub mod compose;
pub mod error;
pub mod minimize;
pub mod pipeline;
pub mod relocate;
pub mod remap;
pub mod resolve;

pub use error::{BuildError, RefKind, Stage};
pub use pipeline::{BuildOutcome, TargetBuild, TargetFailure};
