//! # AlgoPulse Dispatch
//!
//! The daily pipeline: list subscribers, group them, claim or generate
//! content once per group, then mail every member.
//!
//! - `bank`: claim-once question bank with on-demand refill
//! - `grouper`: pure bucketing of subscribers per run mode
//! - `render`: HTML email bodies
//! - `solution`: solution prompt and response parsing
//! - `coordinator`: one run, end to end, with per-group isolation

pub mod bank;
pub mod coordinator;
pub mod grouper;
pub mod render;
pub mod solution;
pub mod summary;

#[cfg(test)]
pub(crate) mod testing;

pub use bank::{BucketStats, ItemBank};
pub use coordinator::Coordinator;
pub use grouper::{Groups, SolutionKey, group_for_challenge, group_for_solution};
pub use summary::{DispatchFailure, RunSummary};
