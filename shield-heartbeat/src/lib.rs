//! shield-heartbeat library - daily heartbeat survey counts
//!
//! Classifies heartbeat pings into lifecycle states, counts them per survey
//! and submission date, merges the counts into the cumulative published
//! dataset, and republishes JSON and CSV artifacts.

pub mod aggregator;
pub mod classifier;
pub mod merger;
pub mod pipeline;
pub mod publisher;
pub mod serializer;
pub mod source;
pub mod storage;
pub mod tree;

pub use aggregator::CountTable;
pub use classifier::{classify, ClassificationKey, Status};
pub use pipeline::{Pipeline, RunSummary};
pub use publisher::{PublishReport, Publisher};
pub use tree::{build_trees, BatchTrees, CountTree};
