//! Periodic inference collection
//!
//! The collection loop is the only writer of the metrics registry. Each tick
//! it draws a feature record, runs the model once, and records the outcome.

mod r#loop;


pub use r#loop::{
    CollectionConfig, CollectionLoop, CollectionLoopBuilder, CycleOutcome,
    DEFAULT_COLLECTION_INTERVAL,
};
