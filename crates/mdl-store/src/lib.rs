//! On-disk run store: per-run, per-node directory layout and resumption.

pub mod meta;
pub mod run_store;

pub use meta::{META_FILE_NAME, NodeMeta, OUTPUT_FILE_NAME, RETAIN_SENTINEL_FILE_NAME};
pub use run_store::RunStore;
