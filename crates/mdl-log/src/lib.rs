//! Run-progress logger backends: simple, live-table, and CI-group
//! presentations over the [`mdl_exec::RunObserver`] seam.
//!
//! This is deliberately separate from `tracing`/`RUST_LOG`: that pair
//! covers internal diagnostic logging (see `mdl`'s `main.rs`), while this
//! crate covers the user-facing narration of a run's progress selected by
//! `--verbose`/`--simple-log`/`--github-actions`/`--no-color`.

pub mod ci_group;
pub mod live_table;
pub mod select;
pub mod simple;
pub mod style;

pub use ci_group::CiGroupLogger;
pub use live_table::LiveTableLogger;
pub use select::{LoggerOptions, select_logger};
pub use simple::SimpleLogger;
pub use style::Style;
