//! Hermetic/passthrough command wrapper standing in for Nix integration.

pub mod wrapper;

pub use wrapper::{CommandWrapper, HermeticWrapper, PassthroughWrapper, select_wrapper};
