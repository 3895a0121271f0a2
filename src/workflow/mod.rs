//! Execution of an action list over a collection of items.

pub mod pipeline;
pub mod processors;

pub use pipeline::{Counts, Outcome, Pipeline, Report};
