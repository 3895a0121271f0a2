//! Batch image processing driven by a small action language.
//!
//! Actions are written as `[!]name[:value]` tokens. Filters decide which
//! images survive, modifiers transform the survivors in order.

pub mod actions;
pub mod common;
pub mod config;
pub mod grammar;
pub mod item;
pub mod utils;
pub mod workflow;

pub use actions::{Action, ActionContext, parse_actions, parse_token};
pub use common::errors::{ActionError, ActionResult};
pub use item::Item;
pub use workflow::{Outcome, Pipeline, Report};
