// SPDX-License-Identifier: MIT

//! Application module - binds a state type to a thread store
//!
//! - `Application` - before/after hooks around a unit of work
//! - `WorkingState` - the state a unit of work mutates

mod lifecycle;
mod working;

pub use lifecycle::{Application, RunContext, UnitOfWork};
pub use working::WorkingState;
