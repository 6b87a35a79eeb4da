// SPDX-License-Identifier: MIT

pub mod app;
pub mod config;
pub mod error;
pub mod state;
pub mod thread;
