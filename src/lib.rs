// SPDX-License-Identifier: MIT

//! funnel-rs: a typed, history-aware multi-step wizard engine

pub mod config;
pub mod error;
pub mod funnel;
pub mod session;

pub use error::{FunnelError, Result};
