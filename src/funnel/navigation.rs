// SPDX-License-Identifier: MIT

//! Navigation commands and the handle given to step views
//!
//! A [`NavigationHandle`] records the epoch it was issued in. Commands sent
//! through it are queued and only applied by [`Funnel::flush`] while that
//! epoch is still current, so a continuation that resolves after the user
//! already moved elsewhere cannot rewrite the funnel.
//!
//! [`Funnel::flush`]: super::Funnel::flush

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::mpsc::Sender;

use crate::error::FunnelError;

use super::context::partial_from_value;
use super::schema::StepName;

/// Navigation generation counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Epoch(pub u64);

impl Epoch {
    pub(crate) fn next(self) -> Self {
        Epoch(self.0 + 1)
    }
}

/// A single navigation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum NavigationCommand {
    Push {
        step: StepName,
        #[serde(default)]
        data: Map<String, Value>,
    },
    Back,
    Go {
        step: StepName,
    },
    Replace {
        #[serde(default)]
        data: Map<String, Value>,
    },
}

impl NavigationCommand {
    pub fn push(step: impl Into<StepName>, data: Map<String, Value>) -> Self {
        Self::Push {
            step: step.into(),
            data,
        }
    }

    pub fn go(step: impl Into<StepName>) -> Self {
        Self::Go { step: step.into() }
    }

    pub fn replace(data: Map<String, Value>) -> Self {
        Self::Replace { data }
    }
}

fn parse_data(raw: &str) -> Result<Map<String, Value>, FunnelError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(raw)?;
    partial_from_value(value)
        .ok_or_else(|| FunnelError::invalid_command(format!("data must be a JSON object: {}", raw)))
}

/// Compact text form used by the CLI:
/// `push:<step>[:<json>]`, `back`, `go:<step>`, `replace:<json>`
impl FromStr for NavigationCommand {
    type Err = FunnelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (op, rest) = match s.split_once(':') {
            Some((op, rest)) => (op, Some(rest)),
            None => (s, None),
        };

        match (op, rest) {
            ("back", None) => Ok(NavigationCommand::Back),
            ("push", Some(rest)) => {
                let (step, data) = match rest.split_once(':') {
                    Some((step, data)) => (step, parse_data(data)?),
                    None => (rest, Map::new()),
                };
                if step.is_empty() {
                    return Err(FunnelError::invalid_command("push requires a step"));
                }
                Ok(NavigationCommand::push(step, data))
            }
            ("go", Some(step)) if !step.is_empty() => Ok(NavigationCommand::go(step)),
            ("replace", Some(data)) => Ok(NavigationCommand::replace(parse_data(data)?)),
            _ => Err(FunnelError::invalid_command(s)),
        }
    }
}

/// A command tagged with the epoch of the handle that sent it
#[derive(Debug, Clone)]
pub(crate) struct QueuedCommand {
    pub epoch: Epoch,
    pub command: NavigationCommand,
}

/// Capability handed to step views.
///
/// Cloneable and `Send`, so it can be moved into an async continuation.
#[derive(Debug, Clone)]
pub struct NavigationHandle {
    step: StepName,
    epoch: Epoch,
    sender: Sender<QueuedCommand>,
}

impl NavigationHandle {
    pub(crate) fn new(step: StepName, epoch: Epoch, sender: Sender<QueuedCommand>) -> Self {
        Self {
            step,
            epoch,
            sender,
        }
    }

    /// Step this handle was issued for
    pub fn step(&self) -> &StepName {
        &self.step
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn push(&self, step: impl Into<StepName>, data: Map<String, Value>) {
        self.send(NavigationCommand::push(step, data));
    }

    pub fn back(&self) {
        self.send(NavigationCommand::Back);
    }

    pub fn go(&self, step: impl Into<StepName>) {
        self.send(NavigationCommand::go(step));
    }

    pub fn replace(&self, data: Map<String, Value>) {
        self.send(NavigationCommand::replace(data));
    }

    pub fn send(&self, command: NavigationCommand) {
        let queued = QueuedCommand {
            epoch: self.epoch,
            command,
        };
        if self.sender.send(queued).is_err() {
            log::warn!(
                "Navigation from step {} dropped: funnel no longer exists",
                self.step
            );
        }
    }
}
