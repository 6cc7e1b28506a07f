// SPDX-License-Identifier: MIT

//! Step sequencer: current step plus the history of visited steps

use crate::error::{FunnelError, Result};

use super::schema::StepName;

/// Result of a forward navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Target was already the current step
    Stayed,
    /// Current step changed
    Moved { from: StepName, to: StepName },
}

/// Tracks the current step and a non-empty history whose last entry is
/// always the current step.
#[derive(Debug, Clone)]
pub struct StepSequencer {
    steps: Vec<StepName>,
    current: StepName,
    history: Vec<StepName>,
}

impl StepSequencer {
    pub fn new(steps: Vec<StepName>, initial: StepName) -> Result<Self> {
        if !steps.contains(&initial) {
            return Err(FunnelError::InvalidInitialStep(initial.to_string()));
        }
        Ok(Self {
            steps,
            history: vec![initial.clone()],
            current: initial,
        })
    }

    pub fn current(&self) -> &StepName {
        &self.current
    }

    pub fn history(&self) -> &[StepName] {
        &self.history
    }

    pub fn steps(&self) -> &[StepName] {
        &self.steps
    }

    pub fn can_go_back(&self) -> bool {
        self.history.len() > 1
    }

    pub fn contains(&self, step: &str) -> bool {
        self.steps.iter().any(|s| s == step)
    }

    pub fn index_of(&self, step: &str) -> Option<usize> {
        self.steps.iter().position(|s| s == step)
    }

    pub fn current_index(&self) -> usize {
        // current is validated on every assignment
        self.index_of(self.current.as_str()).unwrap_or(0)
    }

    fn resolve(&self, step: &str) -> Result<StepName> {
        self.steps
            .iter()
            .find(|s| *s == step)
            .cloned()
            .ok_or_else(|| FunnelError::unknown_step(step))
    }

    /// Move to `step`, truncating history if it was visited before.
    pub fn push(&mut self, step: &str) -> Result<Transition> {
        let target = self.resolve(step)?;
        if target == self.current {
            return Ok(Transition::Stayed);
        }

        match self.history.iter().position(|s| *s == target) {
            Some(existing) => self.history.truncate(existing + 1),
            None => self.history.push(target.clone()),
        }

        let from = std::mem::replace(&mut self.current, target.clone());
        Ok(Transition::Moved { from, to: target })
    }

    /// Pop the current step. Returns `None` when already at the first entry.
    pub fn back(&mut self) -> Option<Transition> {
        if !self.can_go_back() {
            return None;
        }
        let from = self.history.pop()?;
        let to = self.history.last()?.clone();
        if from == to {
            return Some(Transition::Stayed);
        }
        self.current = to.clone();
        Some(Transition::Moved { from, to })
    }

    /// Jump to `step` and append it to history without truncation or dedup.
    /// Jumping to the current step is a no-op.
    pub fn go(&mut self, step: &str) -> Result<Transition> {
        let target = self.resolve(step)?;
        if target == self.current {
            return Ok(Transition::Stayed);
        }
        self.history.push(target.clone());
        let from = std::mem::replace(&mut self.current, target.clone());
        Ok(Transition::Moved { from, to: target })
    }

    /// Restore a previously persisted position.
    ///
    /// Unknown steps anywhere in the position reject it and leave the
    /// sequencer untouched. History that does not end in `current` is
    /// replaced by `[current]`.
    pub fn restore(&mut self, current: &str, history: &[StepName]) -> Result<()> {
        let current = self.resolve(current)?;
        if let Some(unknown) = history.iter().find(|s| !self.contains(s.as_str())) {
            return Err(FunnelError::unknown_step(unknown.as_str()));
        }
        self.history = if history.last() == Some(&current) {
            history.to_vec()
        } else {
            vec![current.clone()]
        };
        self.current = current;
        Ok(())
    }

    /// Back to `initial` with a single-entry history
    pub fn reset(&mut self, initial: StepName) {
        self.history = vec![initial.clone()];
        self.current = initial;
    }
}
