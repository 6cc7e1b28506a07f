// SPDX-License-Identifier: MIT

//! Funnel observers and diagnostics
//!
//! Configuration mistakes inside a running funnel are reported here instead
//! of being raised: the host keeps rendering and the developer sees the log.

use serde::Serialize;
use serde_json::{Map, Value};

use super::schema::StepName;

/// Kind of a recorded diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Navigation to a step outside the funnel
    UnknownStep,
    /// `back()` on the first step
    BackAtRoot,
    /// No view registered for the current step
    MissingRenderer,
    /// Two views registered under one step name
    DuplicateRenderer,
    /// Queued navigation issued in an older epoch
    StaleNavigation,
    /// Persisted state could not be restored
    RestoreFailed,
}

/// A non-fatal problem noticed by the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub step: Option<StepName>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, step: Option<StepName>, message: impl Into<String>) -> Self {
        Self {
            kind,
            step,
            message: message.into(),
        }
    }

    /// Emit through the `log` facade at the level matching the kind
    pub fn log(&self) {
        match self.kind {
            DiagnosticKind::BackAtRoot
            | DiagnosticKind::StaleNavigation
            | DiagnosticKind::DuplicateRenderer
            | DiagnosticKind::RestoreFailed => log::warn!("[funnel] {}", self.message),
            DiagnosticKind::UnknownStep | DiagnosticKind::MissingRenderer => {
                log::error!("[funnel] {}", self.message)
            }
        }
    }
}

/// Observer notified after every state change, typically to schedule a re-render
pub trait FunnelObserver {
    fn on_step_changed(&self, from: &StepName, to: &StepName, history: &[StepName]);
    fn on_context_changed(&self, step: &StepName, context: &Map<String, Value>);
    fn on_reset(&self, step: &StepName);
    fn on_diagnostic(&self, diagnostic: &Diagnostic);
}

/// No-op observer
pub struct NoOpObserver;

impl FunnelObserver for NoOpObserver {
    fn on_step_changed(&self, _from: &StepName, _to: &StepName, _history: &[StepName]) {}
    fn on_context_changed(&self, _step: &StepName, _context: &Map<String, Value>) {}
    fn on_reset(&self, _step: &StepName) {}
    fn on_diagnostic(&self, _diagnostic: &Diagnostic) {}
}

/// Log-based observer
pub struct LoggingObserver;

impl FunnelObserver for LoggingObserver {
    fn on_step_changed(&self, from: &StepName, to: &StepName, history: &[StepName]) {
        log::info!("Step changed: {} -> {} (history: {:?})", from, to, history);
    }

    fn on_context_changed(&self, step: &StepName, context: &Map<String, Value>) {
        log::debug!("Context updated at {}: {} fields", step, context.len());
    }

    fn on_reset(&self, step: &StepName) {
        log::info!("Funnel reset to {}", step);
    }

    fn on_diagnostic(&self, diagnostic: &Diagnostic) {
        log::debug!("Diagnostic recorded: {:?}", diagnostic.kind);
    }
}
