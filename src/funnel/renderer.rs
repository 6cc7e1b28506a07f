// SPDX-License-Identifier: MIT

//! Step renderer: picks the view registered for the current step

use serde_json::{Map, Value};
use std::cell::Cell;
use std::fmt;

use crate::session::Session;

use super::navigation::NavigationHandle;
use super::observer::{Diagnostic, DiagnosticKind};
use super::schema::StepName;

/// Everything a step view receives
pub struct RenderProps<'a> {
    pub step: &'a StepName,
    pub context: &'a Map<String, Value>,
    pub history: &'a [StepName],
    pub nav: NavigationHandle,
    pub session: Option<&'a Session>,
}

type RenderFn<R> = Box<dyn Fn(RenderProps<'_>) -> R>;

struct StepView<R> {
    name: StepName,
    render: RenderFn<R>,
}

/// Outcome of rendering the current step
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered<R> {
    /// Output of the matching view
    Step(R),
    /// No view registered for `step`
    Missing { step: StepName },
}

impl<R> Rendered<R> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Rendered::Missing { .. })
    }

    pub fn output(&self) -> Option<&R> {
        match self {
            Rendered::Step(r) => Some(r),
            Rendered::Missing { .. } => None,
        }
    }

    /// Resolve to an output, building a fallback for a missing view
    pub fn into_output(self, fallback: impl FnOnce(&StepName) -> R) -> R {
        match self {
            Rendered::Step(r) => r,
            Rendered::Missing { step } => fallback(&step),
        }
    }
}

/// Registry of step views producing `R`
pub struct StepRenderer<R> {
    views: Vec<StepView<R>>,
    diagnostics: Vec<Diagnostic>,
    // diagnostics already handed to a funnel
    reported: Cell<usize>,
}

impl<R> StepRenderer<R> {
    pub fn new() -> Self {
        Self {
            views: Vec::new(),
            diagnostics: Vec::new(),
            reported: Cell::new(0),
        }
    }

    /// Builder-style registration
    pub fn step(
        mut self,
        name: impl Into<StepName>,
        render: impl Fn(RenderProps<'_>) -> R + 'static,
    ) -> Self {
        self.register(name, render);
        self
    }

    /// Register a view. A second view for the same name is ignored; the
    /// first registration keeps rendering. Returns whether it was added.
    pub fn register(
        &mut self,
        name: impl Into<StepName>,
        render: impl Fn(RenderProps<'_>) -> R + 'static,
    ) -> bool {
        let name = name.into();
        if self.views.iter().any(|v| v.name == name) {
            let diagnostic = Diagnostic::new(
                DiagnosticKind::DuplicateRenderer,
                Some(name.clone()),
                format!("Step \"{}\" registered twice; keeping the first view", name),
            );
            diagnostic.log();
            self.diagnostics.push(diagnostic);
            return false;
        }
        self.views.push(StepView {
            name,
            render: Box::new(render),
        });
        true
    }

    pub fn has_view(&self, step: &str) -> bool {
        self.views.iter().any(|v| v.name == step)
    }

    pub fn registered_steps(&self) -> Vec<&StepName> {
        self.views.iter().map(|v| &v.name).collect()
    }

    /// Registration problems seen so far
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Registration problems not yet forwarded to a funnel
    pub(crate) fn take_unreported(&self) -> &[Diagnostic] {
        let start = self.reported.replace(self.diagnostics.len());
        &self.diagnostics[start..]
    }

    /// Invoke the view registered for `props.step`
    pub fn render(&self, props: RenderProps<'_>) -> Rendered<R> {
        match self.views.iter().find(|v| v.name == *props.step) {
            Some(view) => Rendered::Step((view.render)(props)),
            None => Rendered::Missing {
                step: props.step.clone(),
            },
        }
    }
}

impl<R> Default for StepRenderer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for StepRenderer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRenderer")
            .field("steps", &self.registered_steps())
            .finish()
    }
}
