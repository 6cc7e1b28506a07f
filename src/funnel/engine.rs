// SPDX-License-Identifier: MIT

//! Funnel engine
//!
//! Ties the step sequencer, the context store and the persistence binding
//! together behind `push`, `back`, `go` and `replace`. Every operation is a
//! synchronous in-memory mutation followed by an observer notification.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::config::FunnelConfig;
use crate::error::{FunnelError, Result};
use crate::session::Session;

use super::context::{ContextStore, SubscriptionId};
use super::navigation::{Epoch, NavigationCommand, NavigationHandle, QueuedCommand};
use super::observer::{Diagnostic, DiagnosticKind, FunnelObserver, NoOpObserver};
use super::persistence::{PersistedState, PersistenceBinding};
use super::progress::{Progress, StepStatus};
use super::renderer::{RenderProps, Rendered, StepRenderer};
use super::schema::{FunnelDefinition, StepName};
use super::sequencer::{StepSequencer, Transition};

/// Read-only snapshot of a funnel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelState {
    pub current_step: StepName,
    pub context: Map<String, Value>,
    pub history: Vec<StepName>,
    pub can_go_back: bool,
    pub steps: Vec<StepName>,
}

/// Builder for [`Funnel`]
pub struct FunnelBuilder {
    definition: FunnelDefinition,
    initial_step: Option<StepName>,
    initial_context: Map<String, Value>,
    cleanup_on_back: bool,
    binding: Option<Box<dyn PersistenceBinding>>,
    observer: Box<dyn FunnelObserver>,
    session: Option<Session>,
}

impl FunnelBuilder {
    pub fn new(definition: FunnelDefinition) -> Self {
        Self {
            definition,
            initial_step: None,
            initial_context: Map::new(),
            cleanup_on_back: true,
            binding: None,
            observer: Box::new(NoOpObserver),
            session: None,
        }
    }

    /// Starting step; defaults to the first step of the definition
    pub fn initial_step(mut self, step: impl Into<StepName>) -> Self {
        self.initial_step = Some(step.into());
        self
    }

    pub fn initial_context(mut self, context: Map<String, Value>) -> Self {
        self.initial_context = context;
        self
    }

    /// Drop fields of later steps when navigating back (on by default)
    pub fn cleanup_on_back(mut self, enabled: bool) -> Self {
        self.cleanup_on_back = enabled;
        self
    }

    pub fn binding(mut self, binding: impl PersistenceBinding + 'static) -> Self {
        self.binding = Some(Box::new(binding));
        self
    }

    pub fn observer(mut self, observer: impl FunnelObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Apply engine settings from the environment configuration
    pub fn config(mut self, config: &FunnelConfig) -> Self {
        self.cleanup_on_back = config.cleanup_on_back;
        self
    }

    pub fn build(self) -> Result<Funnel> {
        self.definition.validate()?;

        let initial_step = match self.initial_step {
            Some(step) => step,
            None => self
                .definition
                .steps
                .first()
                .map(|s| s.name.clone())
                .ok_or_else(|| FunnelError::EmptyDefinition(self.definition.name.clone()))?,
        };
        let sequencer = StepSequencer::new(self.definition.step_names(), initial_step.clone())?;
        let (tx, rx) = mpsc::channel();

        let mut funnel = Funnel {
            context: ContextStore::new(self.initial_context.clone()),
            definition: self.definition,
            sequencer,
            initial_step,
            initial_context: self.initial_context,
            cleanup_on_back: self.cleanup_on_back,
            epoch: Epoch::default(),
            tx,
            rx,
            binding: self.binding,
            observer: self.observer,
            session: self.session,
            diagnostics: Vec::new(),
        };
        funnel.restore();

        log::info!(
            "Funnel '{}' started at {} ({} steps)",
            funnel.definition.name,
            funnel.current_step(),
            funnel.definition.len()
        );
        Ok(funnel)
    }
}

/// A running funnel
pub struct Funnel {
    definition: FunnelDefinition,
    sequencer: StepSequencer,
    context: ContextStore,
    initial_step: StepName,
    initial_context: Map<String, Value>,
    cleanup_on_back: bool,
    epoch: Epoch,
    tx: Sender<QueuedCommand>,
    rx: Receiver<QueuedCommand>,
    binding: Option<Box<dyn PersistenceBinding>>,
    observer: Box<dyn FunnelObserver>,
    session: Option<Session>,
    diagnostics: Vec<Diagnostic>,
}

impl Funnel {
    pub fn builder(definition: FunnelDefinition) -> FunnelBuilder {
        FunnelBuilder::new(definition)
    }

    pub fn definition(&self) -> &FunnelDefinition {
        &self.definition
    }

    pub fn current_step(&self) -> &StepName {
        self.sequencer.current()
    }

    pub fn history(&self) -> &[StepName] {
        self.sequencer.history()
    }

    pub fn context(&self) -> &Map<String, Value> {
        self.context.get()
    }

    pub fn context_store(&self) -> &ContextStore {
        &self.context
    }

    pub fn can_go_back(&self) -> bool {
        self.sequencer.can_go_back()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn cleanup_on_back(&self) -> bool {
        self.cleanup_on_back
    }

    /// Binding the funnel saves to after every change
    pub fn binding(&self) -> Option<&dyn PersistenceBinding> {
        self.binding.as_deref()
    }

    pub fn state(&self) -> FunnelState {
        FunnelState {
            current_step: self.current_step().clone(),
            context: self.context().clone(),
            history: self.history().to_vec(),
            can_go_back: self.can_go_back(),
            steps: self.sequencer.steps().to_vec(),
        }
    }

    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            step: self.current_step().clone(),
            context: self.context().clone(),
            history: self.history().to_vec(),
        }
    }

    /// Move to `step`, merging `data` into the context.
    ///
    /// Pushing the current step only merges. Pushing a visited step
    /// truncates history at that step. An unknown step leaves the funnel
    /// untouched, records a diagnostic and returns `UnknownStep`.
    pub fn push(&mut self, step: &str, data: Map<String, Value>) -> Result<()> {
        if !self.sequencer.contains(step) {
            return Err(self.reject_unknown(step, "push"));
        }

        let merged = !data.is_empty();
        self.context.merge(data);
        let transition = self.sequencer.push(step)?;

        self.after_change(transition, merged);
        Ok(())
    }

    /// Return to the previous step. No-op at the first history entry.
    pub fn back(&mut self) -> bool {
        let Some(transition) = self.sequencer.back() else {
            let diagnostic = Diagnostic::new(
                DiagnosticKind::BackAtRoot,
                Some(self.current_step().clone()),
                "Cannot go back: already at the first step",
            );
            self.record(diagnostic);
            return false;
        };

        let mut cleaned = false;
        if self.cleanup_on_back {
            let index = self.sequencer.current_index();
            let removed = self
                .context
                .remove_fields(self.definition.fields_after(index));
            if !removed.is_empty() {
                log::debug!("Dropped fields of later steps: {:?}", removed);
                cleaned = true;
            }
        }

        self.after_change(transition, cleaned);
        true
    }

    /// Jump to `step` without merging data; history is appended as-is
    pub fn go(&mut self, step: &str) -> Result<()> {
        if !self.sequencer.contains(step) {
            return Err(self.reject_unknown(step, "go"));
        }
        let transition = self.sequencer.go(step)?;
        self.after_change(transition, false);
        Ok(())
    }

    /// Merge `data` without moving
    pub fn replace(&mut self, data: Map<String, Value>) {
        if data.is_empty() {
            return;
        }
        self.context.merge(data);
        self.after_change(Transition::Stayed, true);
    }

    /// Apply a single command
    pub fn apply(&mut self, command: NavigationCommand) -> Result<()> {
        match command {
            NavigationCommand::Push { step, data } => self.push(step.as_str(), data),
            NavigationCommand::Back => {
                self.back();
                Ok(())
            }
            NavigationCommand::Go { step } => self.go(step.as_str()),
            NavigationCommand::Replace { data } => {
                self.replace(data);
                Ok(())
            }
        }
    }

    /// Handle bound to the current step and epoch
    pub fn handle(&self) -> NavigationHandle {
        NavigationHandle::new(self.current_step().clone(), self.epoch, self.tx.clone())
    }

    /// Apply queued commands in the order they were sent.
    ///
    /// Commands issued in an epoch other than the one current when the
    /// flush starts are discarded. Returns how many commands were applied.
    pub fn flush(&mut self) -> usize {
        let batch_epoch = self.epoch;
        let mut applied = 0;

        while let Ok(queued) = self.rx.try_recv() {
            if queued.epoch != batch_epoch {
                let diagnostic = Diagnostic::new(
                    DiagnosticKind::StaleNavigation,
                    Some(self.current_step().clone()),
                    format!(
                        "Discarding {:?} issued in epoch {} (current {})",
                        queued.command, queued.epoch.0, batch_epoch.0
                    ),
                );
                self.record(diagnostic);
                continue;
            }
            // failures are already recorded as diagnostics
            if self.apply(queued.command).is_ok() {
                applied += 1;
            }
        }

        applied
    }

    /// Render the current step with `renderer`.
    ///
    /// Registration problems of `renderer` are recorded on the first render
    /// that sees them. Rendering a missing step repeatedly records it once.
    pub fn render<R>(&mut self, renderer: &StepRenderer<R>) -> Rendered<R> {
        for diagnostic in renderer.take_unreported() {
            self.record(diagnostic.clone());
        }

        let rendered = renderer.render(RenderProps {
            step: self.sequencer.current(),
            context: self.context.get(),
            history: self.sequencer.history(),
            nav: self.handle(),
            session: self.session.as_ref(),
        });

        if let Rendered::Missing { step } = &rendered {
            let diagnostic = Diagnostic::new(
                DiagnosticKind::MissingRenderer,
                Some(step.clone()),
                format!("Step \"{}\" has no registered view", step),
            );
            if self.diagnostics.last() != Some(&diagnostic) {
                self.record(diagnostic);
            }
        }
        rendered
    }

    /// Steps of the definition without a view in `renderer`
    pub fn unrendered_steps<R>(&self, renderer: &StepRenderer<R>) -> Vec<StepName> {
        self.sequencer
            .steps()
            .iter()
            .filter(|s| !renderer.has_view(s.as_str()))
            .cloned()
            .collect()
    }

    /// Required-field check for the current step
    pub fn check_context(&self) -> Result<()> {
        self.definition
            .check_context(self.current_step().as_str(), self.context())
    }

    pub fn progress(&self) -> Progress {
        Progress::new(self.sequencer.current_index() + 1, self.sequencer.steps().len())
    }

    pub fn step_statuses(&self) -> Vec<(StepName, StepStatus)> {
        let current = self.sequencer.current_index();
        self.sequencer
            .steps()
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), StepStatus::of(i, current)))
            .collect()
    }

    pub fn subscribe(&mut self, callback: impl Fn(&Map<String, Value>) + 'static) -> SubscriptionId {
        self.context.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.context.unsubscribe(id)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Back to the initial step and context; pending commands are dropped
    pub fn reset(&mut self) {
        self.sequencer.reset(self.initial_step.clone());
        self.context.reset(self.initial_context.clone());
        self.epoch = self.epoch.next();
        while self.rx.try_recv().is_ok() {}
        if let Some(binding) = self.binding.as_mut() {
            binding.clear();
        }
        self.observer.on_reset(&self.initial_step);
    }

    /// Reset the funnel and hand back the ended session
    pub fn end_session(&mut self) -> Option<Session> {
        self.reset();
        self.session.take().map(Session::end)
    }

    fn after_change(&mut self, transition: Transition, context_changed: bool) {
        if let Transition::Moved { from, to } = &transition {
            self.epoch = self.epoch.next();
            self.observer
                .on_step_changed(from, to, self.sequencer.history());
        }
        if context_changed {
            self.observer
                .on_context_changed(self.sequencer.current(), self.context.get());
        }
        if transition != Transition::Stayed || context_changed {
            self.persist();
        }
    }

    fn persist(&mut self) {
        let state = self.persisted_state();
        if let Some(binding) = self.binding.as_mut() {
            binding.save(&state);
        }
    }

    fn restore(&mut self) {
        let state = match self.binding.as_ref().and_then(|b| b.load()) {
            None => return,
            Some(Ok(state)) => state,
            Some(Err(e)) => {
                let diagnostic = Diagnostic::new(
                    DiagnosticKind::RestoreFailed,
                    None,
                    format!("Ignoring unreadable persisted state: {}", e),
                );
                self.record(diagnostic);
                return;
            }
        };

        if let Err(e) = self.sequencer.restore(state.step.as_str(), &state.history) {
            let diagnostic = Diagnostic::new(
                DiagnosticKind::RestoreFailed,
                Some(state.step.clone()),
                format!("Ignoring persisted state: {}", e),
            );
            self.record(diagnostic);
            return;
        }
        self.context.reset(state.context);
        log::info!("Restored funnel at step {}", self.current_step());
    }

    fn reject_unknown(&mut self, step: &str, op: &str) -> FunnelError {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::UnknownStep,
            Some(StepName::from(step)),
            format!(
                "{} to unknown step \"{}\" ignored; staying at {}",
                op,
                step,
                self.current_step()
            ),
        );
        self.record(diagnostic);
        FunnelError::unknown_step(step)
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.observer.on_diagnostic(&diagnostic);
        self.diagnostics.push(diagnostic);
    }
}

impl fmt::Debug for Funnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Funnel")
            .field("name", &self.definition.name)
            .field("current_step", self.current_step())
            .field("history", &self.history())
            .field("context", self.context())
            .field("epoch", &self.epoch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::persistence::MemoryBinding;
    use crate::funnel::schema::{FieldDef, StepDef};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn abc() -> FunnelDefinition {
        FunnelDefinition::new(
            "abc",
            vec![
                StepDef::new("A").with_field(FieldDef::new("a")),
                StepDef::new("B").with_field(FieldDef::new("b")),
                StepDef::new("C").with_field(FieldDef::new("c")),
            ],
        )
    }

    #[derive(Default)]
    struct CountingObserver {
        steps: Rc<RefCell<Vec<String>>>,
        contexts: Rc<RefCell<usize>>,
    }

    impl FunnelObserver for CountingObserver {
        fn on_step_changed(&self, _from: &StepName, to: &StepName, _history: &[StepName]) {
            self.steps.borrow_mut().push(to.to_string());
        }
        fn on_context_changed(&self, _step: &StepName, _context: &Map<String, Value>) {
            *self.contexts.borrow_mut() += 1;
        }
        fn on_reset(&self, _step: &StepName) {}
        fn on_diagnostic(&self, _diagnostic: &Diagnostic) {}
    }

    #[test]
    fn test_build_defaults_to_first_step() {
        let funnel = Funnel::builder(abc()).build().unwrap();
        assert_eq!(funnel.current_step(), "A");
        assert_eq!(funnel.history(), &[StepName::from("A")]);
        assert!(funnel.context().is_empty());
        assert!(funnel.cleanup_on_back());
    }

    #[test]
    fn test_build_rejects_unknown_initial_step() {
        let result = Funnel::builder(abc()).initial_step("Z").build();
        assert!(matches!(result, Err(FunnelError::InvalidInitialStep(_))));
    }

    #[test]
    fn test_push_same_step_merges_only() {
        let mut funnel = Funnel::builder(abc()).build().unwrap();
        let epoch = funnel.epoch();
        funnel.push("A", obj(json!({"a": 1}))).unwrap();
        assert_eq!(funnel.history().len(), 1);
        assert_eq!(funnel.context(), &obj(json!({"a": 1})));
        assert_eq!(funnel.epoch(), epoch);
    }

    #[test]
    fn test_observer_notified() {
        let observer = CountingObserver::default();
        let steps = observer.steps.clone();
        let contexts = observer.contexts.clone();

        let mut funnel = Funnel::builder(abc()).observer(observer).build().unwrap();
        funnel.push("B", obj(json!({"a": 1}))).unwrap();
        funnel.replace(obj(json!({"b": 2})));
        funnel.back();

        assert_eq!(*steps.borrow(), vec!["B".to_string(), "A".to_string()]);
        // push merge, replace, cleanup of "b"
        assert_eq!(*contexts.borrow(), 3);
    }

    #[test]
    fn test_back_without_cleanup_keeps_fields() {
        let mut funnel = Funnel::builder(abc())
            .cleanup_on_back(false)
            .build()
            .unwrap();
        funnel.push("B", obj(json!({"a": 1}))).unwrap();
        funnel.push("C", obj(json!({"b": 2}))).unwrap();
        funnel.replace(obj(json!({"c": 3})));

        assert!(funnel.back());
        assert_eq!(funnel.context(), &obj(json!({"a": 1, "b": 2, "c": 3})));
    }

    #[test]
    fn test_cleanup_keeps_fields_outside_schema() {
        let mut funnel = Funnel::builder(abc())
            .initial_context(obj(json!({"source": "banner"})))
            .build()
            .unwrap();
        funnel.push("B", obj(json!({"a": 1}))).unwrap();
        funnel.replace(obj(json!({"b": 2})));
        funnel.back();
        assert_eq!(funnel.context(), &obj(json!({"source": "banner", "a": 1})));
    }

    #[test]
    fn test_go_unknown_step() {
        let mut funnel = Funnel::builder(abc()).build().unwrap();
        assert!(funnel.go("Z").is_err());
        assert_eq!(funnel.current_step(), "A");
        assert_eq!(funnel.diagnostics()[0].kind, DiagnosticKind::UnknownStep);
    }

    #[test]
    fn test_flush_applies_batch_in_order() {
        let mut funnel = Funnel::builder(abc()).build().unwrap();
        let nav = funnel.handle();
        nav.replace(obj(json!({"a": 1})));
        nav.push("B", Map::new());
        nav.push("C", obj(json!({"b": 2})));

        assert_eq!(funnel.flush(), 3);
        assert_eq!(funnel.current_step(), "C");
        assert_eq!(funnel.context(), &obj(json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_flush_discards_stale_handle() {
        let mut funnel = Funnel::builder(abc()).build().unwrap();
        let stale = funnel.handle();
        funnel.push("B", Map::new()).unwrap();

        stale.push("C", obj(json!({"late": true})));
        assert_eq!(funnel.flush(), 0);
        assert_eq!(funnel.current_step(), "B");
        assert!(!funnel.context().contains_key("late"));
        assert_eq!(
            funnel.diagnostics().last().unwrap().kind,
            DiagnosticKind::StaleNavigation
        );
    }

    #[test]
    fn test_reset_restores_initial() {
        let mut funnel = Funnel::builder(abc())
            .initial_context(obj(json!({"a": 0})))
            .binding(MemoryBinding::new())
            .build()
            .unwrap();
        funnel.push("B", obj(json!({"a": 1}))).unwrap();
        let pending = funnel.handle();
        pending.push("C", Map::new());

        funnel.reset();
        assert_eq!(funnel.flush(), 0);
        assert_eq!(funnel.current_step(), "A");
        assert_eq!(funnel.history().len(), 1);
        assert_eq!(funnel.context(), &obj(json!({"a": 0})));
    }

    #[test]
    fn test_restore_from_binding() {
        let mut seed = MemoryBinding::new();
        seed.save(&PersistedState {
            step: StepName::from("B"),
            context: obj(json!({"a": 1})),
            history: vec![StepName::from("A"), StepName::from("B")],
        });

        let funnel = Funnel::builder(abc()).binding(seed).build().unwrap();
        assert_eq!(funnel.current_step(), "B");
        assert!(funnel.can_go_back());
        assert_eq!(funnel.context(), &obj(json!({"a": 1})));
    }

    #[test]
    fn test_restore_unknown_step_falls_back() {
        let seed = MemoryBinding::with_raw(r#"{"step": "gone", "context": {"a": 1}}"#);
        let funnel = Funnel::builder(abc()).binding(seed).build().unwrap();
        assert_eq!(funnel.current_step(), "A");
        assert!(funnel.context().is_empty());
        assert_eq!(funnel.diagnostics()[0].kind, DiagnosticKind::RestoreFailed);
    }

    #[test]
    fn test_restore_garbage_falls_back() {
        let seed = MemoryBinding::with_raw("%%%");
        let funnel = Funnel::builder(abc()).binding(seed).build().unwrap();
        assert_eq!(funnel.current_step(), "A");
        assert_eq!(funnel.diagnostics().len(), 1);
        assert_eq!(funnel.diagnostics()[0].kind, DiagnosticKind::RestoreFailed);
    }

    #[test]
    fn test_restore_without_saved_state_is_silent() {
        let funnel = Funnel::builder(abc())
            .binding(MemoryBinding::new())
            .build()
            .unwrap();
        assert_eq!(funnel.current_step(), "A");
        assert!(funnel.diagnostics().is_empty());
    }

    #[test]
    fn test_restore_unknown_history_entry_falls_back() {
        let mut seed = MemoryBinding::new();
        seed.save(&PersistedState {
            step: StepName::from("C"),
            context: obj(json!({"a": 1})),
            history: vec![StepName::from("gone"), StepName::from("C")],
        });

        let funnel = Funnel::builder(abc()).binding(seed).build().unwrap();
        assert_eq!(funnel.current_step(), "A");
        assert_eq!(funnel.history(), &[StepName::from("A")]);
        assert!(funnel.context().is_empty());
        assert_eq!(funnel.diagnostics()[0].kind, DiagnosticKind::RestoreFailed);
    }

    #[test]
    fn test_restore_repairs_mismatched_tail() {
        let mut seed = MemoryBinding::new();
        seed.save(&PersistedState {
            step: StepName::from("C"),
            context: obj(json!({"a": 1})),
            history: vec![StepName::from("A"), StepName::from("B")],
        });

        let funnel = Funnel::builder(abc()).binding(seed).build().unwrap();
        assert_eq!(funnel.current_step(), "C");
        assert_eq!(funnel.history(), &[StepName::from("C")]);
        assert!(funnel.diagnostics().is_empty());
    }

    #[test]
    fn test_binding_saved_after_every_change() {
        let mut funnel = Funnel::builder(abc())
            .binding(MemoryBinding::new())
            .build()
            .unwrap();
        let saved = |funnel: &Funnel| funnel.binding().unwrap().load().unwrap().unwrap();

        funnel.push("B", obj(json!({"a": 1}))).unwrap();
        assert_eq!(saved(&funnel).step, "B");
        assert_eq!(saved(&funnel).context, obj(json!({"a": 1})));

        funnel.replace(obj(json!({"b": 2})));
        assert_eq!(saved(&funnel).context, obj(json!({"a": 1, "b": 2})));

        funnel.back();
        assert_eq!(saved(&funnel), funnel.persisted_state());
        assert_eq!(saved(&funnel).history, vec![StepName::from("A")]);

        funnel.reset();
        assert!(funnel.binding().unwrap().load().is_none());
    }

    #[test]
    fn test_go_to_current_step_keeps_epoch() {
        let observer = CountingObserver::default();
        let steps = observer.steps.clone();
        let mut funnel = Funnel::builder(abc()).observer(observer).build().unwrap();
        funnel.push("B", Map::new()).unwrap();
        let epoch = funnel.epoch();
        let live = funnel.handle();

        funnel.go("B").unwrap();
        assert_eq!(funnel.epoch(), epoch);
        assert_eq!(funnel.history().len(), 2);
        assert_eq!(*steps.borrow(), vec!["B".to_string()]);

        live.push("C", Map::new());
        assert_eq!(funnel.flush(), 1);
        assert_eq!(funnel.current_step(), "C");
    }

    #[test]
    fn test_render_reports_duplicate_registration() {
        let mut funnel = Funnel::builder(abc()).build().unwrap();
        let mut renderer = StepRenderer::new().step("A", |_| "a");
        renderer.register("A", |_| "again");

        assert_eq!(funnel.render(&renderer), Rendered::Step("a"));
        funnel.render(&renderer);
        let kinds: Vec<DiagnosticKind> = funnel.diagnostics().iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DiagnosticKind::DuplicateRenderer]);
    }

    #[test]
    fn test_render_missing_step_recorded_once() {
        let mut funnel = Funnel::builder(abc()).build().unwrap();
        let renderer: StepRenderer<&str> = StepRenderer::new().step("A", |_| "a");
        funnel.go("B").unwrap();

        for _ in 0..3 {
            assert!(funnel.render(&renderer).is_missing());
        }
        assert_eq!(funnel.diagnostics().len(), 1);
        assert_eq!(funnel.diagnostics()[0].kind, DiagnosticKind::MissingRenderer);

        funnel.back();
        funnel.go("C").unwrap();
        funnel.render(&renderer);
        assert_eq!(funnel.diagnostics().len(), 2);
    }

    #[test]
    fn test_progress_and_statuses() {
        let mut funnel = Funnel::builder(abc()).build().unwrap();
        funnel.push("B", Map::new()).unwrap();

        let progress = funnel.progress();
        assert_eq!(progress.current, 2);
        assert_eq!(progress.total, 3);

        let statuses: Vec<StepStatus> = funnel.step_statuses().into_iter().map(|(_, s)| s).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Completed, StepStatus::Active, StepStatus::Upcoming]
        );
    }

    #[test]
    fn test_check_context_current_step() {
        let mut funnel = Funnel::builder(abc()).build().unwrap();
        funnel.go("C").unwrap();
        assert!(matches!(
            funnel.check_context(),
            Err(FunnelError::MissingFields { .. })
        ));
        funnel.replace(obj(json!({"a": 1, "b": 2})));
        assert!(funnel.check_context().is_ok());
    }
}
