// SPDX-License-Identifier: MIT

//! Multi-step funnel engine
//!
//! This module provides:
//! - `FunnelDefinition` - ordered steps and the fields each step introduces
//! - `Funnel` - the running state machine (`push`, `back`, `go`, `replace`)
//! - `StepRenderer` - selects the view registered for the current step
//! - `PersistenceBinding` - in-memory or URL query string persistence

mod context;
mod engine;
pub mod loader;
mod navigation;
mod observer;
pub mod persistence;
mod progress;
mod renderer;
mod schema;
mod sequencer;

pub use context::{partial_from_value, ContextStore, SubscriptionId};
pub use engine::{Funnel, FunnelBuilder, FunnelState};
pub use loader::FunnelLoader;
pub use navigation::{Epoch, NavigationCommand, NavigationHandle};
pub use observer::{Diagnostic, DiagnosticKind, FunnelObserver, LoggingObserver, NoOpObserver};
pub use persistence::{MemoryBinding, PersistedState, PersistenceBinding, QueryBinding};
pub use progress::{calculate_percent, Progress, StepStatus};
pub use renderer::{RenderProps, Rendered, StepRenderer};
pub use schema::{FieldDef, FieldType, FunnelDefinition, StepDef, StepName};
pub use sequencer::{StepSequencer, Transition};
