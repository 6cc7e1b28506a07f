// SPDX-License-Identifier: MIT

//! Persistence bindings for funnel position
//!
//! A binding reads and writes `{step, context, history}` so a reload or a
//! shared link lands on the same step. A stored value that fails to parse
//! loads as an error and the funnel falls back to its initial state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::Result;

use super::schema::StepName;

/// Serializable funnel position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub step: StepName,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<StepName>,
}

/// Encode a state as compact JSON
pub fn serialize(state: &PersistedState) -> String {
    // Map keys are strings and values are JSON, so encoding cannot fail
    serde_json::to_string(state).unwrap_or_default()
}

/// Decode a state, keeping the parse error
pub fn decode(raw: &str) -> Result<PersistedState> {
    Ok(serde_json::from_str(raw)?)
}

/// Decode a state, returning `None` on any parse failure
pub fn deserialize(raw: &str) -> Option<PersistedState> {
    match decode(raw) {
        Ok(state) => Some(state),
        Err(e) => {
            log::warn!("Discarding persisted funnel state: {}", e);
            None
        }
    }
}

/// Key-value binding the funnel synchronizes with after every change
pub trait PersistenceBinding {
    /// `None` when nothing is stored, `Some(Err(..))` when the stored value
    /// cannot be decoded
    fn load(&self) -> Option<Result<PersistedState>>;
    fn save(&mut self, state: &PersistedState);
    fn clear(&mut self);

    /// URL carrying the stored state, for bindings synced to an address
    fn location(&self) -> Option<&Url> {
        None
    }
}

/// Keeps the encoded state in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryBinding {
    raw: Option<String>,
}

impl MemoryBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binding pre-seeded with an encoded state
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
        }
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

impl PersistenceBinding for MemoryBinding {
    fn load(&self) -> Option<Result<PersistedState>> {
        self.raw.as_deref().map(decode)
    }

    fn save(&mut self, state: &PersistedState) {
        self.raw = Some(serialize(state));
    }

    fn clear(&mut self) {
        self.raw = None;
    }
}

/// Stores the encoded state in the `<funnel-id>.state` query parameter of a URL
#[derive(Debug, Clone)]
pub struct QueryBinding {
    url: Url,
    key: String,
}

impl QueryBinding {
    pub fn new(url: Url, funnel_id: &str) -> Self {
        Self {
            url,
            key: format!("{}.state", funnel_id),
        }
    }

    pub fn parse(url: &str, funnel_id: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(url)?, funnel_id))
    }

    /// Current URL, including the funnel parameter
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn set_param(&mut self, value: Option<String>) {
        let others: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(k, _)| *k != self.key.as_str())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if others.is_empty() && value.is_none() {
            self.url.set_query(None);
            return;
        }

        let mut pairs = self.url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &others {
            pairs.append_pair(k, v);
        }
        if let Some(value) = value {
            pairs.append_pair(&self.key, &value);
        }
    }
}

impl PersistenceBinding for QueryBinding {
    fn load(&self) -> Option<Result<PersistedState>> {
        self.url
            .query_pairs()
            .find(|(k, _)| *k == self.key.as_str())
            .map(|(_, v)| decode(&v))
    }

    fn save(&mut self, state: &PersistedState) {
        self.set_param(Some(serialize(state)));
    }

    fn clear(&mut self) {
        self.set_param(None);
    }

    fn location(&self) -> Option<&Url> {
        Some(&self.url)
    }
}
