// SPDX-License-Identifier: MIT

//! Context store with shallow-merge semantics

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;

use crate::error::Result;

/// Identifier returned by [`ContextStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn Fn(&Map<String, Value>)>;

/// Accumulated funnel data.
///
/// Merges are shallow: a nested object in the partial data replaces the
/// stored one instead of being merged into it.
#[derive(Default)]
pub struct ContextStore {
    fields: Map<String, Value>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: u64,
}

impl ContextStore {
    pub fn new(initial: Map<String, Value>) -> Self {
        Self {
            fields: initial,
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Read-only view of the current context
    pub fn get(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Get a single field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Deserialize the context into a typed view
    pub fn get_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }

    /// Shallow-merge `partial` and notify subscribers.
    ///
    /// Existing keys are overwritten, new keys are added. Keys unknown to
    /// the funnel schema are accepted.
    pub fn merge(&mut self, partial: Map<String, Value>) {
        if partial.is_empty() {
            return;
        }
        for (k, v) in partial {
            self.fields.insert(k, v);
        }
        self.notify();
    }

    /// Remove the given keys, notifying subscribers if anything changed
    pub fn remove_fields<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let removed: Vec<String> = keys
            .into_iter()
            .filter(|k| self.fields.remove(*k).is_some())
            .map(|k| k.to_string())
            .collect();
        if !removed.is_empty() {
            self.notify();
        }
        removed
    }

    /// Replace the whole context without notifying
    pub(crate) fn reset(&mut self, fields: Map<String, Value>) {
        self.fields = fields;
    }

    pub fn subscribe(&mut self, callback: impl Fn(&Map<String, Value>) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    fn notify(&self) {
        for (_, subscriber) in &self.subscribers {
            subscriber(&self.fields);
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextStore")
            .field("fields", &self.fields)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Turn a JSON value into partial context data.
///
/// `null` means "no data"; any other non-object is rejected.
pub fn partial_from_value(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::Null => Some(Map::new()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_adds_and_overwrites() {
        let mut store = ContextStore::empty();
        store.merge(obj(json!({"x": 1})));
        store.merge(obj(json!({"y": 2})));
        assert_eq!(store.to_json(), json!({"x": 1, "y": 2}));

        store.merge(obj(json!({"x": 3})));
        assert_eq!(store.to_json(), json!({"x": 3, "y": 2}));
    }

    #[test]
    fn test_merge_is_shallow() {
        let mut store = ContextStore::new(obj(json!({"meta": {"a": 1, "b": 2}})));
        store.merge(obj(json!({"meta": {"a": 10}})));
        assert_eq!(store.field("meta"), Some(&json!({"a": 10})));
    }

    #[test]
    fn test_subscribers_notified() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut store = ContextStore::empty();
        let sink = seen.clone();
        let id = store.subscribe(move |fields| sink.borrow_mut().push(fields.len()));

        store.merge(obj(json!({"a": 1})));
        store.merge(obj(json!({"b": 2})));
        assert_eq!(*seen.borrow(), vec![1, 2]);

        assert!(store.unsubscribe(id));
        store.merge(obj(json!({"c": 3})));
        assert_eq!(seen.borrow().len(), 2);
        assert!(!store.unsubscribe(id));
    }

    #[test]
    fn test_empty_merge_does_not_notify() {
        let count = Rc::new(RefCell::new(0));
        let mut store = ContextStore::empty();
        let sink = count.clone();
        store.subscribe(move |_| *sink.borrow_mut() += 1);

        store.merge(Map::new());
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_remove_fields() {
        let mut store = ContextStore::new(obj(json!({"a": 1, "b": 2, "c": 3})));
        let removed = store.remove_fields(["b", "c", "missing"]);
        assert_eq!(removed, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(store.to_json(), json!({"a": 1}));
    }

    #[test]
    fn test_get_as_typed() {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Experience {
            category: String,
            experience_years: Option<u32>,
        }

        let store = ContextStore::new(obj(json!({"category": "cooking"})));
        let typed: Experience = store.get_as().unwrap();
        assert_eq!(typed.category, "cooking");
        assert_eq!(typed.experience_years, None);
    }

    #[test]
    fn test_partial_from_value() {
        assert_eq!(partial_from_value(Value::Null), Some(Map::new()));
        assert!(partial_from_value(json!({"a": 1})).is_some());
        assert!(partial_from_value(json!([1, 2])).is_none());
    }
}
