// SPDX-License-Identifier: MIT

//! Funnel definitions and per-step schema deltas
//!
//! Every step introduces its own fields. The fields available at step `i`
//! are the union of the deltas of steps `0..=i`; only the deltas of steps
//! `0..i` are required there.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

use crate::error::{FunnelError, Result};

/// Name of a funnel step
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepName(String);

impl StepName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StepName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for StepName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for StepName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StepName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StepName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Supported field types
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// Check whether a JSON value has this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A field introduced by a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FieldDefRepr")]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: None,
        }
    }

    pub fn typed(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type: Some(field_type),
        }
    }
}

/// Fields may be written as a bare name or as `{ name, type }`
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldDefRepr {
    Name(String),
    Full {
        name: String,
        #[serde(rename = "type")]
        field_type: Option<FieldType>,
    },
}

impl From<FieldDefRepr> for FieldDef {
    fn from(repr: FieldDefRepr) -> Self {
        match repr {
            FieldDefRepr::Name(name) => FieldDef::new(name),
            FieldDefRepr::Full { name, field_type } => FieldDef { name, field_type },
        }
    }
}

/// A single step of a funnel and the schema delta it introduces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
    pub name: StepName,
    /// Human readable label for progress displays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Fields this step collects
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl StepDef {
    pub fn new(name: impl Into<StepName>) -> Self {
        Self {
            name: name.into(),
            label: None,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Context keys owned by this step.
    ///
    /// A step without declared fields owns the key named after itself.
    pub fn owned_fields(&self) -> Vec<&str> {
        if self.fields.is_empty() {
            vec![self.name.as_str()]
        } else {
            self.fields.iter().map(|f| f.name.as_str()).collect()
        }
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(self.name.as_str())
    }
}

/// Ordered funnel definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FunnelDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<StepDef>,
}

impl FunnelDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<StepDef>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps,
        }
    }

    /// Definition where every step owns the context key named after itself
    pub fn from_step_names(name: impl Into<String>, steps: &[&str]) -> Self {
        Self::new(name, steps.iter().map(|s| StepDef::new(*s)).collect())
    }

    /// Check step names and field ownership are unambiguous
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(FunnelError::EmptyDefinition(self.name.clone()));
        }

        let mut seen_steps: HashMap<&str, usize> = HashMap::new();
        let mut owners: HashMap<&str, &str> = HashMap::new();

        for (idx, step) in self.steps.iter().enumerate() {
            if seen_steps.insert(step.name.as_str(), idx).is_some() {
                return Err(FunnelError::DuplicateStep(step.name.to_string()));
            }
            for field in step.owned_fields() {
                if let Some(first) = owners.insert(field, step.name.as_str()) {
                    return Err(FunnelError::DuplicateField {
                        field: field.to_string(),
                        first: first.to_string(),
                        second: step.name.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn step_names(&self) -> Vec<StepName> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn index_of(&self, step: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == step)
    }

    pub fn contains(&self, step: &str) -> bool {
        self.index_of(step).is_some()
    }

    pub fn step(&self, step: &str) -> Option<&StepDef> {
        self.steps.iter().find(|s| s.name == step)
    }

    /// Fields guaranteed to be present once `step` is reached
    pub fn required_fields(&self, step: &str) -> Result<Vec<&str>> {
        let idx = self
            .index_of(step)
            .ok_or_else(|| FunnelError::unknown_step(step))?;
        Ok(self.steps[..idx]
            .iter()
            .flat_map(|s| s.owned_fields())
            .collect())
    }

    /// Required fields plus the fields collected at `step` itself
    pub fn available_fields(&self, step: &str) -> Result<Vec<&str>> {
        let idx = self
            .index_of(step)
            .ok_or_else(|| FunnelError::unknown_step(step))?;
        Ok(self.steps[..=idx]
            .iter()
            .flat_map(|s| s.owned_fields())
            .collect())
    }

    /// Step that introduces `field`
    pub fn owner_of(&self, field: &str) -> Option<&StepName> {
        self.steps
            .iter()
            .find(|s| s.owned_fields().contains(&field))
            .map(|s| &s.name)
    }

    /// Fields owned by steps strictly after `index`
    pub fn fields_after(&self, index: usize) -> Vec<&str> {
        self.steps
            .iter()
            .skip(index + 1)
            .flat_map(|s| s.owned_fields())
            .collect()
    }

    fn field_def(&self, field: &str) -> Option<&FieldDef> {
        self.steps
            .iter()
            .flat_map(|s| s.fields.iter())
            .find(|f| f.name == field)
    }

    /// Per-step required-field check.
    ///
    /// Fails when a required field is missing, or when any field known at
    /// `step` holds a value whose type differs from the declared one.
    pub fn check_context(&self, step: &str, context: &Map<String, Value>) -> Result<()> {
        let required = self.required_fields(step)?;
        let missing: Vec<String> = required
            .iter()
            .filter(|f| !context.contains_key(**f))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(FunnelError::MissingFields {
                step: step.to_string(),
                fields: missing,
            });
        }

        for field in self.available_fields(step)? {
            let (Some(value), Some(def)) = (context.get(field), self.field_def(field)) else {
                continue;
            };
            if let Some(expected) = def.field_type {
                if !expected.matches(value) {
                    return Err(FunnelError::TypeMismatch {
                        field: field.to_string(),
                        expected: expected.name().to_string(),
                        found: json_type_name(value).to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
