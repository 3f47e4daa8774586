//! Declarative payload validation.
//!
//! A [`Schema`] is a static table of per-field rules plus object-level
//! refinements. [`validate`] checks a JSON payload against it and either
//! returns the typed payload or every failure grouped by field path.

pub mod auth;

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

/// Path used for failures that do not belong to a single field.
pub const ROOT_PATH: &str = "_error";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Field path -> messages. Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(transparent)]
#[error("validation failed")]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// One message on one field, for business rules that must look like schema failures.
    pub fn single(path: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(path, message);
        errors
    }

    pub fn add(&mut self, path: &str, message: impl Into<String>) {
        let path = if path.is_empty() { ROOT_PATH } else { path };
        self.0
            .entry(path.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn field(&self, path: &str) -> Option<&[String]> {
        self.0.get(path).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Rule {
    MinLen(usize, &'static str),
    MaxLen(usize, &'static str),
    Email(&'static str),
}

impl Rule {
    fn check(&self, value: &str) -> Option<&'static str> {
        let passed = match *self {
            Rule::MinLen(min, _) => value.chars().count() >= min,
            Rule::MaxLen(max, _) => value.chars().count() <= max,
            Rule::Email(_) => is_valid_email(value),
        };
        if passed {
            return None;
        }
        match *self {
            Rule::MinLen(_, msg) | Rule::MaxLen(_, msg) | Rule::Email(msg) => Some(msg),
        }
    }
}

/// A string-typed field and the rules it must satisfy.
#[derive(Debug)]
pub struct Field {
    pub name: &'static str,
    pub rules: &'static [Rule],
}

/// Object-level rule; failures attach to `path`.
pub struct Refinement {
    pub path: &'static str,
    pub message: &'static str,
    pub check: fn(&Map<String, Value>) -> bool,
}

pub struct Schema {
    pub fields: &'static [Field],
    pub refinements: &'static [Refinement],
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check `payload` against `schema` and deserialize it into `T`.
///
/// Every field is checked and all messages are collected. Refinements only
/// run once every field is present with the expected type, so a missing
/// field never also produces a cross-field failure.
pub fn validate<T: DeserializeOwned>(schema: &Schema, payload: &Value) -> Result<T, ValidationErrors> {
    let Some(object) = payload.as_object() else {
        return Err(ValidationErrors::single(
            ROOT_PATH,
            format!("Expected object, received {}", type_name(payload)),
        ));
    };

    let mut errors = ValidationErrors::new();
    let mut well_typed = true;

    for field in schema.fields {
        match object.get(field.name) {
            None => {
                well_typed = false;
                errors.add(field.name, "Required");
            }
            Some(Value::String(value)) => {
                for rule in field.rules {
                    if let Some(msg) = rule.check(value) {
                        errors.add(field.name, msg);
                    }
                }
            }
            Some(other) => {
                well_typed = false;
                errors.add(
                    field.name,
                    format!("Expected string, received {}", type_name(other)),
                );
            }
        }
    }

    if well_typed {
        for refinement in schema.refinements {
            if !(refinement.check)(object) {
                errors.add(refinement.path, refinement.message);
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let known: Map<String, Value> = schema
        .fields
        .iter()
        .filter_map(|f| object.get(f.name).map(|v| (f.name.to_string(), v.clone())))
        .collect();

    serde_json::from_value(Value::Object(known))
        .map_err(|e| ValidationErrors::single(ROOT_PATH, e.to_string()))
}
