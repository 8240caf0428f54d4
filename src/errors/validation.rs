//! Normalization of request validation failures into `{field, value, reason}` records

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// One rejected input, as reported to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ValidationError {
    /// Field name, property path, or object identifier
    pub field: String,
    /// Rejected value, `null` for object-level failures
    pub value: Option<Value>,
    /// Why the value was rejected
    pub reason: String,
}

/// A single field rejected during binding
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub rejected_value: Option<Value>,
    pub reason: String,
}

/// An object-level (cross-field) rejection with no single offending field
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectError {
    pub object_name: String,
    pub reason: String,
}

/// A constraint check that failed on a property path, e.g. `address.zip`
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintViolation {
    pub property_path: String,
    pub invalid_value: Option<Value>,
    pub reason: String,
}

/// Result of binding a request body or query onto a typed target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingResult {
    pub field_errors: Vec<FieldError>,
    pub global_errors: Vec<ObjectError>,
}

impl FieldError {
    pub fn new(field: impl Into<String>, rejected_value: Option<Value>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rejected_value,
            reason: reason.into(),
        }
    }
}

impl ObjectError {
    pub fn new(object_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            reason: reason.into(),
        }
    }
}

impl ConstraintViolation {
    pub fn new(
        property_path: impl Into<String>,
        invalid_value: Option<Value>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            property_path: property_path.into(),
            invalid_value,
            reason: reason.into(),
        }
    }
}

impl BindingResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_field(
        &mut self,
        field: impl Into<String>,
        rejected_value: Option<Value>,
        reason: impl Into<String>,
    ) {
        self.field_errors
            .push(FieldError::new(field, rejected_value, reason));
    }

    pub fn reject(&mut self, object_name: impl Into<String>, reason: impl Into<String>) {
        self.global_errors.push(ObjectError::new(object_name, reason));
    }

    pub fn has_errors(&self) -> bool {
        !self.field_errors.is_empty() || !self.global_errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.field_errors.len() + self.global_errors.len()
    }
}

impl From<&FieldError> for ValidationError {
    fn from(e: &FieldError) -> Self {
        Self {
            field: e.field.clone(),
            value: e.rejected_value.clone(),
            reason: e.reason.clone(),
        }
    }
}

impl From<&ObjectError> for ValidationError {
    fn from(e: &ObjectError) -> Self {
        Self {
            field: e.object_name.clone(),
            value: None,
            reason: e.reason.clone(),
        }
    }
}

impl From<&ConstraintViolation> for ValidationError {
    fn from(v: &ConstraintViolation) -> Self {
        Self {
            field: v.property_path.clone(),
            value: v.invalid_value.clone(),
            reason: v.reason.clone(),
        }
    }
}

/// Field errors first, then object errors, each in input order.
pub fn normalize_binding(result: &BindingResult) -> Vec<ValidationError> {
    result
        .field_errors
        .iter()
        .map(ValidationError::from)
        .chain(result.global_errors.iter().map(ValidationError::from))
        .collect()
}

pub fn normalize_violations(violations: &[ConstraintViolation]) -> Vec<ValidationError> {
    violations.iter().map(ValidationError::from).collect()
}

/// Flat `field: reason; ...` rendering for log lines
pub fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.reason))
        .collect::<Vec<_>>()
        .join("; ")
}
