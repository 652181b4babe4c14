//! Schema validation contract.
//!
//! The storage engine treats schema validation as an opaque external
//! collaborator: it calls [`SchemaValidator::validate`] before accepting a
//! payload and otherwise has no opinion on what a schema looks like. Real
//! applications supply their own implementation (backed by whatever
//! validation library fits); [`PermissiveValidator`] is provided so the
//! engine is usable and testable on its own.
use async_trait::async_trait;
use serde_json::Value;

use crate::error::FieldErrors;

/// Validates and normalizes documents before they are persisted.
///
/// `validate` may perform async work (e.g. look up a remote schema
/// registry) and returns either the parsed/normalized payload or a map of
/// per-field error messages. `validate_property` is the synchronous,
/// single-field counterpart used by a model layer enforcing per-property
/// validators on assignment; the storage engine itself never calls it.
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    async fn validate(&self, payload: &Value) -> Result<Value, FieldErrors>;

    fn validate_property(&self, field: &str, value: &Value) -> Result<Value, String>;
}

/// A validator that accepts every payload unchanged.
///
/// Used as the default for collections that don't supply their own
/// validator, and in tests that don't exercise validation failures.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveValidator;

#[async_trait]
impl SchemaValidator for PermissiveValidator {
    async fn validate(&self, payload: &Value) -> Result<Value, FieldErrors> {
        Ok(payload.clone())
    }

    fn validate_property(&self, _field: &str, value: &Value) -> Result<Value, String> {
        Ok(value.clone())
    }
}
