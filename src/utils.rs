use std::collections::HashMap;

use serde::Serialize;
use validator::ValidationErrors;

/// Per-field validation messages, keyed by field name.
pub type FieldErrors = HashMap<String, Vec<String>>;

/// Error payload of an action envelope: either a field->messages map
/// (validation and duplicate conflicts) or a plain string (everything else).
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ActionError {
    Fields(FieldErrors),
    Message(String),
}

/// The `{success, error?}` envelope returned by create/update/delete actions.
#[derive(Debug, Serialize)]
pub struct SaveOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionError>,
}

impl SaveOutcome {
    pub fn ok() -> Self {
        SaveOutcome { success: true, error: None }
    }

    pub fn field_error(field: &str, message: &str) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.to_string()]);
        SaveOutcome { success: false, error: Some(ActionError::Fields(fields)) }
    }

    pub fn fields(fields: FieldErrors) -> Self {
        SaveOutcome { success: false, error: Some(ActionError::Fields(fields)) }
    }

    pub fn message(message: impl Into<String>) -> Self {
        SaveOutcome { success: false, error: Some(ActionError::Message(message.into())) }
    }
}

/// Flattens `validator` output into a field->messages map.
pub fn flatten_validation_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut map = FieldErrors::new();
    for (field, errs) in errors.field_errors() {
        let messages = errs
            .iter()
            .map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string())
            })
            .collect();
        map.insert(field.to_string(), messages);
    }
    map
}

/// Domain tags arrive from the client as a stringified JSON array.
/// Anything unparsable collapses to no tags.
pub fn parse_domain_list(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(s) => serde_json::from_str::<Vec<String>>(s).unwrap_or_default(),
        None => Vec::new(),
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
