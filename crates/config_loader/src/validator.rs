//! Configuration validation
//!
//! Field ranges are declared on the contract types with `validator`; this
//! module runs them and flattens the first failure into a `ContractError`
//! carrying a dotted field path.

use contracts::{ContractError, StreamerConfig};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a parsed configuration.
///
/// Returns the first error in field-path order, or `Ok(())`.
pub fn validate(config: &StreamerConfig) -> Result<(), ContractError> {
    match config.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_error("", &errors)
                .unwrap_or_else(|| ("<root>".to_string(), "invalid configuration".to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

fn first_error(prefix: &str, errors: &ValidationErrors) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (name, kind) in fields {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };
        let found = match kind {
            ValidationErrorsKind::Field(list) => list.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                (path.clone(), message)
            }),
            ValidationErrorsKind::Struct(inner) => first_error(&path, inner),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, inner)| first_error(&format!("{path}[{idx}]"), inner)),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}
