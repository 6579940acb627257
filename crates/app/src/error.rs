//! Application error type.
//!
//! Everything here ends up as user-visible text: gateway failures are
//! carried verbatim and local validation failures are already phrased
//! for display. Nothing in this layer is allowed to crash a view.

use houseboard_gateway::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("{0}")]
    Validation(String),
}

impl AppError {
    /// Flatten a `validator` error set into one display line.
    pub fn from_validation(errors: &validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = Vec::new();
        for (field, errors) in errors.field_errors() {
            for error in errors {
                match &error.message {
                    Some(message) => messages.push(message.to_string()),
                    None => messages.push(format!("{field} is invalid")),
                }
            }
        }
        messages.sort();
        AppError::Validation(messages.join("; "))
    }
}
