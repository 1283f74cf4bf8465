//! Maps engine outcomes to the closed result-code set.
//!
//! The external request-handling layer passes these shaped results
//! through unchanged; nothing here carries business logic.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A shaped operation result: HTTP-style status plus a JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapedResponse {
    /// HTTP-style status code.
    pub status: u16,
    /// Serialized payload or error body.
    pub body: serde_json::Value,
}

/// Standard error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Optional details (e.g. the slot a user already holds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Stateless outcome-to-result-code mapper.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseShaper;

impl ResponseShaper {
    /// Shape a success payload with status 200.
    pub fn ok<T: Serialize>(payload: &T) -> ShapedResponse {
        Self::success(200, payload)
    }

    /// Shape a success payload with status 201 (used by `reserve`).
    pub fn created<T: Serialize>(payload: &T) -> ShapedResponse {
        Self::success(201, payload)
    }

    /// Shape an engine error into its result code and error body.
    pub fn reject(err: &EngineError) -> ShapedResponse {
        let (status, code, details) = match err {
            EngineError::InvalidSlot(_) => (404, "INVALID_SLOT", None),
            EngineError::NotReserved(_) => (404, "NOT_RESERVED", None),
            EngineError::NoReservation => (404, "NO_RESERVATION", None),
            EngineError::SlotTaken(_) => (409, "SLOT_TAKEN", None),
            EngineError::UserHasReservation(slot) => (
                409,
                "USER_HAS_RESERVATION",
                Some(serde_json::json!({ "slot": slot })),
            ),
            EngineError::AlreadySubmitted(_) => (409, "ALREADY_SUBMITTED", None),
            EngineError::InvalidConfig(_) => (400, "INVALID_CONFIG", None),
            EngineError::Storage(inner) => {
                tracing::error!(error = %inner, "Storage failure surfaced to caller");
                (500, "INTERNAL_ERROR", None)
            }
        };

        let body = ErrorBody {
            error: code.to_string(),
            message: err.to_string(),
            details,
        };
        ShapedResponse {
            status,
            body: serde_json::to_value(body).unwrap_or(serde_json::Value::Null),
        }
    }

    fn success<T: Serialize>(status: u16, payload: &T) -> ShapedResponse {
        ShapedResponse {
            status,
            body: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosterhub_core::error::AppError;

    #[test]
    fn test_not_found_codes() {
        for err in [
            EngineError::InvalidSlot("x".to_string()),
            EngineError::NotReserved("5.10.001".to_string()),
            EngineError::NoReservation,
        ] {
            assert_eq!(ResponseShaper::reject(&err).status, 404);
        }
    }

    #[test]
    fn test_conflict_codes() {
        for err in [
            EngineError::SlotTaken("5.10.001".to_string()),
            EngineError::UserHasReservation("3.10.001".to_string()),
            EngineError::AlreadySubmitted("5.10.001".to_string()),
        ] {
            assert_eq!(ResponseShaper::reject(&err).status, 409);
        }
    }

    #[test]
    fn test_user_has_reservation_carries_slot() {
        let shaped =
            ResponseShaper::reject(&EngineError::UserHasReservation("3.10.001".to_string()));
        assert_eq!(shaped.body["details"]["slot"], "3.10.001");
    }

    #[test]
    fn test_validation_and_internal_codes() {
        let invalid = EngineError::InvalidConfig("bad bounds".to_string());
        assert_eq!(ResponseShaper::reject(&invalid).status, 400);

        let storage: EngineError = AppError::storage("redis down").into();
        let shaped = ResponseShaper::reject(&storage);
        assert_eq!(shaped.status, 500);
        assert_eq!(shaped.body["error"], "INTERNAL_ERROR");
    }

    #[test]
    fn test_success_shapes() {
        let shaped = ResponseShaper::created(&serde_json::json!({"slot": "5.10.001"}));
        assert_eq!(shaped.status, 201);
        assert_eq!(shaped.body["slot"], "5.10.001");
        assert_eq!(ResponseShaper::ok(&serde_json::json!({})).status, 200);
    }
}
