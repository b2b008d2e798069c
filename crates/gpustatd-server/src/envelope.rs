//! Uniform `{code, data, error}` response envelope.
//!
//! Every response body from this server has the same shape. Codes: 0 success,
//! 1 validation failure, 2 provider/internal failure, 401 unauthorized. The
//! 401 code mirrors its HTTP status instead of continuing the 0/1/2 scheme —
//! a wire-format quirk kept for client compatibility.

use serde::Serialize;

pub const CODE_OK: i64 = 0;
pub const CODE_VALIDATION: i64 = 1;
pub const CODE_INTERNAL: i64 = 2;
pub const CODE_UNAUTHORIZED: i64 = 401;

/// One response body: `data` serializes as `null` when absent, `error` is
/// omitted entirely on success.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: i64,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_OK,
            data: Some(data),
            error: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            code: CODE_VALIDATION,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: CODE_INTERNAL,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            code: CODE_UNAUTHORIZED,
            data: None,
            error: Some("Unauthorized".to_string()),
        }
    }
}
