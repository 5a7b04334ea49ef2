//! Lenient JSON body extraction
//!
//! Handlers report malformed bodies in their own response shapes, so the
//! extractor never rejects: an empty, non-JSON or unreadable body becomes
//! `Value::Null` and fails schema validation downstream.

use std::convert::Infallible;

use axum::{
    async_trait,
    body::{to_bytes, Bytes},
    extract::{FromRequest, Request},
};
use serde_json::Value;

/// Upper bound on accepted request bodies
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct JsonBody(pub Value);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let bytes = match to_bytes(req.into_body(), MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!("Failed to read request body: {}", err);
                Bytes::new()
            }
        };
        Ok(JsonBody(parse_body(&bytes)))
    }
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(b""), Value::Null);
        assert_eq!(parse_body(b"not json"), Value::Null);
        assert_eq!(parse_body(br#"{"a": 1}"#), json!({"a": 1}));
    }
}
