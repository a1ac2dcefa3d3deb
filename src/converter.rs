//! Body converters.
//!
//! A [`RequestConverter`] encodes the logical request body before the request
//! enters the interceptor chain; a [`ResponseConverter`] decodes a successful
//! response body, optionally guided by the endpoint's
//! [`ResponseTypeHint`](crate::descriptor::ResponseTypeHint).

use crate::{
    descriptor::{EndpointDescriptor, ResponseTypeHint},
    ConcreteResponse, Error, ObjectHydrator, RequestBody, Result,
};
use serde_json::Value;
use std::sync::Arc;

/// Encodes outgoing bodies.
pub trait RequestConverter: Send + Sync {
    /// Converts the body built for `descriptor`.
    ///
    /// # Errors
    ///
    /// Conversion errors are returned as-is and never retried.
    fn convert(&self, body: RequestBody, descriptor: &EndpointDescriptor) -> Result<RequestBody>;
}

/// Decodes incoming bodies.
pub trait ResponseConverter: Send + Sync {
    /// Converts a successful response body into a value.
    ///
    /// # Errors
    ///
    /// Conversion errors are returned as-is and never retried.
    fn convert(
        &self,
        response: &ConcreteResponse,
        hint: Option<&ResponseTypeHint>,
    ) -> Result<Value>;
}

/// JSON encoding and decoding, with optional hydration.
///
/// Outgoing `Json` bodies are mapped to wire shape when the endpoint declares
/// a `body_type`; incoming bodies are hydrated when the endpoint declares a
/// response type. Both require a hydrator.
#[derive(Debug, Clone, Default)]
pub struct JsonConverter {
    hydrator: Option<Arc<ObjectHydrator>>,
}

impl JsonConverter {
    /// A converter without hydration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrates bodies with `hydrator`.
    #[must_use]
    pub fn with_hydrator(mut self, hydrator: Arc<ObjectHydrator>) -> Self {
        self.hydrator = Some(hydrator);
        self
    }
}

impl RequestConverter for JsonConverter {
    fn convert(&self, body: RequestBody, descriptor: &EndpointDescriptor) -> Result<RequestBody> {
        let RequestBody::Json(value) = body else {
            return Ok(body);
        };
        let value = match (&self.hydrator, &descriptor.body_type) {
            (Some(hydrator), Some(type_name)) => hydrator.serialize(&value, type_name)?,
            _ => value,
        };
        let bytes =
            serde_json::to_vec(&value).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        Ok(RequestBody::Bytes {
            content_type: Some("application/json".to_string()),
            bytes: bytes.into(),
        })
    }
}

impl ResponseConverter for JsonConverter {
    fn convert(
        &self,
        response: &ConcreteResponse,
        hint: Option<&ResponseTypeHint>,
    ) -> Result<Value> {
        let value = match &response.body {
            Some(body) => body.clone(),
            None if response.raw_body.iter().all(u8::is_ascii_whitespace) => Value::Null,
            None => serde_json::from_slice(&response.raw_body).map_err(|e| {
                tracing::error!(
                    error = %e,
                    status = response.status.as_u16(),
                    "Failed to decode response body"
                );
                Error::DeserializationFailed {
                    raw_response: response.text(),
                    serde_error: e.to_string(),
                    status: response.status,
                }
            })?,
        };

        match (&self.hydrator, hint) {
            (Some(hydrator), Some(hint)) if hint.is_array => {
                hydrator.hydrate_array(&value, &hint.type_name)
            }
            (Some(hydrator), Some(hint)) => hydrator.hydrate(&value, &hint.type_name),
            _ => Ok(value),
        }
    }
}
