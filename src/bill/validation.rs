//! Request size limits.
//!
//! Field contents are opaque; only their sizes are bounded so a single request
//! cannot exhaust memory or disk in its workspace.

use std::fmt;

use super::models::BillRequest;

pub const DEFAULT_MAX_FIELD_LEN: usize = 256;
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Upper bounds applied to every request before any work is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    /// Maximum characters per text field.
    pub max_field_len: usize,
    /// Maximum decoded image size in bytes.
    pub max_image_bytes: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_field_len: DEFAULT_MAX_FIELD_LEN,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl RequestLimits {
    /// Longest base64 text that can decode to at most `max_image_bytes`.
    pub fn max_image_base64_len(&self) -> usize {
        self.max_image_bytes.div_ceil(3) * 4
    }

    /// JSON body limit: the largest image, line-wrapped with escaped CRLF
    /// every 76 characters, plus room for the text fields.
    pub fn max_body_bytes(&self) -> usize {
        let image = self.max_image_base64_len();
        image + image / 19 + 64 * 1024 + 32 * self.max_field_len
    }
}

/// A single rejected field.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn too_long(field: &str, limit: usize) -> Self {
        Self::new(field, format!("must be at most {} characters", limit))
    }

    pub fn image_too_large(field: &str, limit: usize) -> Self {
        Self::new(field, format!("image must be at most {} bytes", limit))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// One line listing every rejected field.
    pub fn message(&self) -> String {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        format!("invalid request: {}", parts.join("; "))
    }

    /// Ok if nothing was rejected, otherwise the combined message.
    pub fn into_result(self) -> Result<(), String> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.message())
        }
    }
}

pub fn validate_max_len(value: &str, field: &str, limit: usize, errors: &mut ValidationErrors) {
    if value.chars().count() > limit {
        errors.add(ValidationError::too_long(field, limit));
    }
}

/// Rejects base64 payloads that cannot fit the decoded image limit.
pub fn validate_image_payload(
    value: Option<&str>,
    field: &str,
    limits: &RequestLimits,
    errors: &mut ValidationErrors,
) {
    if let Some(payload) = value {
        let encoded = payload
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .count();
        if encoded > limits.max_image_base64_len() + 128 {
            errors.add(ValidationError::image_too_large(field, limits.max_image_bytes));
        }
    }
}

impl BillRequest {
    /// Check the request against `limits`, collecting every violation.
    pub fn validate(&self, limits: &RequestLimits) -> Result<(), String> {
        let mut errors = ValidationErrors::new();

        for (field, value) in self.fields() {
            validate_max_len(value, field, limits.max_field_len, &mut errors);
        }
        validate_image_payload(
            self.image_base64.as_deref(),
            "image_base64",
            limits,
            &mut errors,
        );

        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_request_is_valid() {
        assert!(BillRequest::sample()
            .validate(&RequestLimits::default())
            .is_ok());
    }

    #[test]
    fn test_long_fields_are_reported_together() {
        let mut request = BillRequest::sample();
        request.owner_name = "A".repeat(300);
        request.renter_name = "B".repeat(257);

        let message = request.validate(&RequestLimits::default()).unwrap_err();
        assert!(message.contains("owner_name must be at most 256 characters"));
        assert!(message.contains("renter_name"));
    }

    #[test]
    fn test_field_length_counts_characters_not_bytes() {
        let mut errors = ValidationErrors::new();
        validate_max_len(&"₹".repeat(10), "monthly_rent", 10, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_oversized_image_payload_is_rejected() {
        let limits = RequestLimits {
            max_field_len: 256,
            max_image_bytes: 30,
        };
        let mut request = BillRequest::sample();
        request.image_base64 = Some("A".repeat(1000));

        let message = request.validate(&limits).unwrap_err();
        assert!(message.contains("image must be at most 30 bytes"));
    }

    #[test]
    fn test_line_wrapped_image_payload_within_limit() {
        let limits = RequestLimits {
            max_field_len: 256,
            max_image_bytes: 30_000,
        };
        let encoded = "A".repeat(limits.max_image_base64_len());
        let wrapped = encoded
            .as_bytes()
            .chunks(76)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");
        assert!(wrapped.len() > limits.max_image_base64_len() + 128);

        let mut request = BillRequest::sample();
        request.image_base64 = Some(wrapped);
        assert!(request.validate(&limits).is_ok());
        assert!(serde_json::to_string(&request).unwrap().len() <= limits.max_body_bytes());
    }

    #[test]
    fn test_base64_bound() {
        let limits = RequestLimits {
            max_field_len: 1,
            max_image_bytes: 10,
        };
        assert_eq!(limits.max_image_base64_len(), 16);
    }
}
