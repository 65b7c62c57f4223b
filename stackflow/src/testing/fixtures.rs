//! Request fixtures for tests.

use crate::core::{StackRequest, StackRequestBuilder, TemplateSource};

/// Template body used by [`request`].
pub const TEMPLATE_BODY: &str = r#"{"Resources":{"Bucket":{"Type":"AWS::S3::Bucket"}}}"#;

/// Returns a builder for `name` with [`TEMPLATE_BODY`] as its template.
#[must_use]
pub fn builder(name: &str) -> StackRequestBuilder {
    StackRequest::builder(name, TemplateSource::Body(TEMPLATE_BODY.to_string()))
}

/// Returns a request for `name` with default flags.
///
/// # Panics
///
/// Panics if `name` is not a valid stack name.
#[must_use]
pub fn request(name: &str) -> StackRequest {
    builder(name)
        .build()
        .unwrap_or_else(|e| panic!("invalid fixture stack name {name}: {e}"))
}

/// Returns a request that succeeds when its change set is empty.
///
/// # Panics
///
/// Panics if `name` is not a valid stack name.
#[must_use]
pub fn idempotent_request(name: &str) -> StackRequest {
    builder(name)
        .allow_empty_change_set(true)
        .build()
        .unwrap_or_else(|e| panic!("invalid fixture stack name {name}: {e}"))
}

/// Returns the template every fixture request carries.
#[must_use]
pub fn template() -> TemplateSource {
    TemplateSource::Body(TEMPLATE_BODY.to_string())
}
