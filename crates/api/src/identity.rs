//! Caller identity extracted from the `X-User-*` headers.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::RequestContext;
use common::context::{USER_EMAIL_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};

/// The caller of the current request.
///
/// Requests without an `X-User-ID` header run as the system identity.
#[derive(Debug, Clone)]
pub struct Caller(pub RequestContext);

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(user_id) = header(headers, USER_ID_HEADER) else {
            return Caller(RequestContext::system());
        };
        let role = header(headers, USER_ROLE_HEADER).unwrap_or_default();
        let ctx = RequestContext::new(user_id, role);
        Caller(match header(headers, USER_EMAIL_HEADER) {
            Some(email) => ctx.with_email(email),
            None => ctx,
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller::from_headers(&parts.headers))
    }
}
