//! Request metrics middleware and the owner extractor.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use std::future::Future;
use std::time::Instant;

use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
};

/// Header naming the caller on whose behalf a request is made.
pub const OWNER_HEADER: &str = "x-owner-id";

/// Owner used when no header is sent.
pub const ANONYMOUS: &str = "anonymous";

/// Metrics middleware that tracks HTTP request duration and counts.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Extractor for the `X-Owner-Id` header.
///
/// There is no authentication; the header only scopes reads and writes.
#[derive(Debug, Clone)]
pub struct Owner(pub Option<String>);

impl Owner {
    /// Owner id to record on new resources.
    pub fn id(&self) -> &str {
        self.0.as_deref().unwrap_or(ANONYMOUS)
    }

    /// Owner to restrict lookups to, if the caller named one.
    pub fn scope(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let owner = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        std::future::ready(Ok(Owner(owner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn whoami(owner: Owner) -> String {
        owner.id().to_string()
    }

    async fn call(request: Request<Body>) -> String {
        let app = Router::new().route("/whoami", get(whoami));
        let response = app.oneshot(request).await.unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_owner_from_header() {
        let request = Request::builder()
            .uri("/whoami")
            .header("X-Owner-Id", "alice")
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(request).await, "alice");
    }

    #[tokio::test]
    async fn test_owner_defaults_to_anonymous() {
        let request = Request::builder()
            .uri("/whoami")
            .header("X-Owner-Id", "  ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(request).await, ANONYMOUS);
    }
}
