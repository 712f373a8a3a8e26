//! Middleware attaching the request's headers to the request extensions.
//!
//! Handlers extract the resulting [`HeaderContext`] and pass it to
//! evaluation, where the `external.http.header` function reads from it.

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use verdict_core::HeaderContext;

/// Builds the per-request header context and stores it in the extensions.
pub async fn header_context(mut request: Request, next: Next) -> Response {
    let host = request.uri().host().map(str::to_string);
    let context = context_from_parts(request.headers(), host.as_deref());
    request.extensions_mut().insert(context);
    next.run(request).await
}

/// Flattens a header map: first value per name, `host` synthesized from the
/// request when it is not an explicit header.
fn context_from_parts(headers: &HeaderMap, authority: Option<&str>) -> HeaderContext {
    let mut context = HeaderContext::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            context.insert_first(name.as_str(), value.to_string());
        }
    }
    if let Some(authority) = authority {
        context.insert_first("host", authority.to_string());
    }
    context
}

#[cfg(test)]
mod tests {
    use axum::http::header::{AUTHORIZATION, HOST};

    use super::*;

    #[test]
    fn test_context_carries_first_header_values() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "my-token".parse().unwrap());
        headers.insert(HOST, "example.com".parse().unwrap());
        headers.append(AUTHORIZATION, "second-token".parse().unwrap());

        let context = context_from_parts(&headers, None);

        assert_eq!(context.get("Authorization"), Some("my-token"));
        assert_eq!(context.get("Host"), Some("example.com"));
    }

    #[test]
    fn test_host_synthesized_from_authority() {
        let headers = HeaderMap::new();
        let context = context_from_parts(&headers, Some("example.com"));
        assert_eq!(context.get("host"), Some("example.com"));
    }

    #[test]
    fn test_explicit_host_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, "configured.example.com".parse().unwrap());

        let context = context_from_parts(&headers, Some("proxy.example.com"));
        assert_eq!(context.get("host"), Some("configured.example.com"));
    }
}
