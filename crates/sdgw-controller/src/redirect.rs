//! Plain-HTTP listener that answers every request with a 301 to the
//! matching HTTPS URL.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;

#[derive(Clone, Copy)]
struct RedirectPorts {
    http: u16,
    https: u16,
}

/// Router that redirects everything it receives.
pub fn build_router(http_port: u16, https_port: u16) -> Router {
    Router::new()
        .fallback(redirect_to_https)
        .with_state(RedirectPorts {
            http: http_port,
            https: https_port,
        })
}

async fn redirect_to_https(
    State(ports): State<RedirectPorts>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let target = format!("https://{}{uri}", rewrite_host(host, ports.http, ports.https));

    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, target)],
    )
        .into_response()
}

/// Swap the plain-HTTP port for the HTTPS one, appending it when the host
/// carries no port at all.
fn rewrite_host(host: &str, http_port: u16, https_port: u16) -> String {
    let http_suffix = format!(":{http_port}");
    let https_suffix = format!(":{https_port}");

    if let Some(bare) = host.strip_suffix(&http_suffix) {
        format!("{bare}{https_suffix}")
    } else if host.ends_with(&https_suffix) {
        host.to_string()
    } else {
        format!("{host}{https_suffix}")
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn rewrites_http_port() {
        assert_eq!(rewrite_host("gw.example:8080", 8080, 8443), "gw.example:8443");
    }

    #[test]
    fn keeps_https_port() {
        assert_eq!(rewrite_host("gw.example:8443", 8080, 8443), "gw.example:8443");
    }

    #[test]
    fn appends_port_when_missing() {
        assert_eq!(rewrite_host("gw.example", 8080, 8443), "gw.example:8443");
    }

    #[tokio::test]
    async fn redirects_with_path_and_query() {
        let app = build_router(8080, 8443);
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/nodes?x=1")
                    .header("host", "gw.example:8080")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        let location = resp.headers().get("location").unwrap().to_str().unwrap();
        assert_eq!(location, "https://gw.example:8443/api/nodes?x=1");
    }
}
