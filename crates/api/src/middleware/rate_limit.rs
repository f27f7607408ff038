//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: strict limits for login and registration (~10/min)
//! - `api_rate_limiter`: relaxed limits for order and catalog endpoints (~100/min)
//!
//! Rejections are rendered through [`AppError`] so clients always see the
//! JSON error envelope.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use axum::response::{IntoResponse, Response};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::error::AppError;

/// Proxy headers carrying the client IP, in order of trust.
const CLIENT_IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-forwarded-for", "x-real-ip"];

/// Key extractor that reads the client IP from reverse proxy headers.
///
/// For `X-Forwarded-For` the first (client-most) address is used. Without
/// any proxy header the peer address from [`ConnectInfo`] is used, so the
/// server must be started with `into_make_service_with_connect_info`.
#[derive(Clone, Copy)]
pub struct ProxyIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ProxyIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        client_ip(req.headers())
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

/// Render a limiter rejection as an [`AppError`] response.
///
/// Throttled requests keep the `retry-after` and `x-ratelimit-*` headers
/// produced by the limiter.
fn rejection(err: GovernorError) -> Response {
    match err {
        GovernorError::TooManyRequests { wait_time, headers } => {
            tracing::warn!(wait_time, "Rate limit exceeded");
            let mut response = AppError::RateLimited.into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => {
            AppError::Internal("unable to determine client address".to_string()).into_response()
        }
        GovernorError::Other { code, msg, .. } => AppError::Internal(format!(
            "rate limiter error ({code}): {}",
            msg.unwrap_or_default()
        ))
        .into_response(),
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ProxyIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create rate limiter for auth endpoints: ~10 requests per minute per IP.
///
/// Replenishes one token every 6 seconds with a burst of 5.
///
/// # Panics
///
/// Does not panic; the period and burst are fixed positive values.
#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ProxyIpKeyExtractor)
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config)).error_handler(rejection)
}

/// Create rate limiter for the general API: ~100 requests per minute per IP.
///
/// Replenishes one token per second with a burst of 50.
///
/// # Panics
///
/// Does not panic; the period and burst are fixed positive values.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ProxyIpKeyExtractor)
        .per_second(1)
        .burst_size(50)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(50) is valid");
    GovernorLayer::new(Arc::new(config)).error_handler(rejection)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{HeaderValue, StatusCode};
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let map = headers(&[
            ("cf-connecting-ip", "203.0.113.7"),
            ("x-forwarded-for", "198.51.100.1"),
        ]);
        assert_eq!(client_ip(&map), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn test_forwarded_for_uses_first_hop() {
        let map = headers(&[("x-forwarded-for", "198.51.100.1, 10.0.0.2")]);
        assert_eq!(client_ip(&map), Some("198.51.100.1".parse().unwrap()));
    }

    #[test]
    fn test_no_headers() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
        assert_eq!(client_ip(&headers(&[("x-real-ip", "garbage")])), None);
    }

    #[test]
    fn test_peer_address_fallback() {
        let mut req = Request::new(());
        assert!(matches!(
            ProxyIpKeyExtractor.extract(&req),
            Err(GovernorError::UnableToExtractKey)
        ));

        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 4], 51_000))));
        assert_eq!(
            ProxyIpKeyExtractor.extract(&req).unwrap(),
            "192.0.2.4".parse::<IpAddr>().unwrap()
        );

        req.headers_mut()
            .insert("x-real-ip", HeaderValue::from_static("198.51.100.8"));
        assert_eq!(
            ProxyIpKeyExtractor.extract(&req).unwrap(),
            "198.51.100.8".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_throttled_response_keeps_retry_after() {
        let response = rejection(GovernorError::TooManyRequests {
            wait_time: 4,
            headers: Some(headers(&[("retry-after", "4")])),
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "4");
    }

    #[test]
    fn test_missing_key_is_internal() {
        let response = rejection(GovernorError::UnableToExtractKey);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
