use scrapeforge_core::errors::{CoreError, FetchError};

#[test]
fn status_codes_match_http_semantics() {
    assert_eq!(CoreError::Validation("bad".into()).status_code(), 400);
    assert_eq!(CoreError::Auth.status_code(), 401);
    assert_eq!(CoreError::Billing.status_code(), 402);
    assert_eq!(CoreError::Authorization.status_code(), 403);
    assert_eq!(CoreError::NotFound("job".into()).status_code(), 404);
    assert_eq!(CoreError::Timeout.status_code(), 408);
    assert_eq!(CoreError::RateLimited { retry_after_ms: 500 }.status_code(), 429);
    assert_eq!(CoreError::Engine { code: "x".into() }.status_code(), 500);
}

#[test]
fn fetch_error_transience_drives_fallback_chain_advance() {
    assert!(FetchError::Dns("nxdomain".into()).is_transient());
    assert!(FetchError::Ssl("expired cert".into()).is_transient());
    assert!(FetchError::Timeout.is_transient());
    assert!(FetchError::Http5xx { status: 503 }.is_transient());
    assert!(FetchError::EngineSpecific("renderer crashed".into()).is_transient());

    assert!(!FetchError::Http4xx { status: 404 }.is_transient());
    assert!(!FetchError::UnsupportedFile("application/zip".into()).is_transient());
}

#[test]
fn fetch_error_codes_are_stable_wire_identifiers() {
    assert_eq!(FetchError::Dns(String::new()).code(), "dns");
    assert_eq!(FetchError::Http4xx { status: 404 }.code(), "http4xx");
    assert_eq!(FetchError::Http5xx { status: 500 }.code(), "http5xx");
}

#[test]
fn adapter_error_propagates_through_core_error() {
    let err: CoreError = FetchError::Timeout.into();
    assert_eq!(err.status_code(), 500);
}
