//! Integration tests for realm-adapter decisions.
//!
//! Each test drives a fully built [`RealmAdapter`] through its public API
//! with counting collaborators standing in for the container.

mod common;

use std::sync::Arc;
use std::thread;

use http::{Method, StatusCode};

use common::{
    adapter, init_tracing, CountingOracle, CountingSource, FixedAuthenticator, FixedProvider,
};
use realm_adapter::audit::{AuditEventKind, AuditOutcome};
use realm_adapter::web::{HttpRequest, RequestAdapter, ResponseRecorder};
use realm_adapter::{
    AdapterConfig, ComponentInvocation, DigestParameter, DigestRequest, Error, NetworkListener,
    NonceRegistry, Password, Principal, RedirectTarget, SecurityContext, Subject,
    UserDataOutcome, UserDataVerdict,
};

fn shop_config() -> AdapterConfig {
    AdapterConfig {
        app_name: "shop".to_string(),
        virtual_server: "server".to_string(),
        context_root: "/shop".to_string(),
        ..AdapterConfig::default()
    }
}

fn digest(cnonce: &str, nc: &str) -> DigestRequest {
    DigestRequest::new(vec![
        DigestParameter::new("username", "alice"),
        DigestParameter::new("cnonce", cnonce),
        DigestParameter::new("nc", nc),
    ])
}

#[test]
fn nonce_replay_scenario() {
    let nonces = NonceRegistry::in_memory("shop");

    assert!(nonces.admit("abc123", 1).is_ok());
    let replay = nonces.admit("abc123", 1);
    assert!(matches!(
        replay,
        Err(Error::ReplayDetected {
            incoming: 1,
            stored: 1,
            ..
        })
    ));
    assert!(nonces.admit("abc123", 2).is_ok());
}

#[test]
fn digest_login_rejects_replayed_nonce_count() {
    init_tracing();
    let adapter = adapter(
        shop_config(),
        Arc::new(CountingSource::default()),
        Arc::new(CountingOracle::grant_all()),
        Arc::new(FixedAuthenticator::answering(true)),
    );

    let first = adapter.authenticate_digest(&digest("abc123", "00000001"));
    assert_eq!(first.map(|p| p.name().to_string()), Some("alice".to_string()));

    assert!(adapter.authenticate_digest(&digest("abc123", "00000001")).is_none());
    assert!(adapter.authenticate_digest(&digest("abc123", "00000002")).is_some());

    let replays = adapter
        .audit_trail()
        .events()
        .into_iter()
        .filter(|e| e.kind() == AuditEventKind::ReplayDetection)
        .count();
    assert_eq!(replays, 1);
    SecurityContext::clear();
}

#[test]
fn concurrent_auth_config_resolution_runs_once() {
    init_tracing();
    let source = Arc::new(CountingSource::form("/login.jsp", "/error.jsp"));
    let adapter = adapter(
        shop_config(),
        Arc::clone(&source),
        Arc::new(CountingOracle::grant_all()),
        Arc::new(FixedAuthenticator::answering(true)),
    );

    let pages: Vec<(Option<String>, Option<String>)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                scope.spawn(|| {
                    let config = adapter.auth_config().expect("config resolves");
                    (
                        config.login_page().map(str::to_string),
                        config.error_page().map(str::to_string),
                    )
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread completes"))
            .collect()
    });

    assert_eq!(source.lookups(), 1);
    assert_eq!(pages.len(), 16);
    assert!(pages.iter().all(|(login, error)| {
        login.as_deref() == Some("/login.jsp") && error.as_deref() == Some("/error.jsp")
    }));
}

#[test]
fn secure_request_never_reaches_oracle() {
    let oracle = Arc::new(CountingOracle::deny_all());
    let adapter = adapter(
        shop_config(),
        Arc::new(CountingSource::default()),
        Arc::clone(&oracle),
        Arc::new(FixedAuthenticator::answering(true)),
    );
    let constraints = adapter
        .find_security_constraints()
        .expect("config resolves")
        .expect("resources are constrained");

    let mut request = RequestAdapter::new(Method::GET, "/shop/cart")
        .with_context_path("/shop")
        .secure(true);
    let mut response = ResponseRecorder::new();

    let outcome = adapter
        .has_user_data_permission(&constraints, &mut request, &mut response, None, None)
        .expect("no oracle failure");

    assert_eq!(outcome, UserDataOutcome::Allowed);
    assert_eq!(oracle.user_data_calls(), 0);
    assert!(!response.is_committed());
}

#[test]
fn secure_transport_verdict_redirects_through_front_end() {
    let oracle = Arc::new(CountingOracle::new(true, UserDataVerdict::RequiresSecureTransport));
    let adapter = adapter(
        AdapterConfig {
            redirect_port: 8443,
            listeners: vec![NetworkListener::any(8080)],
            ..shop_config()
        },
        Arc::new(CountingSource::default()),
        oracle,
        Arc::new(FixedAuthenticator::answering(true)),
    );
    let constraints = adapter
        .find_security_constraints()
        .expect("config resolves")
        .expect("resources are constrained");

    let mut request = RequestAdapter::new(Method::GET, "/shop/cart")
        .with_context_path("/shop")
        .with_header("Host", "shop.example.com")
        .with_query("page=2");
    let mut response = ResponseRecorder::new();

    let outcome = adapter
        .has_user_data_permission(&constraints, &mut request, &mut response, None, None)
        .expect("redirect sent");

    let expected = "https://shop.example.com/shop/cart?page=2";
    assert_eq!(outcome, UserDataOutcome::Redirected(expected.to_string()));
    assert_eq!(response.redirect_location(), Some(expected));
}

#[test]
fn direct_listener_redirects_to_configured_port() {
    let adapter = adapter(
        AdapterConfig {
            redirect_port: 8443,
            listeners: vec![NetworkListener::any(8080)],
            ..shop_config()
        },
        Arc::new(CountingSource::default()),
        Arc::new(CountingOracle::grant_all()),
        Arc::new(FixedAuthenticator::answering(true)),
    );

    let request = RequestAdapter::new(Method::GET, "/shop/cart")
        .with_server_name("node1.internal")
        .with_header("Host", "node1.internal:8080");

    assert_eq!(
        adapter.redirect_target(&request).expect("host header parses"),
        RedirectTarget::Target {
            host: "node1.internal".to_string(),
            port: Some(8443),
        }
    );
}

#[test]
fn disabled_redirect_answers_forbidden() {
    let oracle = Arc::new(CountingOracle::new(true, UserDataVerdict::RequiresSecureTransport));
    let adapter = adapter(
        shop_config(),
        Arc::new(CountingSource::default()),
        oracle,
        Arc::new(FixedAuthenticator::answering(true)),
    );
    let constraints = adapter
        .find_security_constraints()
        .expect("config resolves")
        .expect("resources are constrained");

    let mut request = RequestAdapter::new(Method::GET, "/shop/my cart")
        .with_header("Host", "shop.example.com");
    let mut response = ResponseRecorder::new();

    assert_eq!(
        adapter.redirect_target(&request).expect("disabled is not an error"),
        RedirectTarget::Disabled
    );

    let outcome = adapter
        .has_user_data_permission(&constraints, &mut request, &mut response, None, None)
        .expect("403 sent");

    assert_eq!(outcome, UserDataOutcome::Denied);
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.message(), Some("%2Fshop%2Fmy%20cart"));
    assert!(adapter
        .audit_trail()
        .events()
        .iter()
        .any(|e| e.kind() == AuditEventKind::TransportGuarantee && e.outcome() == AuditOutcome::Denied));
}

#[test]
fn missing_host_header_is_bad_request() {
    let oracle = Arc::new(CountingOracle::new(true, UserDataVerdict::RequiresSecureTransport));
    let adapter = adapter(
        AdapterConfig {
            redirect_port: 8443,
            ..shop_config()
        },
        Arc::new(CountingSource::default()),
        oracle,
        Arc::new(FixedAuthenticator::answering(true)),
    );
    let constraints = adapter
        .find_security_constraints()
        .expect("config resolves")
        .expect("resources are constrained");

    let mut request = RequestAdapter::new(Method::GET, "/shop/cart");
    let mut response = ResponseRecorder::new();

    let result = adapter.has_user_data_permission(&constraints, &mut request, &mut response, None, None);

    assert!(matches!(result, Err(Error::MissingHostHeader)));
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn legacy_authenticator_result_passes_through() {
    for verdict in [true, false] {
        let adapter = adapter(
            shop_config(),
            Arc::new(CountingSource::default()),
            Arc::new(CountingOracle::grant_all()),
            Arc::new(FixedAuthenticator::answering(verdict)),
        );
        let mut request = RequestAdapter::new(Method::POST, "/shop/j_security_check");
        let mut response = ResponseRecorder::new();

        let authenticated = adapter
            .authenticate(&mut request, &mut response, false)
            .expect("legacy authenticator does not fail");
        assert_eq!(authenticated, verdict);
    }
}

#[test]
fn run_as_without_binding_is_a_no_op() {
    let adapter = adapter(
        shop_config(),
        Arc::new(CountingSource::default()),
        Arc::new(CountingOracle::grant_all()),
        Arc::new(FixedAuthenticator::answering(true)),
    );
    let caller = Arc::new(SecurityContext::new(Subject::with_principals([Principal::new("alice")])));
    SecurityContext::set_current(Some(Arc::clone(&caller)));

    let mut invocation = ComponentInvocation::named("CatalogServlet");
    adapter.apply_run_as(&mut invocation).expect("nothing to apply");
    assert!(invocation.previous.is_none());
    adapter.revert_run_as(&invocation);

    let current = SecurityContext::current().expect("context untouched");
    assert!(Arc::ptr_eq(&current, &caller));
    SecurityContext::clear();
}

#[test]
fn run_as_binding_switches_and_restores_identity() {
    let config: AdapterConfig = serde_json::from_str(
        r#"{
            "app_name": "shop",
            "run_as": [{ "component": "ReportServlet", "principal": "batch" }]
        }"#,
    )
    .expect("valid config");
    let adapter = adapter(
        config,
        Arc::new(CountingSource::default()),
        Arc::new(CountingOracle::grant_all()),
        Arc::new(FixedAuthenticator::answering(true)),
    );
    let caller = Arc::new(SecurityContext::new(Subject::with_principals([Principal::new("alice")])));
    SecurityContext::set_current(Some(Arc::clone(&caller)));

    let mut invocation = ComponentInvocation::named("ReportServlet");
    adapter.apply_run_as(&mut invocation).expect("realm accepts run-as identity");

    let active = SecurityContext::current().expect("run-as context installed");
    assert_eq!(active.caller_principal().name(), "batch");

    adapter.revert_run_as(&invocation);
    let restored = SecurityContext::current().expect("caller restored");
    assert!(Arc::ptr_eq(&restored, &caller));
    SecurityContext::clear();
}

#[test]
fn login_page_allowed_despite_denying_oracle() {
    let oracle = Arc::new(CountingOracle::deny_all());
    let adapter = adapter(
        shop_config(),
        Arc::new(CountingSource::form("/login.jsp", "/error.jsp")),
        Arc::clone(&oracle),
        Arc::new(FixedAuthenticator::answering(true)),
    );
    let constraints = adapter
        .find_security_constraints()
        .expect("config resolves")
        .expect("resources are constrained");

    for path in ["/shop/login.jsp", "/shop/error.jsp", "/shop/j_security_check"] {
        let mut request = RequestAdapter::new(Method::GET, path).with_context_path("/shop");
        let mut response = ResponseRecorder::new();

        let permitted = adapter
            .has_resource_permission(&constraints, &mut request, &mut response)
            .expect("no post-authenticate failure");
        assert!(permitted, "{path} must be reachable");
        assert!(!response.is_committed());
    }
    assert_eq!(oracle.resource_calls(), 0);

    let mut request = RequestAdapter::new(Method::GET, "/shop/orders").with_context_path("/shop");
    let mut response = ResponseRecorder::new();
    assert!(!adapter
        .has_resource_permission(&constraints, &mut request, &mut response)
        .expect("denial is not an error"));
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(oracle.resource_calls(), 1);
}

#[test]
fn anonymous_only_subject_fails_mandatory_exchange() {
    init_tracing();
    let provider = Arc::new(FixedProvider::establishing([Principal::anonymous()]));
    let adapter = adapter(
        shop_config(),
        Arc::new(CountingSource::with_provider(provider)),
        Arc::new(CountingOracle::deny_all()),
        Arc::new(FixedAuthenticator::answering(true)),
    );
    let mut request = RequestAdapter::new(Method::GET, "/shop/orders").with_context_path("/shop");
    let mut response = ResponseRecorder::new();

    let authenticated = adapter
        .authenticate(&mut request, &mut response, false)
        .expect("provider path never errors");

    assert!(!authenticated);
    assert!(request.user_principal().is_none());
}

#[test]
fn password_login_installs_context_and_audits_failures() {
    let adapter = adapter(
        shop_config(),
        Arc::new(CountingSource::default()),
        Arc::new(CountingOracle::grant_all()),
        Arc::new(FixedAuthenticator::answering(true)),
    );

    let principal = adapter
        .authenticate_password("alice", &Password::new("secret"))
        .expect("correct password");
    assert_eq!(principal.name(), "alice");
    assert_eq!(
        SecurityContext::current().map(|c| c.caller_principal().name().to_string()),
        Some("alice".to_string())
    );

    assert!(adapter
        .authenticate_password("alice", &Password::new("wrong"))
        .is_none());
    let denied = adapter
        .audit_trail()
        .events()
        .into_iter()
        .filter(|e| e.kind() == AuditEventKind::Authentication && e.outcome() == AuditOutcome::Denied)
        .count();
    assert_eq!(denied, 1);
    SecurityContext::clear();
}

#[test]
fn adapter_config_deserializes_with_defaults() {
    let config: AdapterConfig = serde_json::from_str(
        r#"{
            "app_name": "shop",
            "virtual_server": "server",
            "context_root": "/shop",
            "default_provider_id": "  ",
            "listeners": [
                { "address": "0.0.0.0", "port": 8080 },
                { "port": 8181 }
            ]
        }"#,
    )
    .expect("valid config");

    assert_eq!(config.app_context_id(), "server /shop");
    assert_eq!(config.redirect_port, -1);
    assert_eq!(config.realm_name(), "default");
    assert!(config.default_provider_id().is_none());
    assert_eq!(config.listeners.len(), 2);
    assert!(config.listeners[1].address.is_none());
    assert_eq!(config.form_action, "/j_security_check");
    assert_eq!(config.session_parameter, "jsessionid");
}
