//! Scenario: Operator moves sites onto TLS
//!
//! Journey: A plain-HTTP site is switched to TLS, a wildcard site is added
//! before DNS credentials are configured, and later with them.
//!
//! Steps:
//! 1. Adds `shop.example.com` without TLS, then enables TLS
//! 2. Adds `*.apps.example.com` with TLS but no DNS plugin configured
//! 3. Repeats with a DNS plugin and credentials file
//! 4. Renews everything that is due
//!
//! Success Criteria:
//! - The site stays reachable over plain HTTP whenever TLS cannot be activated
//! - Certificates are filed under the base name of wildcard domains
//! - Fresh certificates are not renewed

use chrono::Duration;
use sitekeeper::application::{CertAction, DomainRequest, EditRequest, ProvisionSettings};
use sitekeeper::domain::entities::CertState;
use sitekeeper::domain::value_objects::DomainName;
use sitekeeper::EngineError;

use crate::common::*;

/// SCENARIO: enabling TLS on a live plain site
#[test]
fn scenario_plain_site_moves_to_tls() {
    let engine = Engine::new();

    // Step 1: plain first
    engine
        .deploy
        .add(DomainRequest::new("shop.example.com", 8080), &opts())
        .unwrap();
    assert!(!engine
        .available("shop.example.com")
        .unwrap()
        .contains("ssl_certificate"));

    let report = engine
        .deploy
        .edit(
            "shop.example.com",
            EditRequest {
                tls: Some(true),
                ..EditRequest::default()
            },
            &opts(),
        )
        .unwrap();

    assert!(report.tls_live);
    assert_eq!(report.cert_action, Some(CertAction::Issued));
    let cert = engine.path("letsencrypt/live/shop.example.com/fullchain.pem");
    assert!(cert.exists());

    let text = engine.available("shop.example.com").unwrap();
    assert!(text.contains("listen 443 ssl"), "{}", text);
    assert!(text.contains(&format!("ssl_certificate {};", cert.display())));

    let record = engine
        .deploy
        .registry()
        .certificate(&DomainName::parse("shop.example.com").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(record.state, CertState::Active);
    assert!(record.expires_at.is_some());
}

/// SCENARIO: wildcard without DNS settings is served over HTTP and reported
#[test]
fn scenario_wildcard_without_dns_plugin_degrades_to_plain_http() {
    let engine = Engine::new();

    // Step 2
    let report = engine
        .deploy
        .add(
            DomainRequest::new("*.apps.example.com", 3000).with_tls(true),
            &opts(),
        )
        .unwrap();

    assert!(!report.tls_live);
    match &report.degraded {
        Some(EngineError::Certificate { message, .. }) => {
            assert!(message.contains("dns_plugin"), "{}", message)
        }
        other => panic!("expected a certificate error, got {:?}", other),
    }
    assert!(engine.ca.requests.lock().unwrap().is_empty());

    let text = engine.available("*.apps.example.com").unwrap();
    assert!(text.contains("server_name *.apps.example.com;"));
    assert!(!text.contains("ssl_certificate"));
    assert!(engine.enabled("*.apps.example.com"));

    // The degraded report still surfaces as an error with the certificate exit code
    let err = report.into_result().unwrap_err();
    assert_eq!(err.exit_code(), 5);
}

/// SCENARIO: wildcard with DNS settings gets a certificate under the base name
#[test]
fn scenario_wildcard_with_dns_plugin_goes_tls() {
    let credentials = tempfile::NamedTempFile::new().unwrap();
    let engine = Engine::with_settings(ProvisionSettings {
        dns_plugin: Some("cloudflare".to_string()),
        dns_credentials: Some(credentials.path().to_path_buf()),
        ..ProvisionSettings::default()
    });

    // Step 3
    let report = engine
        .deploy
        .add(
            DomainRequest::new("*.apps.example.com", 3000).with_tls(true),
            &opts(),
        )
        .unwrap();

    assert!(report.tls_live, "degraded: {:?}", report.degraded);
    assert_eq!(
        engine.ca.requests.lock().unwrap().clone(),
        vec!["issue *.apps.example.com"]
    );
    let text = engine.available("*.apps.example.com").unwrap();
    assert!(text.contains("letsencrypt/live/apps.example.com/fullchain.pem"));

    // Step 4: nothing is due yet
    let outcomes = engine.deploy.renew_due(&opts()).unwrap();
    assert!(outcomes.is_empty());
}

/// SCENARIO: a certificate inside the renewal window is renewed and stays live
#[test]
fn scenario_renew_due_refreshes_expiring_certificate() {
    let engine = Engine::with_settings(ProvisionSettings {
        renew_before: Duration::days(100),
        ..ProvisionSettings::default()
    });
    engine
        .deploy
        .add(
            DomainRequest::new("api.example.com", 9000).with_tls(true),
            &opts(),
        )
        .unwrap();

    // Fake certificates last 90 days, so a 100-day window makes them due
    let outcomes = engine.deploy.renew_due(&opts()).unwrap();
    assert_eq!(outcomes.len(), 1);
    let report = outcomes[0].result.as_ref().unwrap();
    assert_eq!(report.cert_action, Some(CertAction::Renewed));
    assert!(report.tls_live);
    assert!(engine
        .ca
        .requests
        .lock()
        .unwrap()
        .contains(&"renew api.example.com".to_string()));
}
