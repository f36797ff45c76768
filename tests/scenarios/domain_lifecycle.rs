//! Scenario: Operator manages a domain from first deploy to removal
//!
//! Journey: An operator puts a new application behind the proxy, changes
//! its port, ships a broken template by mistake and finally retires it.
//!
//! Steps:
//! 1. Adds `app.example.com` on port 3000
//! 2. Moves the backend to port 4000
//! 3. Switches to a custom template the daemon rejects
//! 4. Removes the domain
//!
//! Success Criteria:
//! - Every successful step is live and recorded in history
//! - The rejected change leaves the previous configuration serving
//! - Removal leaves no managed files behind

use sitekeeper::application::{DomainRequest, EditRequest, RemoveOptions};
use sitekeeper::domain::entities::Outcome;
use sitekeeper::EngineError;

use crate::common::*;

/// SCENARIO: add, edit, rejected edit, delete
#[test]
fn scenario_domain_lifecycle_with_rollback() {
    let engine = Engine::new();

    // Step 1: add
    let report = engine
        .deploy
        .add(DomainRequest::new("app.example.com", 3000), &opts())
        .unwrap();
    assert!(report.commit.is_some(), "Step 1: add should commit");
    let text = engine.available("app.example.com").unwrap();
    assert!(text.contains("server_name app.example.com;"));
    assert!(text.contains("proxy_pass http://127.0.0.1:3000;"));
    assert!(engine.enabled("app.example.com"));

    // Step 2: edit the port
    engine
        .deploy
        .edit(
            "app.example.com",
            EditRequest {
                port: Some(4000),
                ..EditRequest::default()
            },
            &opts(),
        )
        .unwrap();
    let text = engine.available("app.example.com").unwrap();
    assert!(
        text.contains("proxy_pass http://127.0.0.1:4000;"),
        "Step 2: new port should be live:\n{}",
        text
    );

    // Step 3: broken template, daemon says no
    std::fs::create_dir_all(engine.path("templates")).unwrap();
    std::fs::write(
        engine.path("templates/broken.conf"),
        "server { listen 80; server_name $DOMAIN; oops }\n",
    )
    .unwrap();
    engine
        .daemon
        .reject_next_validate("unexpected \"}\" in sk-app.example.com.conf:1");

    let err = engine
        .deploy
        .edit(
            "app.example.com",
            EditRequest {
                template: Some(Some("broken".to_string())),
                ..EditRequest::default()
            },
            &opts(),
        )
        .unwrap_err();
    assert!(
        matches!(err, EngineError::Deployment { .. }),
        "Step 3: expected a deployment error, got {:?}",
        err
    );
    assert!(err
        .diagnostics()
        .is_some_and(|d| d.contains("unexpected \"}\"")));

    let text = engine.available("app.example.com").unwrap();
    assert!(
        text.contains("proxy_pass http://127.0.0.1:4000;") && !text.contains("oops"),
        "Step 3: previous configuration should be back:\n{}",
        text
    );
    let domain = engine
        .deploy
        .registry()
        .list()
        .unwrap()
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(domain.template, None, "Step 3: registry should be unchanged");

    let log = engine.commits();
    assert_eq!(log[0].outcome, Outcome::RolledBack);
    assert!(log[1..].iter().all(|c| c.outcome == Outcome::Applied));

    // Step 4: delete
    engine
        .deploy
        .remove("app.example.com", &RemoveOptions::new())
        .unwrap();
    assert!(engine.available("app.example.com").is_none());
    assert!(!engine.enabled("app.example.com"));
    assert!(engine.domain_names().is_empty());
    assert_eq!(engine.commits().len(), 4);
}

/// SCENARIO: two domains share the daemon; a failure in one leaves the other alone
#[test]
fn scenario_failed_add_does_not_disturb_neighbours() {
    let engine = Engine::new();
    engine
        .deploy
        .add(DomainRequest::new("a.example.com", 3000), &opts())
        .unwrap();
    let before = engine.available("a.example.com").unwrap();

    engine.daemon.reject_next_validate("duplicate listen options");
    let err = engine
        .deploy
        .add(DomainRequest::new("b.example.com", 3001), &opts())
        .unwrap_err();
    assert_eq!(err.exit_code(), 6);

    assert_eq!(engine.available("a.example.com").unwrap(), before);
    assert!(engine.available("b.example.com").is_none());
    assert!(!engine.enabled("b.example.com"));
    assert_eq!(engine.domain_names(), vec!["a.example.com"]);
}

/// SCENARIO: invalid input never reaches the daemon
#[test]
fn scenario_invalid_requests_are_rejected_up_front() {
    let engine = Engine::new();

    for request in [
        DomainRequest::new("bad_name.com", 3000),
        DomainRequest::new("ok.example.com", 0),
        DomainRequest::new("ok.example.com", 70000),
        DomainRequest::new("ok.example.com", 3000).with_backend("not a host"),
    ] {
        let err = engine.deploy.add(request, &opts()).unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }), "{:?}", err);
    }

    assert!(engine.daemon.calls().is_empty());
    assert!(engine.commits().is_empty());
}
