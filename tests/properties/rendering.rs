//! Property tests for the template renderer.

use proptest::prelude::*;
use sitekeeper::domain::entities::Domain;
use sitekeeper::domain::ports::CertificatePaths;
use sitekeeper::domain::services::{RenderContext, TemplateRenderer, DEFAULT_TEMPLATE};
use sitekeeper::domain::value_objects::{BackendPort, DomainName, SiteLayout};

fn domain(name: &str, port: u32) -> Domain {
    Domain::new(
        DomainName::parse(name).unwrap(),
        BackendPort::new(port).unwrap(),
    )
}

fn render(template: &str, domain: &Domain, tls: bool) -> sitekeeper::EngineResult<String> {
    let layout = SiteLayout::new("/etc/nginx/sites-available", "/etc/nginx/sites-enabled", "sk-");
    let certificate = CertificatePaths {
        cert: format!("/certs/{}/fullchain.pem", domain.name.base()).into(),
        key: format!("/certs/{}/privkey.pem", domain.name.base()).into(),
    };
    let ctx = RenderContext {
        domain,
        layout: &layout,
        certificate: &certificate,
        tls,
    };
    TemplateRenderer::new()
        .render(template, &ctx)
        .map(|r| r.text)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: Rendering is deterministic
    #[test]
    fn property_render_is_deterministic(
        name in "[a-z]{1,10}\\.[a-z]{2,5}",
        port in 1u32..=65535,
        tls in any::<bool>(),
    ) {
        let d = domain(&name, port);
        let first = render(DEFAULT_TEMPLATE, &d, tls).unwrap();
        let second = render(DEFAULT_TEMPLATE, &d, tls).unwrap();
        prop_assert_eq!(first, second);
    }

    /// PROPERTY: The default template routes to the backend in both variants
    #[test]
    fn property_default_template_routes_to_backend(
        name in "[a-z]{1,10}\\.[a-z]{2,5}",
        port in 1u32..=65535,
        tls in any::<bool>(),
    ) {
        let d = domain(&name, port);
        let text = render(DEFAULT_TEMPLATE, &d, tls).unwrap();
        let server_name = format!("server_name {};", name);
        let proxy_pass = format!("proxy_pass http://127.0.0.1:{};", port);
        prop_assert!(text.contains(&server_name));
        prop_assert!(text.contains(&proxy_pass));
        prop_assert_eq!(text.contains("ssl_certificate"), tls);
        prop_assert!(!text.contains("#@"));
    }

    /// PROPERTY: Arbitrary templates never panic the renderer
    #[test]
    fn property_arbitrary_templates_never_panic(template in any::<String>()) {
        let d = domain("example.com", 3000);
        let _ = render(&template, &d, true);
        let _ = render(&template, &d, false);
    }

    /// PROPERTY: Lowercase daemon variables pass through untouched
    #[test]
    fn property_daemon_variables_untouched(var in "[a-z][a-z_]{0,15}") {
        let d = domain("example.com", 3000);
        let template = format!("set $x ${};\n", var);
        let text = render(&template, &d, false).unwrap();
        prop_assert_eq!(text, template);
    }
}
