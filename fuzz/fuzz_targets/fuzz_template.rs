#![no_main]

use libfuzzer_sys::fuzz_target;
use sitekeeper::domain::entities::Domain;
use sitekeeper::domain::ports::CertificatePaths;
use sitekeeper::domain::services::{RenderContext, TemplateRenderer};
use sitekeeper::domain::value_objects::{BackendPort, DomainName, SiteLayout};

fuzz_target!(|data: &[u8]| {
    let Ok(template) = std::str::from_utf8(data) else {
        return;
    };
    let (Ok(name), Ok(port)) = (DomainName::parse("fuzz.example.com"), BackendPort::new(8080))
    else {
        return;
    };
    let domain = Domain::new(name, port);
    let layout = SiteLayout::new("/a", "/e", "sk-");
    let certificate = CertificatePaths {
        cert: "/c/fullchain.pem".into(),
        key: "/c/privkey.pem".into(),
    };
    for tls in [false, true] {
        let ctx = RenderContext {
            domain: &domain,
            layout: &layout,
            certificate: &certificate,
            tls,
        };
        let _ = TemplateRenderer::new().render(template, &ctx);
    }
});
