//! Template Renderer Domain Service
//!
//! Turns a template plus a domain record into daemon configuration text.
//!
//! Templates use `$NAME` placeholders (uppercase letters, digits and `_`).
//! Lowercase `$name` tokens are daemon variables and are never touched.
//! Unknown uppercase placeholders are left in place and reported so the
//! caller can warn about them.
//!
//! Lines consisting of `#@tls` or `#@plain` open a section that is kept only
//! when TLS is (or is not) active; `#@end` closes it. Sections do not nest.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::domain::entities::Domain;
use crate::domain::ports::CertificatePaths;
use crate::domain::value_objects::SiteLayout;
use crate::error::{EngineError, EngineResult};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Z][A-Z0-9_]*)").expect("placeholder pattern is valid"));

const TLS_OPEN: &str = "#@tls";
const PLAIN_OPEN: &str = "#@plain";
const SECTION_END: &str = "#@end";

/// Built-in reverse-proxy template
pub const DEFAULT_TEMPLATE: &str = r#"# Managed by sitekeeper for $DOMAIN. Local edits are overwritten on the next apply.
#@tls
server {
    listen 80;
    listen [::]:80;
    server_name $DOMAIN;

    location / {
        return 301 https://$host$request_uri;
    }
}

server {
    listen 443 ssl;
    listen [::]:443 ssl;
    server_name $DOMAIN;

    ssl_certificate $SSL_CERT_PATH;
    ssl_certificate_key $SSL_KEY_PATH;
    ssl_protocols TLSv1.2 TLSv1.3;
    ssl_session_cache shared:SSL:10m;
#@end
#@plain
server {
    listen 80;
    listen [::]:80;
    server_name $DOMAIN;
#@end

    location / {
        proxy_pass http://$BACKEND_ADDRESS:$PORT;
        proxy_http_version 1.1;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection "upgrade";
    }
}
"#;

/// Everything a template can refer to
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub domain: &'a Domain,
    pub layout: &'a SiteLayout,
    pub certificate: &'a CertificatePaths,
    /// Render the TLS variant
    pub tls: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Placeholders with no value, sorted and deduplicated
    pub unresolved: Vec<String>,
    pub tls: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render `template` for the given context
    ///
    /// Pure: the same template and context always yield the same text.
    pub fn render(&self, template: &str, ctx: &RenderContext<'_>) -> EngineResult<Rendered> {
        let selected = select_sections(template, ctx.tls)?;
        let vars = variables(ctx);
        let (text, unresolved) = substitute(&selected, &vars);
        Ok(Rendered {
            text,
            unresolved,
            tls: ctx.tls,
        })
    }
}

/// Values available to templates
pub fn variables(ctx: &RenderContext<'_>) -> BTreeMap<&'static str, String> {
    let domain = ctx.domain;
    let mut vars = BTreeMap::new();
    vars.insert("DOMAIN", domain.name.to_string());
    vars.insert("BASE_DOMAIN", domain.name.base().to_string());
    vars.insert("PORT", domain.port.to_string());
    vars.insert("BACKEND_ADDRESS", domain.backend_address.url_host());
    vars.insert("BACKEND_IP", domain.backend_address.url_host());
    vars.insert(
        "SSL_CERT_PATH",
        ctx.certificate.cert.display().to_string(),
    );
    vars.insert("SSL_KEY_PATH", ctx.certificate.key.display().to_string());
    vars.insert(
        "SITES_AVAILABLE",
        ctx.layout.available_dir().display().to_string(),
    );
    vars.insert(
        "SITES_ENABLED",
        ctx.layout.enabled_dir().display().to_string(),
    );
    vars.insert("MANAGED_PREFIX", ctx.layout.prefix().to_string());
    if let Some(root) = ctx.layout.managed_root() {
        vars.insert("MANAGED_ROOT", root.display().to_string());
    }
    vars
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Tls,
    Plain,
}

fn select_sections(template: &str, tls: bool) -> EngineResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut open: Option<(Section, usize)> = None;

    for (index, line) in template.split_inclusive('\n').enumerate() {
        let marker = line.trim();
        let line_no = index + 1;
        let opening = match marker {
            TLS_OPEN => Some(Section::Tls),
            PLAIN_OPEN => Some(Section::Plain),
            _ => None,
        };

        if let Some(section) = opening {
            if let Some((_, started)) = open {
                return Err(EngineError::render(format!(
                    "line {}: section opened at line {} is still open",
                    line_no, started
                )));
            }
            open = Some((section, line_no));
            continue;
        }

        if marker == SECTION_END {
            if open.take().is_none() {
                return Err(EngineError::render(format!(
                    "line {}: {} without an open section",
                    line_no, SECTION_END
                )));
            }
            continue;
        }

        let keep = match open {
            None => true,
            Some((Section::Tls, _)) => tls,
            Some((Section::Plain, _)) => !tls,
        };
        if keep {
            out.push_str(line);
        }
    }

    if let Some((_, started)) = open {
        return Err(EngineError::render(format!(
            "section opened at line {} is never closed",
            started
        )));
    }
    Ok(out)
}

fn substitute(text: &str, vars: &BTreeMap<&'static str, String>) -> (String, Vec<String>) {
    let mut unresolved = Vec::new();
    let out = PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
        let name = &caps[1];
        match vars.get(name) {
            Some(value) => value.clone(),
            None => {
                unresolved.push(name.to_string());
                caps[0].to_string()
            }
        }
    });
    let out = out.into_owned();
    unresolved.sort();
    unresolved.dedup();
    (out, unresolved)
}
