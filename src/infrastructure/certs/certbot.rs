//! certbot-backed certificate client
//!
//! Material lives at `<cert_root>/live/<base>/{fullchain,privkey}.pem`, where
//! `<base>` drops any wildcard prefix so `*.example.com` and `example.com`
//! share a lineage.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::config::CertificatesConfig;
use crate::domain::entities::IssuanceMode;
use crate::domain::ports::{
    CertClientError, CertificateClient, CertificatePaths, CertificateRequest,
};
use crate::domain::value_objects::DomainName;
use crate::infrastructure::daemon::{run_with_timeout, RunError};

const RATE_LIMIT_MARKERS: &[&str] = &[
    "too many certificates",
    "too many failed authorizations",
    "ratelimited",
    "rate limit",
];

#[derive(Debug, Clone)]
pub struct CertbotClient {
    program: String,
    cert_root: PathBuf,
    timeout: Duration,
}

impl CertbotClient {
    pub fn new(program: impl Into<String>, cert_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            cert_root: cert_root.into(),
            timeout,
        }
    }

    pub fn from_config(config: &CertificatesConfig) -> Self {
        Self::new(config.client.clone(), config.cert_root.clone(), config.timeout())
    }

    fn run(&self, args: Vec<String>) -> Result<String, CertClientError> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(args);

        let output = run_with_timeout(&argv, self.timeout).map_err(|e| match e {
            RunError::Timeout { after, .. } => CertClientError::Timeout { after },
            other => CertClientError::Spawn {
                message: other.to_string(),
            },
        })?;

        let text = output.combined();
        if output.success() {
            return Ok(text);
        }
        let lower = text.to_lowercase();
        if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
            Err(CertClientError::RateLimited { diagnostics: text })
        } else {
            Err(CertClientError::Failed { diagnostics: text })
        }
    }
}

/// Arguments for a new issuance
pub fn issue_args(request: &CertificateRequest) -> Vec<String> {
    let base = request.domain.base();
    let mut args: Vec<String> = vec!["certonly".into()];

    match (request.mode, &request.dns) {
        (IssuanceMode::DnsChallenge, Some(dns)) => {
            args.push(format!("--dns-{}", dns.plugin));
            args.push(format!("--dns-{}-credentials", dns.plugin));
            args.push(dns.credentials_file.display().to_string());
        }
        _ => args.push("--nginx".into()),
    }

    args.extend([
        "--non-interactive".into(),
        "--agree-tos".into(),
        "--cert-name".into(),
        base.to_string(),
    ]);
    match &request.email {
        Some(email) => {
            args.push("--email".into());
            args.push(email.clone());
        }
        None => args.push("--register-unsafely-without-email".into()),
    }

    if request.mode == IssuanceMode::DnsChallenge {
        args.extend(["-d".into(), base.to_string()]);
        args.extend(["-d".into(), format!("*.{}", base)]);
    } else {
        args.extend(["-d".into(), request.domain.to_string()]);
    }

    if request.force {
        args.push("--force-renewal".into());
    }
    if request.staging {
        args.push("--staging".into());
    }
    args
}

/// Arguments for renewing an existing lineage
pub fn renew_args(request: &CertificateRequest) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "renew".into(),
        "--cert-name".into(),
        request.domain.base().to_string(),
        "--non-interactive".into(),
    ];
    if request.force {
        args.push("--force-renewal".into());
    }
    if request.staging {
        args.push("--staging".into());
    }
    args
}

pub fn delete_args(domain: &DomainName) -> Vec<String> {
    vec![
        "delete".into(),
        "--cert-name".into(),
        domain.base().to_string(),
        "--non-interactive".into(),
    ]
}

impl CertificateClient for CertbotClient {
    fn paths(&self, domain: &DomainName) -> CertificatePaths {
        let dir = self.cert_root.join("live").join(domain.base());
        CertificatePaths {
            cert: dir.join("fullchain.pem"),
            key: dir.join("privkey.pem"),
        }
    }

    fn issue(&self, request: &CertificateRequest) -> Result<String, CertClientError> {
        info!(domain = %request.domain, mode = request.mode.as_str(), "issuing certificate");
        self.run(issue_args(request))
    }

    fn renew(&self, request: &CertificateRequest) -> Result<String, CertClientError> {
        info!(domain = %request.domain, force = request.force, "renewing certificate");
        self.run(renew_args(request))
    }

    fn delete(&self, domain: &DomainName) -> Result<String, CertClientError> {
        info!(domain = %domain, "deleting certificate");
        self.run(delete_args(domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::DnsCredentials;

    fn request(name: &str, mode: IssuanceMode) -> CertificateRequest {
        CertificateRequest {
            domain: DomainName::parse(name).unwrap(),
            mode,
            email: Some("ops@example.com".into()),
            dns: None,
            staging: false,
            force: false,
        }
    }

    #[test]
    fn standard_issuance_uses_nginx_plugin() {
        let args = issue_args(&request("www.example.com", IssuanceMode::Standard));
        assert_eq!(
            args,
            vec![
                "certonly",
                "--nginx",
                "--non-interactive",
                "--agree-tos",
                "--cert-name",
                "www.example.com",
                "--email",
                "ops@example.com",
                "-d",
                "www.example.com",
            ]
        );
    }

    #[test]
    fn dns_issuance_covers_base_and_wildcard() {
        let mut req = request("*.example.com", IssuanceMode::DnsChallenge);
        req.email = None;
        req.staging = true;
        req.dns = Some(DnsCredentials {
            plugin: "cloudflare".into(),
            credentials_file: PathBuf::from("/root/cf.ini"),
        });

        let args = issue_args(&req);
        assert_eq!(&args[1..4], &["--dns-cloudflare", "--dns-cloudflare-credentials", "/root/cf.ini"]);
        assert!(args.contains(&"--register-unsafely-without-email".to_string()));
        let joined = args.join(" ");
        assert!(joined.contains("--cert-name example.com"));
        assert!(joined.contains("-d example.com -d *.example.com"));
        assert_eq!(args.last().unwrap(), "--staging");
    }

    #[test]
    fn renew_and_delete_name_the_lineage() {
        let mut req = request("*.example.com", IssuanceMode::DnsChallenge);
        req.force = true;
        assert_eq!(
            renew_args(&req),
            vec!["renew", "--cert-name", "example.com", "--non-interactive", "--force-renewal"]
        );
        assert_eq!(
            delete_args(&req.domain),
            vec!["delete", "--cert-name", "example.com", "--non-interactive"]
        );
    }

    #[test]
    fn paths_use_base_name() {
        let client = CertbotClient::new("certbot", "/etc/letsencrypt", Duration::from_secs(1));
        let paths = client.paths(&DomainName::parse("*.example.com").unwrap());
        assert_eq!(paths.cert, PathBuf::from("/etc/letsencrypt/live/example.com/fullchain.pem"));
        assert_eq!(paths.key, PathBuf::from("/etc/letsencrypt/live/example.com/privkey.pem"));
    }

    #[cfg(unix)]
    #[test]
    fn rate_limit_is_recognised() {
        let client = CertbotClient::new("sh", "/tmp", Duration::from_secs(5));
        let err = client
            .run(vec![
                "-c".into(),
                "echo 'Error: too many certificates already issued' >&2; exit 1".into(),
            ])
            .unwrap_err();
        assert!(matches!(err, CertClientError::RateLimited { .. }));

        let err = client
            .run(vec!["-c".into(), "echo 'DNS problem' >&2; exit 1".into()])
            .unwrap_err();
        assert_eq!(err.diagnostics(), "DNS problem");
    }
}
