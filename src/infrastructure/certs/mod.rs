//! Certificate authority client and certificate inspection

mod certbot;
mod x509;

pub use certbot::{delete_args, issue_args, renew_args, CertbotClient};
pub use x509::{pem_expiry, X509Inspector};
