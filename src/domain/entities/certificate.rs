//! Certificate record and its lifecycle state machine

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};

use super::site::IssuanceMode;
use crate::domain::value_objects::DomainName;

/// Lifecycle state of a domain's certificate
///
/// ```text
/// None ─▶ Requested ─▶ Issued ─▶ Active ─▶ Expiring ─▶ Requested ─▶ Renewed ─▶ Active
///            │                      │          │            │
///            ▼                      ▼          ▼            ▼
///          None                  Expired   RenewFailed  RenewFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertState {
    None,
    Requested,
    Issued,
    Active,
    Expiring,
    RenewFailed,
    Renewed,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("certificate state cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub from: CertState,
    pub to: CertState,
}

impl CertState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertState::None => "none",
            CertState::Requested => "requested",
            CertState::Issued => "issued",
            CertState::Active => "active",
            CertState::Expiring => "expiring",
            CertState::RenewFailed => "renew-failed",
            CertState::Renewed => "renewed",
            CertState::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "none" => CertState::None,
            "requested" => CertState::Requested,
            "issued" => CertState::Issued,
            "active" => CertState::Active,
            "expiring" => CertState::Expiring,
            "renew-failed" => CertState::RenewFailed,
            "renewed" => CertState::Renewed,
            "expired" => CertState::Expired,
            _ => return None,
        })
    }

    /// States in which the certificate files are present and usable
    pub fn has_material(&self) -> bool {
        matches!(
            self,
            CertState::Issued
                | CertState::Active
                | CertState::Expiring
                | CertState::Renewed
                | CertState::RenewFailed
        )
    }

    pub fn can_transition_to(&self, next: CertState) -> bool {
        use CertState as S;
        matches!(
            (self, next),
            (S::None, S::Requested)
                | (S::Requested, S::Issued | S::Renewed | S::None | S::RenewFailed)
                | (S::Issued, S::Active | S::Requested | S::Expired)
                | (S::Active, S::Expiring | S::Requested | S::RenewFailed | S::Expired)
                | (S::Expiring, S::Requested | S::RenewFailed | S::Expired)
                | (S::RenewFailed, S::Requested | S::Expired)
                | (S::Renewed, S::Active | S::Requested)
                | (S::Expired, S::Requested)
        )
    }

    pub fn transition(self, next: CertState) -> Result<CertState, InvalidTransition> {
        if self == next || self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl std::fmt::Display for CertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CertificateRecord {
    pub domain: DomainName,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub mode: IssuanceMode,
    pub state: CertState,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl CertificateRecord {
    pub fn new(
        domain: DomainName,
        cert_path: PathBuf,
        key_path: PathBuf,
        mode: IssuanceMode,
    ) -> Self {
        Self {
            domain,
            cert_path,
            key_path,
            mode,
            state: CertState::None,
            expires_at: None,
            last_checked: None,
        }
    }

    /// Move to `next`, failing on an edge the lifecycle does not allow
    pub fn advance(&mut self, next: CertState) -> Result<(), InvalidTransition> {
        self.state = self.state.transition(next)?;
        Ok(())
    }

    /// Whole days left before expiry (negative once expired)
    pub fn days_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|at| (at - now).num_days())
    }

    /// Valid now and for longer than `threshold`
    pub fn is_fresh(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.state.has_material()
            && self
                .expires_at
                .is_some_and(|at| at > now && at - now > threshold)
    }

    /// Material exists and has not expired yet
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.state.has_material() && self.expires_at.is_some_and(|at| at > now)
    }

    /// State implied by the recorded expiry at `now`
    ///
    /// Only ever moves forward along the expiry edges; other states are kept.
    pub fn classify(&self, now: DateTime<Utc>, threshold: Duration) -> CertState {
        let Some(at) = self.expires_at else {
            return self.state;
        };
        if self.state.has_material() && at <= now {
            return CertState::Expired;
        }
        if self.state == CertState::Active && at - now <= threshold {
            return CertState::Expiring;
        }
        self.state
    }
}
