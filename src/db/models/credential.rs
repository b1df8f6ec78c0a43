use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::compliance::WorkerComplianceStatus;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Credential {
    pub id: i64,
    pub qr_code: String,
    pub token: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub valid_from: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub valid_until: OffsetDateTime,
    pub worker_id: i64,
    pub created_by: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub revoked_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    Valid,
    NotYetValid,
    Expired,
    Revoked,
}

impl Credential {
    pub fn state_at(&self, now: OffsetDateTime) -> CredentialState {
        if self.revoked_at.is_some() || !self.is_active {
            CredentialState::Revoked
        } else if now < self.valid_from {
            CredentialState::NotYetValid
        } else if now > self.valid_until {
            CredentialState::Expired
        } else {
            CredentialState::Valid
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewCredential {
    pub worker_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub valid_until: OffsetDateTime,
}

/// Answer given to a guard scanning a credential at the gate.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialVerification {
    pub credential_id: i64,
    pub worker_id: i64,
    pub worker_name: String,
    pub company_id: i64,
    pub state: CredentialState,
    pub compliance_status: WorkerComplianceStatus,
    /// Entry is granted only to a valid credential held by a compliant worker.
    pub access_granted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn credential(now: OffsetDateTime) -> Credential {
        Credential {
            id: 1,
            qr_code: "sso-credential:1:abc".to_string(),
            token: "abc".to_string(),
            is_active: true,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(30),
            worker_id: 7,
            created_by: 1,
            created_at: now - Duration::days(1),
            revoked_at: None,
        }
    }

    #[test]
    fn state_follows_validity_window() {
        let now = OffsetDateTime::now_utc();
        let cred = credential(now);
        assert_eq!(cred.state_at(now), CredentialState::Valid);
        assert_eq!(cred.state_at(now - Duration::days(2)), CredentialState::NotYetValid);
        assert_eq!(cred.state_at(now + Duration::days(31)), CredentialState::Expired);
    }

    #[test]
    fn revocation_wins_over_window() {
        let now = OffsetDateTime::now_utc();
        let mut cred = credential(now);
        cred.revoked_at = Some(now);
        assert_eq!(cred.state_at(now), CredentialState::Revoked);
    }
}
