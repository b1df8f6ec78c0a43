//! Role-based authorization.
//!
//! Every handler asks [`authorize`] before touching storage. The answer is a
//! [`TenantScope`], which is the only way to build the filters the
//! repositories accept for collection queries. A caller that is not granted
//! cross-company reach therefore cannot produce a query over another
//! company's rows.

use std::fmt;

use thiserror::Error;

use crate::db::UserRole;

/// Authenticated caller, as established from the access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub username: String,
    pub role: UserRole,
    pub company_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    RegisterUser,
    ListUsers,
    UpdateUserStatus,
    CreateCompany,
    ListCompanies,
    ReadCompany,
    UpdateCompany,
    DeactivateCompany,
    ReadComplianceReport,
    CreateWorker,
    ListWorkers,
    ReadWorker,
    UpdateWorker,
    DeactivateWorker,
    UploadDocument,
    ListDocuments,
    ReadDocument,
    ReviewDocument,
    CreateObservation,
    ListObservations,
    ReadObservation,
    UpdateObservation,
    DeleteObservation,
    IssueCredential,
    ListCredentials,
    VerifyCredential,
    RevokeCredential,
}

impl Action {
    pub const ALL: &'static [Action] = &[
        Action::RegisterUser,
        Action::ListUsers,
        Action::UpdateUserStatus,
        Action::CreateCompany,
        Action::ListCompanies,
        Action::ReadCompany,
        Action::UpdateCompany,
        Action::DeactivateCompany,
        Action::ReadComplianceReport,
        Action::CreateWorker,
        Action::ListWorkers,
        Action::ReadWorker,
        Action::UpdateWorker,
        Action::DeactivateWorker,
        Action::UploadDocument,
        Action::ListDocuments,
        Action::ReadDocument,
        Action::ReviewDocument,
        Action::CreateObservation,
        Action::ListObservations,
        Action::ReadObservation,
        Action::UpdateObservation,
        Action::DeleteObservation,
        Action::IssueCredential,
        Action::ListCredentials,
        Action::VerifyCredential,
        Action::RevokeCredential,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How far a grant extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reach {
    AllCompanies,
    OwnCompany,
}

struct Grant {
    role: UserRole,
    reach: Reach,
    actions: &'static [Action],
}

/// Read access every role has within its own company.
const COMPANY_READS: &[Action] = &[
    Action::ListCompanies,
    Action::ReadCompany,
    Action::ReadComplianceReport,
    Action::ListWorkers,
    Action::ReadWorker,
    Action::ListDocuments,
    Action::ReadDocument,
    Action::ListObservations,
    Action::ReadObservation,
    Action::ListCredentials,
    Action::VerifyCredential,
];

const POLICY: &[Grant] = &[
    Grant { role: UserRole::Admin, reach: Reach::AllCompanies, actions: Action::ALL },
    Grant { role: UserRole::Rrhh, reach: Reach::OwnCompany, actions: COMPANY_READS },
    Grant {
        role: UserRole::Rrhh,
        reach: Reach::OwnCompany,
        actions: &[
            Action::RegisterUser,
            Action::ListUsers,
            Action::UpdateCompany,
            Action::CreateWorker,
            Action::UpdateWorker,
            Action::DeactivateWorker,
            Action::UploadDocument,
            Action::ReviewDocument,
            Action::CreateObservation,
            Action::UpdateObservation,
            Action::IssueCredential,
            Action::RevokeCredential,
        ],
    },
    Grant { role: UserRole::Prevencionista, reach: Reach::OwnCompany, actions: COMPANY_READS },
    Grant {
        role: UserRole::Prevencionista,
        reach: Reach::OwnCompany,
        actions: &[Action::ReviewDocument, Action::CreateObservation, Action::UpdateObservation],
    },
    Grant { role: UserRole::Empresa, reach: Reach::OwnCompany, actions: COMPANY_READS },
    Grant {
        role: UserRole::Empresa,
        reach: Reach::OwnCompany,
        actions: &[Action::UploadDocument, Action::UpdateObservation],
    },
    Grant { role: UserRole::Guardia, reach: Reach::OwnCompany, actions: COMPANY_READS },
];

/// What the request is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A resource owned by this company.
    Company(i64),
    /// A listing, optionally narrowed to one company by the caller.
    Collection { company_id: Option<i64> },
    /// Platform-wide operations that belong to no company yet.
    Unscoped,
}

/// Company rows a query may see. Built only by [`authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantScope(Scope);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    AllCompanies,
    Company(i64),
}

impl TenantScope {
    /// `None` means every company.
    pub fn company_id(&self) -> Option<i64> {
        match self.0 {
            Scope::AllCompanies => None,
            Scope::Company(id) => Some(id),
        }
    }

    pub fn permits(&self, company_id: i64) -> bool {
        match self.0 {
            Scope::AllCompanies => true,
            Scope::Company(id) => id == company_id,
        }
    }

    #[cfg(test)]
    pub(crate) fn all_companies() -> Self {
        TenantScope(Scope::AllCompanies)
    }

    #[cfg(test)]
    pub(crate) fn company(id: i64) -> Self {
        TenantScope(Scope::Company(id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{role} may not {action}: {reason}")]
pub struct AccessDenied {
    pub role: UserRole,
    pub action: Action,
    pub reason: &'static str,
}

/// Strongest reach any grant gives `role` for `action`.
pub fn reach(role: UserRole, action: Action) -> Option<Reach> {
    let mut granted = None;
    for grant in POLICY.iter().filter(|g| g.role == role && g.actions.contains(&action)) {
        match grant.reach {
            Reach::AllCompanies => return Some(Reach::AllCompanies),
            Reach::OwnCompany => granted = Some(Reach::OwnCompany),
        }
    }
    granted
}

pub fn authorize(actor: &Actor, action: Action, target: Target) -> Result<TenantScope, AccessDenied> {
    let deny = |reason| {
        tracing::info!(
            user_id = actor.user_id,
            role = %actor.role,
            %action,
            ?target,
            reason,
            "authorization denied"
        );
        AccessDenied { role: actor.role, action, reason }
    };

    let reach = reach(actor.role, action).ok_or_else(|| deny("role not permitted"))?;

    match (reach, target) {
        (Reach::AllCompanies, Target::Company(id)) => Ok(TenantScope(Scope::Company(id))),
        (Reach::AllCompanies, Target::Collection { company_id: Some(id) }) => {
            Ok(TenantScope(Scope::Company(id)))
        }
        (Reach::AllCompanies, Target::Collection { company_id: None } | Target::Unscoped) => {
            Ok(TenantScope(Scope::AllCompanies))
        }
        (Reach::OwnCompany, Target::Unscoped) => Err(deny("requires cross-company access")),
        (Reach::OwnCompany, Target::Company(id) | Target::Collection { company_id: Some(id) }) => {
            match actor.company_id {
                Some(own) if own == id => Ok(TenantScope(Scope::Company(own))),
                _ => Err(deny("resource belongs to another company")),
            }
        }
        (Reach::OwnCompany, Target::Collection { company_id: None }) => actor
            .company_id
            .map(|own| TenantScope(Scope::Company(own)))
            .ok_or_else(|| deny("caller has no company")),
    }
}
