use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "observation_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ObservationType {
    FormatError,
    Expired,
    Missing,
    Illegible,
    Incomplete,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "observation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ObservationStatus {
    Open,
    InProgress,
    Closed,
}

/// What happens to the resolution fields when an observation changes status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Entering `closed`: stamp resolver and date.
    Stamp,
    /// Leaving `closed`: the previous resolution no longer applies.
    Clear,
    Keep,
}

impl ObservationStatus {
    pub fn resolution_on(self, to: ObservationStatus) -> Resolution {
        match (self, to) {
            (ObservationStatus::Closed, ObservationStatus::Closed) => Resolution::Keep,
            (_, ObservationStatus::Closed) => Resolution::Stamp,
            (ObservationStatus::Closed, _) => Resolution::Clear,
            _ => Resolution::Keep,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Observation {
    pub id: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub obs_type: ObservationType,
    pub status: ObservationStatus,
    pub title: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub deadline: OffsetDateTime,
    pub document_id: i64,
    pub created_by: i64,
    pub resolved_by: Option<i64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub resolution_date: Option<OffsetDateTime>,
    pub resolution_comments: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewObservation {
    #[serde(rename = "type")]
    pub obs_type: ObservationType,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub deadline: OffsetDateTime,
    pub document_id: i64,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateObservation {
    pub status: Option<ObservationStatus>,
    #[validate(length(min = 1, max = 4000))]
    pub resolution_comments: Option<String>,
}
