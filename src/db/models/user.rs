use serde::{Deserialize, Serialize};
use secrecy::SecretBox;
use time::OffsetDateTime;
use validator::{Validate, ValidationError};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Prevencionista,
    Empresa,
    Guardia,
    Rrhh,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Prevencionista => "prevencionista",
            UserRole::Empresa => "empresa",
            UserRole::Guardia => "guardia",
            UserRole::Rrhh => "rrhh",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "prevencionista" => Ok(UserRole::Prevencionista),
            "empresa" => Ok(UserRole::Empresa),
            "guardia" => Ok(UserRole::Guardia),
            "rrhh" => Ok(UserRole::Rrhh),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub company_id: Option<i64>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
    pub last_login: Option<OffsetDateTime>,
}

/// Public projection of a user; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub company_id: Option<i64>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            company_id: user.company_id,
            is_active: user.is_active,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_company_assignment"))]
pub struct NewUser {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email, length(max = 100))]
    pub email: String,
    pub password: SecretBox<String>,
    #[validate(length(max = 200))]
    pub full_name: Option<String>,
    #[serde(default = "default_role")]
    pub role: UserRole,
    pub company_id: Option<i64>,
}

fn default_role() -> UserRole {
    UserRole::Empresa
}

fn validate_company_assignment(user: &NewUser) -> Result<(), ValidationError> {
    if user.role != UserRole::Admin && user.company_id.is_none() {
        return Err(ValidationError::new("company_required")
            .with_message("company_id is required unless role is admin".into()));
    }
    Ok(())
}

/// Fields a user may change on their own profile.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(email, length(max = 100))]
    pub email: Option<String>,
    #[validate(length(max = 200))]
    pub full_name: Option<String>,
    pub password: Option<SecretBox<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserStatus {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct UserLogin {
    pub username: String,
    pub password: SecretBox<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretBox;

    fn new_user(role: UserRole, company_id: Option<i64>) -> NewUser {
        NewUser {
            username: "mrojas".to_string(),
            email: "mrojas@example.cl".to_string(),
            password: SecretBox::new(Box::new("s3cret-pass".to_string())),
            full_name: None,
            role,
            company_id,
        }
    }

    #[test]
    fn non_admin_users_need_a_company() {
        assert!(new_user(UserRole::Rrhh, None).validate().is_err());
        assert!(new_user(UserRole::Rrhh, Some(5)).validate().is_ok());
        assert!(new_user(UserRole::Admin, None).validate().is_ok());
    }

    #[test]
    fn role_round_trips_through_its_wire_name() {
        for role in [
            UserRole::Admin,
            UserRole::Prevencionista,
            UserRole::Empresa,
            UserRole::Guardia,
            UserRole::Rrhh,
        ] {
            assert_eq!(role.as_str().parse::<UserRole>(), Ok(role));
            assert_eq!(
                serde_json::to_value(role).unwrap(),
                serde_json::Value::String(role.to_string())
            );
        }
    }
}
