use thiserror::Error;

use crate::db::{User, UserRole};

use super::password::{verify_decoy, verify_password};

/// Identity established by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub role: UserRole,
    pub company_id: Option<i64>,
}

impl From<&User> for Session {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            company_id: user.company_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("incorrect username or password")]
    InvalidCredentials,
    #[error("user is inactive")]
    InactiveUser,
}

/// Check a login attempt against the stored account. The password is
/// verified first so an inactive account is only disclosed to someone who
/// knows its password.
pub fn verify_login(user: Option<&User>, password: &str) -> Result<Session, LoginError> {
    let Some(user) = user else {
        verify_decoy(password);
        return Err(LoginError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash) {
        return Err(LoginError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(LoginError::InactiveUser);
    }

    Ok(Session::from(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use time::OffsetDateTime;

    fn user(is_active: bool) -> User {
        User {
            id: 3,
            email: "prev@andes.cl".to_string(),
            username: "prev".to_string(),
            password_hash: hash_password("Segura#2024").unwrap(),
            full_name: Some("Paula Vera".to_string()),
            role: UserRole::Prevencionista,
            is_active,
            company_id: Some(5),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: None,
            last_login: None,
        }
    }

    #[test]
    fn active_user_with_correct_password_gets_a_session() {
        let session = verify_login(Some(&user(true)), "Segura#2024").unwrap();
        assert_eq!(session.user_id, 3);
        assert_eq!(session.role, UserRole::Prevencionista);
        assert_eq!(session.company_id, Some(5));
    }

    #[test]
    fn inactive_user_never_logs_in() {
        let account = user(false);
        assert_eq!(verify_login(Some(&account), "Segura#2024"), Err(LoginError::InactiveUser));
        assert!(verify_login(Some(&account), "wrong").is_err());
    }

    #[test]
    fn unknown_user_and_wrong_password_look_the_same() {
        assert_eq!(verify_login(None, "x"), Err(LoginError::InvalidCredentials));
        assert_eq!(
            verify_login(Some(&user(true)), "wrong"),
            Err(LoginError::InvalidCredentials)
        );
    }
}
