use sqlx::{Error, PgPool, Postgres, QueryBuilder, Transaction};

use crate::auth::TenantScope;
use crate::db::models::{User, UserRole};
use crate::db::Pagination;

const USER_COLUMNS: &str = "id, email, username, password_hash, full_name, role, is_active, \
                            company_id, created_at, updated_at, last_login";

/// Row to insert; the password is already hashed.
#[derive(Debug)]
pub struct UserRecord<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: Option<&'a str>,
    pub role: UserRole,
    pub company_id: Option<i64>,
}

#[derive(Debug)]
pub struct UserFilter {
    pub scope: TenantScope,
    pub role: Option<UserRole>,
    pub is_active: bool,
}

pub struct UserRepository;

impl UserRepository {
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        user: &UserRecord<'_>,
    ) -> Result<User, Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, full_name, role, company_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.username)
        .bind(user.email.to_lowercase())
        .bind(user.password_hash)
        .bind(user.full_name)
        .bind(user.role)
        .bind(user.company_id)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn get_by_id(pool: &PgPool, user_id: i64) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn get_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Whether `username` or `email` is taken by an account other than `except`.
    pub async fn identity_taken(
        pool: &PgPool,
        username: Option<&str>,
        email: Option<&str>,
        except: Option<i64>,
    ) -> Result<bool, Error> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE (username = $1 OR email = lower($2))
                  AND ($3::BIGINT IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(except)
        .fetch_one(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &UserFilter,
        page: Pagination,
    ) -> Result<Vec<User>, Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {USER_COLUMNS} FROM users WHERE is_active = "
        ));
        query.push_bind(filter.is_active);

        if let Some(company_id) = filter.scope.company_id() {
            query.push(" AND company_id = ").push_bind(company_id);
        }
        if let Some(role) = filter.role {
            query.push(" AND role = ").push_bind(role);
        }

        query
            .push(" ORDER BY id OFFSET ")
            .push_bind(page.offset())
            .push(" LIMIT ")
            .push_bind(page.limit());

        query.build_query_as::<User>().fetch_all(pool).await
    }

    pub async fn record_login(pool: &PgPool, user_id: i64) -> Result<(), Error> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn update_profile(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        email: Option<&str>,
        full_name: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User, Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET
                email = COALESCE(lower($1), email),
                full_name = COALESCE($2, full_name),
                password_hash = COALESCE($3, password_hash),
                updated_at = NOW()
            WHERE id = $4
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(full_name)
        .bind(password_hash)
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn set_active(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        is_active: bool,
    ) -> Result<User, Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET is_active = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(is_active)
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await
    }
}
