use sqlx::{Error, FromRow, PgPool, Postgres, QueryBuilder, Row, Transaction};
use time::OffsetDateTime;

use crate::auth::TenantScope;
use crate::db::models::Credential;
use crate::db::Pagination;

const CREDENTIAL_COLUMNS: &str = "c.id, c.qr_code, c.token, c.is_active, c.valid_from, c.valid_until, \
                                  c.worker_id, c.created_by, c.created_at, c.revoked_at";

#[derive(Debug)]
pub struct CredentialRecord<'a> {
    pub token: &'a str,
    pub qr_code: &'a str,
    pub valid_until: OffsetDateTime,
    pub worker_id: i64,
    pub created_by: i64,
}

#[derive(Debug)]
pub struct CredentialFilter {
    pub scope: TenantScope,
    pub worker_id: Option<i64>,
    pub active_only: bool,
}

pub struct CredentialRepository;

impl CredentialRepository {
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        record: &CredentialRecord<'_>,
    ) -> Result<Credential, Error> {
        sqlx::query_as::<_, Credential>(&format!(
            r#"
            INSERT INTO credentials AS c (token, qr_code, valid_from, valid_until, worker_id, created_by)
            VALUES ($1, $2, NOW(), $3, $4, $5)
            RETURNING {CREDENTIAL_COLUMNS}
            "#
        ))
        .bind(record.token)
        .bind(record.qr_code)
        .bind(record.valid_until)
        .bind(record.worker_id)
        .bind(record.created_by)
        .fetch_one(&mut **tx)
        .await
    }

    /// The credential together with its worker's company.
    pub async fn get_by_id(
        pool: &PgPool,
        credential_id: i64,
    ) -> Result<Option<(Credential, i64)>, Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {CREDENTIAL_COLUMNS}, w.company_id AS owner_company_id \
             FROM credentials c JOIN workers w ON w.id = c.worker_id WHERE c.id = "
        ));
        query.push_bind(credential_id);

        let row = query.build().fetch_optional(pool).await?;
        row.map(|row| {
            let owner: i64 = row.try_get("owner_company_id")?;
            Ok((Credential::from_row(&row)?, owner))
        })
        .transpose()
    }

    pub async fn get_by_token(pool: &PgPool, token: &str) -> Result<Option<Credential>, Error> {
        sqlx::query_as::<_, Credential>(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials c WHERE c.token = $1"
        ))
        .bind(token)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &CredentialFilter,
        page: Pagination,
    ) -> Result<Vec<Credential>, Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials c \
             JOIN workers w ON w.id = c.worker_id WHERE TRUE"
        ));

        if let Some(company_id) = filter.scope.company_id() {
            query.push(" AND w.company_id = ").push_bind(company_id);
        }
        if let Some(worker_id) = filter.worker_id {
            query.push(" AND c.worker_id = ").push_bind(worker_id);
        }
        if filter.active_only {
            query.push(" AND c.is_active AND c.revoked_at IS NULL");
        }

        query
            .push(" ORDER BY c.id OFFSET ")
            .push_bind(page.offset())
            .push(" LIMIT ")
            .push_bind(page.limit());

        query.build_query_as::<Credential>().fetch_all(pool).await
    }

    /// Revocation is idempotent; the first revocation time is kept.
    pub async fn revoke(
        tx: &mut Transaction<'_, Postgres>,
        credential_id: i64,
    ) -> Result<Credential, Error> {
        sqlx::query_as::<_, Credential>(&format!(
            r#"
            UPDATE credentials AS c
            SET is_active = FALSE, revoked_at = COALESCE(c.revoked_at, NOW())
            WHERE c.id = $1
            RETURNING {CREDENTIAL_COLUMNS}
            "#
        ))
        .bind(credential_id)
        .fetch_one(&mut **tx)
        .await
    }
}
