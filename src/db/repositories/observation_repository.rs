use sqlx::{Error, FromRow, PgPool, Postgres, QueryBuilder, Row, Transaction};
use time::OffsetDateTime;

use crate::auth::TenantScope;
use crate::db::models::{Observation, ObservationStatus, ObservationType, Resolution};
use crate::db::Pagination;

const OBSERVATION_COLUMNS: &str = "o.id, o.type, o.status, o.title, o.description, o.deadline, \
                                   o.document_id, o.created_by, o.resolved_by, o.resolution_date, \
                                   o.resolution_comments, o.created_at, o.updated_at";

#[derive(Debug)]
pub struct ObservationRecord<'a> {
    pub obs_type: ObservationType,
    pub title: &'a str,
    pub description: &'a str,
    pub deadline: OffsetDateTime,
    pub document_id: i64,
    pub created_by: i64,
}

#[derive(Debug)]
pub struct ObservationFilter {
    pub scope: TenantScope,
    pub document_id: Option<i64>,
    pub status: Option<ObservationStatus>,
    pub obs_type: Option<ObservationType>,
}

pub struct ObservationRepository;

impl ObservationRepository {
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        record: &ObservationRecord<'_>,
    ) -> Result<Observation, Error> {
        sqlx::query_as::<_, Observation>(&format!(
            r#"
            INSERT INTO observations AS o (type, title, description, deadline, document_id, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {OBSERVATION_COLUMNS}
            "#
        ))
        .bind(record.obs_type)
        .bind(record.title)
        .bind(record.description)
        .bind(record.deadline)
        .bind(record.document_id)
        .bind(record.created_by)
        .fetch_one(&mut **tx)
        .await
    }

    /// The observation together with the company owning its document.
    pub async fn get_by_id(
        pool: &PgPool,
        observation_id: i64,
    ) -> Result<Option<(Observation, i64)>, Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {OBSERVATION_COLUMNS}, d.company_id AS owner_company_id \
             FROM observations o JOIN documents d ON d.id = o.document_id WHERE o.id = "
        ));
        query.push_bind(observation_id);

        let row = query.build().fetch_optional(pool).await?;
        row.map(|row| {
            let owner: i64 = row.try_get("owner_company_id")?;
            Ok((Observation::from_row(&row)?, owner))
        })
        .transpose()
    }

    pub async fn list(
        pool: &PgPool,
        filter: &ObservationFilter,
        page: Pagination,
    ) -> Result<Vec<Observation>, Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations o \
             JOIN documents d ON d.id = o.document_id WHERE TRUE"
        ));

        if let Some(company_id) = filter.scope.company_id() {
            query.push(" AND d.company_id = ").push_bind(company_id);
        }
        if let Some(document_id) = filter.document_id {
            query.push(" AND o.document_id = ").push_bind(document_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND o.status = ").push_bind(status);
        }
        if let Some(obs_type) = filter.obs_type {
            query.push(" AND o.type = ").push_bind(obs_type);
        }

        query
            .push(" ORDER BY o.id OFFSET ")
            .push_bind(page.offset())
            .push(" LIMIT ")
            .push_bind(page.limit());

        query.build_query_as::<Observation>().fetch_all(pool).await
    }

    /// Every observation raised against one document, oldest first.
    pub async fn list_by_document(pool: &PgPool, document_id: i64) -> Result<Vec<Observation>, Error> {
        sqlx::query_as::<_, Observation>(&format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations o WHERE o.document_id = $1 ORDER BY o.id"
        ))
        .bind(document_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        tx: &mut Transaction<'_, Postgres>,
        observation_id: i64,
        status: Option<ObservationStatus>,
        resolution: Resolution,
        resolution_comments: Option<&str>,
        actor_id: i64,
    ) -> Result<Observation, Error> {
        let resolution = match resolution {
            Resolution::Stamp => "stamp",
            Resolution::Clear => "clear",
            Resolution::Keep => "keep",
        };

        sqlx::query_as::<_, Observation>(&format!(
            r#"
            UPDATE observations AS o
            SET
                status = COALESCE($1::observation_status, o.status),
                resolved_by = CASE $2::TEXT WHEN 'stamp' THEN $4::BIGINT WHEN 'clear' THEN NULL ELSE o.resolved_by END,
                resolution_date = CASE $2::TEXT WHEN 'stamp' THEN NOW() WHEN 'clear' THEN NULL ELSE o.resolution_date END,
                resolution_comments = CASE $2::TEXT
                    WHEN 'clear' THEN NULL
                    ELSE COALESCE($3, o.resolution_comments)
                END,
                updated_at = NOW()
            WHERE o.id = $5
            RETURNING {OBSERVATION_COLUMNS}
            "#
        ))
        .bind(status)
        .bind(resolution)
        .bind(resolution_comments)
        .bind(actor_id)
        .bind(observation_id)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn delete(tx: &mut Transaction<'_, Postgres>, observation_id: i64) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM observations WHERE id = $1")
            .bind(observation_id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    /// Company, worker, admin user and one pending document; returns (document_id, admin_id).
    async fn seed_document(pool: &PgPool) -> (i64, i64) {
        let company_id: i64 = sqlx::query_scalar(
            "INSERT INTO companies (rut, name) VALUES ('76000000-1', 'Andes') RETURNING id",
        )
        .fetch_one(pool)
        .await
        .unwrap();
        let worker_id: i64 = sqlx::query_scalar(
            "INSERT INTO workers (run, first_name, last_name, position, company_id) \
             VALUES ('11111111-1', 'Ana', 'Soto', 'Operaria', $1) RETURNING id",
        )
        .bind(company_id)
        .fetch_one(pool)
        .await
        .unwrap();
        let admin_id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash, role) \
             VALUES ('admin', 'admin@sso.cl', 'x', 'admin') RETURNING id",
        )
        .fetch_one(pool)
        .await
        .unwrap();
        let document_id: i64 = sqlx::query_scalar(
            "INSERT INTO documents (name, type, file_path, worker_id, company_id, uploaded_by) \
             VALUES ('Contrato', 'contrato', 'x.pdf', $1, $2, $3) RETURNING id",
        )
        .bind(worker_id)
        .bind(company_id)
        .bind(admin_id)
        .fetch_one(pool)
        .await
        .unwrap();
        (document_id, admin_id)
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn closing_then_reopening_round_trips_resolution(pool: PgPool) {
        let (document_id, admin_id) = seed_document(&pool).await;
        let mut tx = pool.begin().await.unwrap();
        let obs = ObservationRepository::create(
            &mut tx,
            &ObservationRecord {
                obs_type: ObservationType::Illegible,
                title: "Ilegible",
                description: "Firma no legible",
                deadline: OffsetDateTime::now_utc() + Duration::days(7),
                document_id,
                created_by: admin_id,
            },
        )
        .await
        .unwrap();
        assert_eq!(obs.status, ObservationStatus::Open);

        let closed = ObservationRepository::update(
            &mut tx,
            obs.id,
            Some(ObservationStatus::Closed),
            Resolution::Stamp,
            Some("Reemplazado"),
            admin_id,
        )
        .await
        .unwrap();
        assert_eq!(closed.resolved_by, Some(admin_id));
        assert!(closed.resolution_date.is_some());
        assert_eq!(closed.resolution_comments.as_deref(), Some("Reemplazado"));

        let reopened = ObservationRepository::update(
            &mut tx,
            obs.id,
            Some(ObservationStatus::Open),
            Resolution::Clear,
            None,
            admin_id,
        )
        .await
        .unwrap();
        assert_eq!(reopened.resolved_by, None);
        assert_eq!(reopened.resolution_date, None);
        assert_eq!(reopened.resolution_comments, None);
        tx.commit().await.unwrap();

        let (_, owner) = ObservationRepository::get_by_id(&pool, obs.id).await.unwrap().unwrap();
        assert!(owner > 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn deleting_twice_is_not_found(pool: PgPool) {
        let (document_id, admin_id) = seed_document(&pool).await;
        let mut tx = pool.begin().await.unwrap();
        let obs = ObservationRepository::create(
            &mut tx,
            &ObservationRecord {
                obs_type: ObservationType::Other,
                title: "x",
                description: "y",
                deadline: OffsetDateTime::now_utc(),
                document_id,
                created_by: admin_id,
            },
        )
        .await
        .unwrap();
        ObservationRepository::delete(&mut tx, obs.id).await.unwrap();
        assert!(matches!(
            ObservationRepository::delete(&mut tx, obs.id).await,
            Err(Error::RowNotFound)
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn document_listing_is_not_paginated(pool: PgPool) {
        let (document_id, admin_id) = seed_document(&pool).await;
        let mut tx = pool.begin().await.unwrap();
        for n in 0..120 {
            let title = format!("Hallazgo {}", n);
            ObservationRepository::create(
                &mut tx,
                &ObservationRecord {
                    obs_type: ObservationType::Other,
                    title: &title,
                    description: "Revisar",
                    deadline: OffsetDateTime::now_utc() + Duration::days(7),
                    document_id,
                    created_by: admin_id,
                },
            )
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();

        let all = ObservationRepository::list_by_document(&pool, document_id).await.unwrap();
        assert_eq!(all.len(), 120);
        assert!(all.windows(2).all(|pair| pair[0].id < pair[1].id));
    }
}
