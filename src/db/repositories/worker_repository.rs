use sqlx::{Error, PgPool, Postgres, QueryBuilder, Transaction};

use crate::auth::TenantScope;
use crate::db::models::{NewWorker, UpdateWorker, Worker};
use crate::db::Pagination;

const WORKER_COLUMNS: &str = "id, run, first_name, last_name, email, phone, position, entry_date, \
                              is_active, company_id, created_at, updated_at";

#[derive(Debug)]
pub struct WorkerFilter {
    pub scope: TenantScope,
    pub is_active: bool,
}

pub struct WorkerRepository;

impl WorkerRepository {
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        worker: &NewWorker,
    ) -> Result<Worker, Error> {
        sqlx::query_as::<_, Worker>(&format!(
            r#"
            INSERT INTO workers (run, first_name, last_name, email, phone, position, entry_date, company_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {WORKER_COLUMNS}
            "#
        ))
        .bind(&worker.run)
        .bind(&worker.first_name)
        .bind(&worker.last_name)
        .bind(&worker.email)
        .bind(&worker.phone)
        .bind(&worker.position)
        .bind(worker.entry_date)
        .bind(worker.company_id)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn get_by_id(pool: &PgPool, worker_id: i64) -> Result<Option<Worker>, Error> {
        sqlx::query_as::<_, Worker>(&format!("SELECT {WORKER_COLUMNS} FROM workers WHERE id = $1"))
            .bind(worker_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &WorkerFilter,
        page: Pagination,
    ) -> Result<Vec<Worker>, Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {WORKER_COLUMNS} FROM workers WHERE is_active = "
        ));
        query.push_bind(filter.is_active);

        if let Some(company_id) = filter.scope.company_id() {
            query.push(" AND company_id = ").push_bind(company_id);
        }

        query
            .push(" ORDER BY id OFFSET ")
            .push_bind(page.offset())
            .push(" LIMIT ")
            .push_bind(page.limit());

        query.build_query_as::<Worker>().fetch_all(pool).await
    }

    /// Every worker of one company, deactivated ones included, for the
    /// company detail view.
    pub async fn list_by_company(pool: &PgPool, company_id: i64) -> Result<Vec<Worker>, Error> {
        sqlx::query_as::<_, Worker>(&format!(
            "SELECT {WORKER_COLUMNS} FROM workers WHERE company_id = $1 ORDER BY id"
        ))
        .bind(company_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count_active(pool: &PgPool, company_id: i64) -> Result<i64, Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM workers WHERE company_id = $1 AND is_active",
        )
        .bind(company_id)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        tx: &mut Transaction<'_, Postgres>,
        worker_id: i64,
        changes: &UpdateWorker,
    ) -> Result<Worker, Error> {
        sqlx::query_as::<_, Worker>(&format!(
            r#"
            UPDATE workers
            SET
                email = COALESCE($1, email),
                phone = COALESCE($2, phone),
                position = COALESCE($3, position),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $5
            RETURNING {WORKER_COLUMNS}
            "#
        ))
        .bind(&changes.email)
        .bind(&changes.phone)
        .bind(&changes.position)
        .bind(changes.is_active)
        .bind(worker_id)
        .fetch_one(&mut **tx)
        .await
    }

    /// Soft delete.
    pub async fn deactivate(tx: &mut Transaction<'_, Postgres>, worker_id: i64) -> Result<(), Error> {
        let result = sqlx::query(
            "UPDATE workers SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(worker_id)
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
    use crate::db::repositories::CompanyRepository;
    use crate::db::{DatabaseError, NewCompany};

    async fn company(pool: &PgPool, rut: &str) -> i64 {
        let mut tx = pool.begin().await.unwrap();
        let company = CompanyRepository::create(
            &mut tx,
            &NewCompany {
                rut: rut.to_string(),
                name: format!("Empresa {rut}"),
                business_name: None,
                email: None,
                phone: None,
                address: None,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        company.id
    }

    fn new_worker(run: &str, company_id: i64) -> NewWorker {
        NewWorker {
            run: run.to_string(),
            first_name: "Juan".to_string(),
            last_name: "Pérez".to_string(),
            email: None,
            phone: None,
            position: "Soldador".to_string(),
            entry_date: None,
            company_id,
        }
    }

    async fn insert(pool: &PgPool, worker: NewWorker) -> Result<Worker, Error> {
        let mut tx = pool.begin().await?;
        let created = WorkerRepository::create(&mut tx, &worker).await?;
        tx.commit().await?;
        Ok(created)
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn duplicate_run_is_a_conflict(pool: PgPool) {
        let company_id = company(&pool, "76000000-1").await;
        insert(&pool, new_worker("12345678-9", company_id)).await.unwrap();
        let err = insert(&pool, new_worker("12345678-9", company_id)).await.unwrap_err();
        assert!(matches!(DatabaseError::from(err), DatabaseError::Duplicate(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn unknown_company_is_not_found(pool: PgPool) {
        let err = insert(&pool, new_worker("12345678-9", 999)).await.unwrap_err();
        assert!(matches!(DatabaseError::from(err), DatabaseError::NotFound));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn listing_is_confined_to_scope(pool: PgPool) {
        let a = company(&pool, "76000000-1").await;
        let b = company(&pool, "77000000-2").await;
        insert(&pool, new_worker("11111111-1", a)).await.unwrap();
        insert(&pool, new_worker("22222222-2", b)).await.unwrap();

        for is_active in [true, false] {
            let rows = WorkerRepository::list(
                &pool,
                &WorkerFilter { scope: TenantScope::company(a), is_active },
                Pagination::new(None, None),
            )
            .await
            .unwrap();
            assert!(rows.iter().all(|w| w.company_id == a));
        }
        assert_eq!(WorkerRepository::count_active(&pool, a).await.unwrap(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn company_roster_keeps_deactivated_workers(pool: PgPool) {
        let company_id = company(&pool, "76000000-1").await;
        let kept = insert(&pool, new_worker("11111111-1", company_id)).await.unwrap();
        let gone = insert(&pool, new_worker("22222222-2", company_id)).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        WorkerRepository::deactivate(&mut tx, gone.id).await.unwrap();
        tx.commit().await.unwrap();

        let roster = WorkerRepository::list_by_company(&pool, company_id).await.unwrap();
        let flags: Vec<(i64, bool)> = roster.iter().map(|w| (w.id, w.is_active)).collect();
        assert_eq!(flags, vec![(kept.id, true), (gone.id, false)]);
        assert_eq!(WorkerRepository::count_active(&pool, company_id).await.unwrap(), 1);
    }
}
