use std::collections::HashMap;

use sqlx::{Error, PgPool, Postgres, QueryBuilder, Transaction};

use crate::auth::TenantScope;
use crate::db::models::{Company, NewCompany, UpdateCompany};
use crate::db::Pagination;

const COMPANY_COLUMNS: &str =
    "id, rut, name, business_name, email, phone, address, is_active, created_at, updated_at";

#[derive(Debug)]
pub struct CompanyFilter {
    pub scope: TenantScope,
    pub is_active: bool,
    pub search: Option<String>,
}

pub struct CompanyRepository;

impl CompanyRepository {
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        company: &NewCompany,
    ) -> Result<Company, Error> {
        sqlx::query_as::<_, Company>(&format!(
            r#"
            INSERT INTO companies (rut, name, business_name, email, phone, address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COMPANY_COLUMNS}
            "#
        ))
        .bind(&company.rut)
        .bind(&company.name)
        .bind(&company.business_name)
        .bind(&company.email)
        .bind(&company.phone)
        .bind(&company.address)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn get_by_id(pool: &PgPool, company_id: i64) -> Result<Option<Company>, Error> {
        sqlx::query_as::<_, Company>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1"
        ))
        .bind(company_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn is_active(pool: &PgPool, company_id: i64) -> Result<Option<bool>, Error> {
        sqlx::query_scalar::<_, bool>("SELECT is_active FROM companies WHERE id = $1")
            .bind(company_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &CompanyFilter,
        page: Pagination,
    ) -> Result<Vec<Company>, Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE is_active = "
        ));
        query.push_bind(filter.is_active);

        if let Some(company_id) = filter.scope.company_id() {
            query.push(" AND id = ").push_bind(company_id);
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", escape_like(search.trim()));
            query
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR business_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR rut ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        query
            .push(" ORDER BY id OFFSET ")
            .push_bind(page.offset())
            .push(" LIMIT ")
            .push_bind(page.limit());

        query.build_query_as::<Company>().fetch_all(pool).await
    }

    pub async fn update(
        tx: &mut Transaction<'_, Postgres>,
        company_id: i64,
        changes: &UpdateCompany,
    ) -> Result<Company, Error> {
        sqlx::query_as::<_, Company>(&format!(
            r#"
            UPDATE companies
            SET
                name = COALESCE($1, name),
                business_name = COALESCE($2, business_name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                address = COALESCE($5, address),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $7
            RETURNING {COMPANY_COLUMNS}
            "#
        ))
        .bind(&changes.name)
        .bind(&changes.business_name)
        .bind(&changes.email)
        .bind(&changes.phone)
        .bind(&changes.address)
        .bind(changes.is_active)
        .bind(company_id)
        .fetch_one(&mut **tx)
        .await
    }

    /// Soft delete.
    pub async fn deactivate(tx: &mut Transaction<'_, Postgres>, company_id: i64) -> Result<(), Error> {
        let result = sqlx::query(
            "UPDATE companies SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(company_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        Ok(())
    }

    /// Active worker count per company.
    pub async fn worker_counts(pool: &PgPool, company_ids: &[i64]) -> Result<HashMap<i64, i64>, Error> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT company_id, COUNT(*)
            FROM workers
            WHERE company_id = ANY($1) AND is_active
            GROUP BY company_id
            "#,
        )
        .bind(company_ids)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseError;

    fn new_company(rut: &str, name: &str) -> NewCompany {
        NewCompany {
            rut: rut.to_string(),
            name: name.to_string(),
            business_name: None,
            email: None,
            phone: None,
            address: None,
        }
    }

    async fn insert(pool: &PgPool, company: NewCompany) -> Result<Company, Error> {
        let mut tx = pool.begin().await?;
        let created = CompanyRepository::create(&mut tx, &company).await?;
        tx.commit().await?;
        Ok(created)
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn duplicate_rut_leaves_one_row(pool: PgPool) {
        insert(&pool, new_company("76000000-1", "Andes")).await.unwrap();
        let err = insert(&pool, new_company("76000000-1", "Copia")).await.unwrap_err();
        assert!(matches!(DatabaseError::from(err), DatabaseError::Duplicate(_)));

        let all = CompanyRepository::list(
            &pool,
            &CompanyFilter { scope: TenantScope::all_companies(), is_active: true, search: None },
            Pagination::new(None, None),
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Andes");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn scoped_listing_never_leaks_other_companies(pool: PgPool) {
        let own = insert(&pool, new_company("76000000-1", "Andes Norte")).await.unwrap();
        insert(&pool, new_company("77000000-2", "Andes Sur")).await.unwrap();

        for search in [None, Some("andes".to_string()), Some("77000000".to_string())] {
            let rows = CompanyRepository::list(
                &pool,
                &CompanyFilter { scope: TenantScope::company(own.id), is_active: true, search },
                Pagination::new(None, None),
            )
            .await
            .unwrap();
            assert!(rows.iter().all(|c| c.id == own.id));
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn deactivated_company_drops_out_of_default_listing(pool: PgPool) {
        let company = insert(&pool, new_company("76000000-1", "Andes")).await.unwrap();
        let mut tx = pool.begin().await.unwrap();
        CompanyRepository::deactivate(&mut tx, company.id).await.unwrap();
        tx.commit().await.unwrap();

        let filter = |is_active| CompanyFilter { scope: TenantScope::all_companies(), is_active, search: None };
        assert!(CompanyRepository::list(&pool, &filter(true), Pagination::new(None, None)).await.unwrap().is_empty());
        assert_eq!(CompanyRepository::list(&pool, &filter(false), Pagination::new(None, None)).await.unwrap().len(), 1);
    }
}
