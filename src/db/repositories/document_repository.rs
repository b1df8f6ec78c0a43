use std::collections::HashMap;

use sqlx::{Error, PgPool, Postgres, QueryBuilder, Transaction};
use time::Date;

use crate::auth::TenantScope;
use crate::compliance::{DocumentSnapshot, DocumentTally};
use crate::db::models::{Document, DocumentStatus, DocumentType, NewDocument};
use crate::db::Pagination;

const DOCUMENT_COLUMNS: &str = "id, name, type, file_path, file_hash, status, issue_date, expiry_date, \
                                upload_date, worker_id, company_id, uploaded_by, reviewed_by, \
                                review_date, review_comments, created_at, updated_at";

#[derive(Debug)]
pub struct DocumentFilter {
    pub scope: TenantScope,
    pub worker_id: Option<i64>,
    pub status: Option<DocumentStatus>,
    pub doc_type: Option<DocumentType>,
}

pub struct DocumentRepository;

impl DocumentRepository {
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        doc: &NewDocument,
    ) -> Result<Document, Error> {
        sqlx::query_as::<_, Document>(&format!(
            r#"
            INSERT INTO documents (
                name, type, file_path, file_hash, status, issue_date, expiry_date,
                worker_id, company_id, uploaded_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {DOCUMENT_COLUMNS}
            "#
        ))
        .bind(&doc.name)
        .bind(doc.doc_type)
        .bind(&doc.file_path)
        .bind(&doc.file_hash)
        .bind(doc.status)
        .bind(doc.issue_date)
        .bind(doc.expiry_date)
        .bind(doc.worker_id)
        .bind(doc.company_id)
        .bind(doc.uploaded_by)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn get_by_id(pool: &PgPool, document_id: i64) -> Result<Option<Document>, Error> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
        ))
        .bind(document_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &DocumentFilter,
        page: Pagination,
    ) -> Result<Vec<Document>, Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE TRUE"
        ));

        if let Some(company_id) = filter.scope.company_id() {
            query.push(" AND company_id = ").push_bind(company_id);
        }
        if let Some(worker_id) = filter.worker_id {
            query.push(" AND worker_id = ").push_bind(worker_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(doc_type) = filter.doc_type {
            query.push(" AND type = ").push_bind(doc_type);
        }

        query
            .push(" ORDER BY id OFFSET ")
            .push_bind(page.offset())
            .push(" LIMIT ")
            .push_bind(page.limit());

        query.build_query_as::<Document>().fetch_all(pool).await
    }

    pub async fn list_by_worker(pool: &PgPool, worker_id: i64) -> Result<Vec<Document>, Error> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE worker_id = $1 ORDER BY id"
        ))
        .bind(worker_id)
        .fetch_all(pool)
        .await
    }

    /// Documents whose expiry falls in `[from, until]`, soonest first.
    pub async fn expiring_between(
        pool: &PgPool,
        scope: TenantScope,
        from: Date,
        until: Date,
    ) -> Result<Vec<Document>, Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE status <> 'expired' AND expiry_date BETWEEN "
        ));
        query.push_bind(from).push(" AND ").push_bind(until);

        if let Some(company_id) = scope.company_id() {
            query.push(" AND company_id = ").push_bind(company_id);
        }
        query.push(" ORDER BY expiry_date, id");

        query.build_query_as::<Document>().fetch_all(pool).await
    }

    /// Apply a review. `status` has already been checked against the
    /// lifecycle; reviewer and review date move only when it is set.
    pub async fn review(
        tx: &mut Transaction<'_, Postgres>,
        document_id: i64,
        status: Option<DocumentStatus>,
        review_comments: Option<&str>,
        reviewer_id: i64,
    ) -> Result<Document, Error> {
        sqlx::query_as::<_, Document>(&format!(
            r#"
            UPDATE documents
            SET
                status = COALESCE($1::document_status, status),
                reviewed_by = CASE WHEN $1::document_status IS NULL THEN reviewed_by ELSE $3::BIGINT END,
                review_date = CASE WHEN $1::document_status IS NULL THEN review_date ELSE NOW() END,
                review_comments = COALESCE($2, review_comments),
                updated_at = NOW()
            WHERE id = $4
            RETURNING {DOCUMENT_COLUMNS}
            "#
        ))
        .bind(status)
        .bind(review_comments)
        .bind(reviewer_id)
        .bind(document_id)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn tallies_by_worker(
        pool: &PgPool,
        worker_ids: &[i64],
    ) -> Result<HashMap<i64, DocumentTally>, Error> {
        tallies(pool, "worker_id", worker_ids).await
    }

    pub async fn tallies_by_company(
        pool: &PgPool,
        company_ids: &[i64],
    ) -> Result<HashMap<i64, DocumentTally>, Error> {
        tallies(pool, "company_id", company_ids).await
    }

    pub async fn snapshots_for_company(
        pool: &PgPool,
        company_id: i64,
    ) -> Result<Vec<DocumentSnapshot>, Error> {
        sqlx::query_as::<_, DocumentSnapshot>(
            "SELECT status, type, expiry_date FROM documents WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_all(pool)
        .await
    }
}

async fn tallies(
    pool: &PgPool,
    key: &'static str,
    ids: &[i64],
) -> Result<HashMap<i64, DocumentTally>, Error> {
    let rows = sqlx::query_as::<_, (i64, i64, i64)>(&format!(
        r#"
        SELECT {key}, COUNT(*), COUNT(*) FILTER (WHERE status = 'approved')
        FROM documents
        WHERE {key} = ANY($1)
        GROUP BY {key}
        "#
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, total, approved)| (id, DocumentTally { total, approved }))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{CompanyRepository, WorkerRepository};
    use crate::db::{NewCompany, NewWorker};

    async fn seed_worker(pool: &PgPool, rut: &str, run: &str) -> (i64, i64) {
        let mut tx = pool.begin().await.unwrap();
        let company = CompanyRepository::create(
            &mut tx,
            &NewCompany {
                rut: rut.to_string(),
                name: "Andes".to_string(),
                business_name: None,
                email: None,
                phone: None,
                address: None,
            },
        )
        .await
        .unwrap();
        let worker = WorkerRepository::create(
            &mut tx,
            &NewWorker {
                run: run.to_string(),
                first_name: "Ana".to_string(),
                last_name: "Soto".to_string(),
                email: None,
                phone: None,
                position: "Operaria".to_string(),
                entry_date: None,
                company_id: company.id,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        (company.id, worker.id)
    }

    async fn seed_admin(pool: &PgPool) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash, role) \
             VALUES ('admin', 'admin@sso.cl', 'x', 'admin') RETURNING id",
        )
        .fetch_one(pool)
        .await
        .unwrap()
    }

    fn new_document(company_id: i64, worker_id: i64, status: DocumentStatus, uploaded_by: i64) -> NewDocument {
        NewDocument {
            name: "Contrato".to_string(),
            doc_type: DocumentType::Contrato,
            file_path: "uploads/x.pdf".to_string(),
            file_hash: "00".repeat(32),
            status,
            issue_date: None,
            expiry_date: None,
            worker_id,
            company_id,
            uploaded_by,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn tallies_count_approved_documents(pool: PgPool) {
        let (company_id, worker_id) = seed_worker(&pool, "76000000-1", "11111111-1").await;
        let admin = seed_admin(&pool).await;
        let mut tx = pool.begin().await.unwrap();
        DocumentRepository::create(&mut tx, &new_document(company_id, worker_id, DocumentStatus::Approved, admin))
            .await
            .unwrap();
        DocumentRepository::create(&mut tx, &new_document(company_id, worker_id, DocumentStatus::Pending, admin))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let by_company = DocumentRepository::tallies_by_company(&pool, &[company_id]).await.unwrap();
        assert_eq!(by_company[&company_id], DocumentTally { total: 2, approved: 1 });
        assert_eq!(by_company[&company_id].compliance_percentage(), 50.0);

        let by_worker = DocumentRepository::tallies_by_worker(&pool, &[worker_id, 999]).await.unwrap();
        assert_eq!(by_worker.get(&999), None);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn document_company_must_match_worker(pool: PgPool) {
        let (company_id, worker_id) = seed_worker(&pool, "76000000-1", "11111111-1").await;
        let admin = seed_admin(&pool).await;
        let (other_company, _) = seed_worker(&pool, "77000000-2", "22222222-2").await;
        assert_ne!(company_id, other_company);

        let mut tx = pool.begin().await.unwrap();
        let result =
            DocumentRepository::create(&mut tx, &new_document(other_company, worker_id, DocumentStatus::Pending, admin))
                .await;
        assert!(result.is_err());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn comment_only_review_keeps_reviewer_unset(pool: PgPool) {
        let (company_id, worker_id) = seed_worker(&pool, "76000000-1", "11111111-1").await;
        let admin = seed_admin(&pool).await;
        let mut tx = pool.begin().await.unwrap();
        let doc = DocumentRepository::create(&mut tx, &new_document(company_id, worker_id, DocumentStatus::Pending, admin))
            .await
            .unwrap();
        let reviewed = DocumentRepository::review(&mut tx, doc.id, None, Some("falta firma"), admin)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(reviewed.status, DocumentStatus::Pending);
        assert_eq!(reviewed.reviewed_by, None);
        assert_eq!(reviewed.review_comments.as_deref(), Some("falta firma"));
    }
}
