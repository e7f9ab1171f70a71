//! # Deposit Request Repository
//!
//! ## Request Lifecycle
//! ```text
//! insert()  ──► status = pending
//!                   │
//!                   ▼
//! resolve() ──► approved | denied    (processed_at, parent_note set)
//!                   │
//!                   └── resolving again fails with Conflict
//! ```

use chrono::{DateTime, Utc};
use kidbank_core::gateway::{Collection, Query};
use kidbank_core::{DepositRequest, RequestStatus};
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::debug;

use super::select;
use crate::error::{DbError, DbResult};

const COLUMNS: &str = "id, kid_id, kid_name, kid_avatar, parent_id, amount_cents AS amount, \
                       description, status, parent_note, created_at, processed_at";

#[derive(Debug, Clone)]
pub struct RequestRepository {
    pool: SqlitePool,
}

impl RequestRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RequestRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<DepositRequest>> {
        let sql = format!("SELECT {COLUMNS} FROM deposit_requests WHERE id = ?1");
        let request = sqlx::query_as::<_, DepositRequest>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    pub async fn list(&self, query: &Query) -> DbResult<Vec<DepositRequest>> {
        let requests = select(COLUMNS, query)
            .build_query_as::<DepositRequest>()
            .fetch_all(&self.pool)
            .await?;
        Ok(requests)
    }

    pub async fn insert(conn: &mut SqliteConnection, request: &DepositRequest) -> DbResult<()> {
        debug!(id = %request.id, kid_id = %request.kid_id, "Inserting deposit request");

        sqlx::query(
            r#"
            INSERT INTO deposit_requests (
                id, kid_id, kid_name, kid_avatar, parent_id, amount_cents,
                description, status, parent_note, created_at, processed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&request.id)
        .bind(&request.kid_id)
        .bind(&request.kid_name)
        .bind(&request.kid_avatar)
        .bind(&request.parent_id)
        .bind(request.amount)
        .bind(&request.description)
        .bind(request.status)
        .bind(&request.parent_note)
        .bind(request.created_at)
        .bind(request.processed_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Moves a pending request to `status`.
    ///
    /// ## Errors
    /// - `NotFound` if the request doesn't exist
    /// - `Conflict` if it was already resolved
    pub async fn resolve(
        conn: &mut SqliteConnection,
        id: &str,
        status: RequestStatus,
        note: Option<&str>,
        processed_at: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %id, status = %status, "Resolving deposit request");

        let result = sqlx::query(
            r#"
            UPDATE deposit_requests SET
                status = ?2,
                parent_note = ?3,
                processed_at = ?4
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(note)
        .bind(processed_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let current: Option<RequestStatus> =
            sqlx::query_scalar("SELECT status FROM deposit_requests WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        match current {
            None => Err(DbError::not_found(Collection::DepositRequests, id)),
            Some(current) => Err(DbError::Conflict(format!(
                "request {id} is already {current}"
            ))),
        }
    }
}
