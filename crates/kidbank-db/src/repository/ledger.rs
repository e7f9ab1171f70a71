//! Transaction history. Rows are append-only; they only disappear with
//! their kid.

use kidbank_core::gateway::Query;
use kidbank_core::Transaction;
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::debug;

use super::select;
use crate::error::DbResult;

const COLUMNS: &str = "id, kid_id, parent_id, type AS kind, amount_cents AS amount, \
                       description, requested_by, processed_by, created_at";

#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Transaction>> {
        let sql = format!("SELECT {COLUMNS} FROM transactions WHERE id = ?1");
        let tx = sqlx::query_as::<_, Transaction>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tx)
    }

    pub async fn list(&self, query: &Query) -> DbResult<Vec<Transaction>> {
        let txs = select(COLUMNS, query)
            .build_query_as::<Transaction>()
            .fetch_all(&self.pool)
            .await?;
        Ok(txs)
    }

    pub async fn insert(conn: &mut SqliteConnection, tx: &Transaction) -> DbResult<()> {
        debug!(id = %tx.id, kid_id = %tx.kid_id, kind = %tx.kind.as_str(), "Recording transaction");

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, kid_id, parent_id, type, amount_cents,
                description, requested_by, processed_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&tx.id)
        .bind(&tx.kid_id)
        .bind(&tx.parent_id)
        .bind(tx.kind)
        .bind(tx.amount)
        .bind(&tx.description)
        .bind(tx.requested_by)
        .bind(&tx.processed_by)
        .bind(tx.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }
}
