//! Parent profiles.

use kidbank_core::gateway::Query;
use kidbank_core::ParentProfile;
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::debug;

use super::select;
use crate::error::DbResult;

const COLUMNS: &str = "id, email, display_name, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct ParentRepository {
    pool: SqlitePool,
}

impl ParentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ParentRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<ParentProfile>> {
        let sql = format!("SELECT {COLUMNS} FROM parents WHERE id = ?1");
        let parent = sqlx::query_as::<_, ParentProfile>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(parent)
    }

    pub async fn list(&self, query: &Query) -> DbResult<Vec<ParentProfile>> {
        let parents = select(COLUMNS, query)
            .build_query_as::<ParentProfile>()
            .fetch_all(&self.pool)
            .await?;
        Ok(parents)
    }

    pub async fn insert(conn: &mut SqliteConnection, parent: &ParentProfile) -> DbResult<()> {
        debug!(id = %parent.id, "Inserting parent");

        sqlx::query(
            r#"
            INSERT INTO parents (id, email, display_name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&parent.id)
        .bind(&parent.email)
        .bind(&parent.display_name)
        .bind(parent.created_at)
        .bind(parent.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }
}
