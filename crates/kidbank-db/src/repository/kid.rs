//! # Kid Repository
//!
//! Kids, their balances and their custom themes.
//!
//! ## Storage
//! ```text
//! kids
//! ├── balance_cents   INTEGER   (Money)
//! ├── custom_themes   TEXT      JSON array of CustomTheme
//! └── last_login      TEXT?     RFC 3339
//! ```
//!
//! Balance changes are applied in SQL (`balance_cents = balance_cents + ?`)
//! so concurrent writers never lose an increment.

use chrono::{DateTime, Utc};
use kidbank_core::gateway::{Collection, Query};
use kidbank_core::{CustomTheme, Kid, KidPatch, Money};
use sqlx::sqlite::SqliteConnection;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::select;
use crate::error::{DbError, DbResult};

const COLUMNS: &str = "id, parent_id, name, pin, balance_cents, theme, custom_themes, \
                       avatar_emoji, created_at, updated_at, last_login";

#[derive(Debug, sqlx::FromRow)]
struct KidRow {
    id: String,
    parent_id: String,
    name: String,
    pin: String,
    balance_cents: Money,
    theme: String,
    custom_themes: String,
    avatar_emoji: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl TryFrom<KidRow> for Kid {
    type Error = DbError;

    fn try_from(row: KidRow) -> DbResult<Self> {
        let custom_themes: Vec<CustomTheme> = serde_json::from_str(&row.custom_themes)
            .map_err(|e| DbError::corrupt("custom_themes", e))?;
        Ok(Kid {
            id: row.id,
            parent_id: row.parent_id,
            name: row.name,
            pin: row.pin,
            balance: row.balance_cents,
            theme: row.theme,
            custom_themes,
            avatar_emoji: row.avatar_emoji,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login: row.last_login,
        })
    }
}

fn themes_json(themes: &[CustomTheme]) -> DbResult<String> {
    serde_json::to_string(themes).map_err(|e| DbError::corrupt("custom_themes", e))
}

#[derive(Debug, Clone)]
pub struct KidRepository {
    pool: SqlitePool,
}

impl KidRepository {
    pub fn new(pool: SqlitePool) -> Self {
        KidRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Kid>> {
        let sql = format!("SELECT {COLUMNS} FROM kids WHERE id = ?1");
        let row = sqlx::query_as::<_, KidRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Kid::try_from).transpose()
    }

    pub async fn list(&self, query: &Query) -> DbResult<Vec<Kid>> {
        let rows = select(COLUMNS, query)
            .build_query_as::<KidRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Kid::try_from).collect()
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kids")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn insert(conn: &mut SqliteConnection, kid: &Kid) -> DbResult<()> {
        debug!(id = %kid.id, parent_id = %kid.parent_id, "Inserting kid");

        sqlx::query(
            r#"
            INSERT INTO kids (
                id, parent_id, name, pin, balance_cents, theme, custom_themes,
                avatar_emoji, created_at, updated_at, last_login
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&kid.id)
        .bind(&kid.parent_id)
        .bind(&kid.name)
        .bind(&kid.pin)
        .bind(kid.balance)
        .bind(&kid.theme)
        .bind(themes_json(&kid.custom_themes)?)
        .bind(&kid.avatar_emoji)
        .bind(kid.created_at)
        .bind(kid.updated_at)
        .bind(kid.last_login)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Writes the `Some` fields of `patch`.
    pub async fn update(
        conn: &mut SqliteConnection,
        id: &str,
        patch: &KidPatch,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE kids SET updated_at = ");
        builder.push_bind(now);
        if let Some(name) = &patch.name {
            builder.push(", name = ").push_bind(name.clone());
        }
        if let Some(pin) = &patch.pin {
            builder.push(", pin = ").push_bind(pin.clone());
        }
        if let Some(avatar) = &patch.avatar_emoji {
            builder.push(", avatar_emoji = ").push_bind(avatar.clone());
        }
        if let Some(theme) = &patch.theme {
            builder.push(", theme = ").push_bind(theme.clone());
        }
        if let Some(balance) = patch.balance {
            builder.push(", balance_cents = ").push_bind(balance);
        }
        if let Some(last_login) = patch.last_login {
            builder.push(", last_login = ").push_bind(last_login);
        }
        builder.push(" WHERE id = ").push_bind(id.to_string());

        let result = builder.build().execute(conn).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(Collection::Kids, id));
        }
        Ok(())
    }

    /// `delta` may be negative.
    pub async fn increment_balance(
        conn: &mut SqliteConnection,
        id: &str,
        delta: Money,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %id, delta = %delta, "Incrementing balance");

        let result = sqlx::query(
            r#"
            UPDATE kids SET
                balance_cents = balance_cents + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(now)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(Collection::Kids, id));
        }
        Ok(())
    }

    pub async fn append_custom_theme(
        conn: &mut SqliteConnection,
        id: &str,
        theme: &CustomTheme,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT custom_themes FROM kids WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        let Some(stored) = stored else {
            return Err(DbError::not_found(Collection::Kids, id));
        };

        let mut themes: Vec<CustomTheme> =
            serde_json::from_str(&stored).map_err(|e| DbError::corrupt("custom_themes", e))?;
        themes.push(theme.clone());

        sqlx::query("UPDATE kids SET custom_themes = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(themes_json(&themes)?)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
