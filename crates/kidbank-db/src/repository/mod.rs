//! # Repository Module
//!
//! One repository per gateway collection.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SqliteGateway                                                          │
//! │       │                                                                 │
//! │       │  fetch(Query::kids_of(uid))        mutate([..])                 │
//! │       ▼                                         │                       │
//! │  KidRepository                                  │  one SQLite           │
//! │  ├── get(&self, id)         reads: pool         │  transaction          │
//! │  ├── list(&self, &query)                        ▼                       │
//! │  ├── insert(conn, &kid)     writes: the batch's connection              │
//! │  ├── update(conn, id, &patch)                                           │
//! │  └── increment_balance(conn, id, delta)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads go through the repository's pool. Writes take the connection of
//! the enclosing transaction so a batch commits or rolls back as a whole.
//!
//! ## Available Repositories
//!
//! - [`ParentRepository`] - Parent profiles
//! - [`KidRepository`] - Kids, balances, custom themes
//! - [`LedgerRepository`] - Transaction history
//! - [`RequestRepository`] - Deposit requests

pub mod kid;
pub mod ledger;
pub mod parent;
pub mod request;

pub use kid::KidRepository;
pub use ledger::LedgerRepository;
pub use parent::ParentRepository;
pub use request::RequestRepository;

use kidbank_core::gateway::{Collection, Filter, Order, Query};
use sqlx::sqlite::SqliteConnection;
use sqlx::{QueryBuilder, Sqlite};

use crate::error::DbResult;

pub(crate) fn table(collection: Collection) -> &'static str {
    match collection {
        Collection::Parents => "parents",
        Collection::Kids => "kids",
        Collection::Transactions => "transactions",
        Collection::DepositRequests => "deposit_requests",
    }
}

/// The column `filter` compares in `collection`, or `None` when the filter
/// can never match there (a parent has no kid id).
pub(crate) fn filter_column(collection: Collection, filter: &Filter) -> Option<&'static str> {
    match (collection, filter) {
        (Collection::Parents, Filter::ParentId(_)) => Some("id"),
        (Collection::Kids, Filter::KidId(_)) => Some("id"),
        (Collection::Parents, Filter::KidId(_)) => None,
        (_, Filter::ParentId(_)) => Some("parent_id"),
        (_, Filter::KidId(_)) => Some("kid_id"),
        (Collection::DepositRequests, Filter::Status(_)) => Some("status"),
        (_, Filter::Status(_)) => None,
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, collection: Collection, filter: &Filter) {
    let Some(column) = filter_column(collection, filter) else {
        builder.push("0 = 1");
        return;
    };
    builder.push(column).push(" = ");
    match filter {
        Filter::ParentId(id) | Filter::KidId(id) => builder.push_bind(id.clone()),
        Filter::Status(status) => builder.push_bind(*status),
    };
}

/// `SELECT <columns> FROM <table> WHERE .. ORDER BY .. LIMIT ..` for `query`.
///
/// ## Rules
/// - Filters are ANDed
/// - Ties on `created_at` break on `id`, matching `Query::evaluate`
pub(crate) fn select(columns: &str, query: &Query) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new("SELECT ");
    builder
        .push(columns)
        .push(" FROM ")
        .push(table(query.collection));

    for (i, filter) in query.filters.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        push_filter(&mut builder, query.collection, filter);
    }

    builder.push(match query.order {
        Order::NewestFirst => " ORDER BY created_at DESC, id DESC",
        Order::OldestFirst => " ORDER BY created_at ASC, id ASC",
    });

    if let Some(limit) = query.limit {
        builder
            .push(" LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }
    builder
}

/// Deletes one row by id. Deleting a missing row is not an error.
pub(crate) async fn delete(
    conn: &mut SqliteConnection,
    collection: Collection,
    id: &str,
) -> DbResult<u64> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", table(collection));
    let result = sqlx::query(&sql).bind(id).execute(conn).await?;
    Ok(result.rows_affected())
}

/// Deletes every row of `collection` matching `filter`.
pub(crate) async fn delete_where(
    conn: &mut SqliteConnection,
    collection: Collection,
    filter: &Filter,
) -> DbResult<u64> {
    let mut builder = QueryBuilder::new("DELETE FROM ");
    builder.push(table(collection)).push(" WHERE ");
    push_filter(&mut builder, collection, filter);
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}
