//! # SQLite Gateway
//!
//! The gateway contract on top of [`Database`].
//!
//! ## Mutation Batch
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION                                    │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    IncrementBalance  → UPDATE kids SET balance_cents = balance_cents + ?│
//! │    Insert(tx)        → INSERT INTO transactions ...                     │
//! │  COMMIT  ← any failure rolls back every statement                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//!        │
//!        ▼
//!  every watcher on a touched collection re-runs its query
//!  and receives the full result set
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, error, warn};

use kidbank_core::gateway::{
    Collection, Document, Gateway, GatewayError, GatewayResult, ListenerRegistration, Mutation,
    Query, SnapshotListener,
};
use sqlx::sqlite::SqliteConnection;

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::{self, KidRepository, LedgerRepository, ParentRepository, RequestRepository};

struct Watcher {
    id: u64,
    query: Query,
    listener: SnapshotListener,
}

/// Gateway backed by a local SQLite database.
///
/// Live queries are re-evaluated after each batch committed through this
/// gateway. Writes made by other processes are not observed.
pub struct SqliteGateway {
    db: Database,
    watchers: Rc<RefCell<Vec<Watcher>>>,
    next_watcher: Cell<u64>,
}

impl SqliteGateway {
    pub fn new(db: Database) -> Self {
        SqliteGateway {
            db,
            watchers: Rc::new(RefCell::new(Vec::new())),
            next_watcher: Cell::new(0),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.borrow().len()
    }

    async fn run_query(&self, query: &Query) -> DbResult<Vec<Document>> {
        let docs = match query.collection {
            Collection::Parents => self
                .db
                .parents()
                .list(query)
                .await?
                .into_iter()
                .map(Document::Parent)
                .collect(),
            Collection::Kids => self
                .db
                .kids()
                .list(query)
                .await?
                .into_iter()
                .map(Document::Kid)
                .collect(),
            Collection::Transactions => self
                .db
                .ledger()
                .list(query)
                .await?
                .into_iter()
                .map(Document::Transaction)
                .collect(),
            Collection::DepositRequests => self
                .db
                .requests()
                .list(query)
                .await?
                .into_iter()
                .map(Document::DepositRequest)
                .collect(),
        };
        Ok(docs)
    }

    /// Re-runs every watcher on a touched collection.
    ///
    /// Watchers are copied out first: a listener may cancel its own or
    /// another registration while being notified.
    async fn push_snapshots(&self, touched: &BTreeSet<Collection>) {
        let targets: Vec<(u64, Query, SnapshotListener)> = self
            .watchers
            .borrow()
            .iter()
            .filter(|w| touched.contains(&w.query.collection))
            .map(|w| (w.id, w.query.clone(), w.listener.clone()))
            .collect();

        for (id, query, listener) in targets {
            let result = self.run_query(&query).await;
            if !self.watchers.borrow().iter().any(|w| w.id == id) {
                continue;
            }
            match result {
                Ok(docs) => listener.snapshot(docs),
                Err(err) => {
                    error!(watcher = id, error = %err, "Live query refresh failed");
                    self.watchers.borrow_mut().retain(|w| w.id != id);
                    listener.error(GatewayError::from(err));
                }
            }
        }
    }
}

/// Applies one mutation on the batch's connection.
async fn apply(conn: &mut SqliteConnection, mutation: &Mutation, now: DateTime<Utc>) -> DbResult<()> {
    match mutation {
        Mutation::Insert(doc) => match doc {
            Document::Parent(parent) => ParentRepository::insert(conn, parent).await,
            Document::Kid(kid) => KidRepository::insert(conn, kid).await,
            Document::Transaction(tx) => LedgerRepository::insert(conn, tx).await,
            Document::DepositRequest(request) => RequestRepository::insert(conn, request).await,
        },
        Mutation::UpdateKid { kid_id, patch } => KidRepository::update(conn, kid_id, patch, now).await,
        Mutation::IncrementBalance { kid_id, delta } => {
            KidRepository::increment_balance(conn, kid_id, *delta, now).await
        }
        Mutation::AppendCustomTheme { kid_id, theme } => {
            KidRepository::append_custom_theme(conn, kid_id, theme, now).await
        }
        Mutation::ResolveRequest {
            request_id,
            status,
            note,
            processed_at,
        } => {
            RequestRepository::resolve(conn, request_id, *status, note.as_deref(), *processed_at)
                .await
        }
        Mutation::Delete { collection, id } => {
            repository::delete(conn, *collection, id).await.map(|_| ())
        }
        Mutation::DeleteWhere { collection, filter } => {
            let removed = repository::delete_where(conn, *collection, filter).await?;
            debug!(collection = %collection, removed, "Deleted matching rows");
            Ok(())
        }
    }
}

fn touched(mutation: &Mutation) -> Collection {
    match mutation {
        Mutation::Insert(doc) => doc.collection(),
        Mutation::UpdateKid { .. }
        | Mutation::IncrementBalance { .. }
        | Mutation::AppendCustomTheme { .. } => Collection::Kids,
        Mutation::ResolveRequest { .. } => Collection::DepositRequests,
        Mutation::Delete { collection, .. } | Mutation::DeleteWhere { collection, .. } => *collection,
    }
}

#[async_trait(?Send)]
impl Gateway for SqliteGateway {
    async fn subscribe(
        &self,
        query: Query,
        listener: SnapshotListener,
    ) -> GatewayResult<ListenerRegistration> {
        let initial = self.run_query(&query).await?;

        let id = self.next_watcher.get() + 1;
        self.next_watcher.set(id);
        debug!(watcher = id, collection = %query.collection, "Live query started");

        self.watchers.borrow_mut().push(Watcher {
            id,
            query,
            listener: listener.clone(),
        });
        listener.snapshot(initial);

        let watchers: Weak<RefCell<Vec<Watcher>>> = Rc::downgrade(&self.watchers);
        Ok(ListenerRegistration::new(move || {
            if let Some(watchers) = watchers.upgrade() {
                watchers.borrow_mut().retain(|w| w.id != id);
                debug!(watcher = id, "Live query stopped");
            }
        }))
    }

    async fn fetch(&self, query: &Query) -> GatewayResult<Vec<Document>> {
        Ok(self.run_query(query).await?)
    }

    async fn get_document(&self, collection: Collection, id: &str) -> GatewayResult<Option<Document>> {
        let doc = match collection {
            Collection::Parents => self.db.parents().get(id).await?.map(Document::Parent),
            Collection::Kids => self.db.kids().get(id).await?.map(Document::Kid),
            Collection::Transactions => self.db.ledger().get(id).await?.map(Document::Transaction),
            Collection::DepositRequests => {
                self.db.requests().get(id).await?.map(Document::DepositRequest)
            }
        };
        Ok(doc)
    }

    async fn mutate(&self, batch: Vec<Mutation>) -> GatewayResult<()> {
        Mutation::check_batch(&batch)?;

        let now = Utc::now();
        let mut tx = self.db.pool().begin().await.map_err(crate::DbError::from)?;
        for mutation in &batch {
            if let Err(err) = apply(&mut *tx, mutation, now).await {
                warn!(error = %err, "Batch rolled back");
                // Dropping `tx` rolls back.
                return Err(GatewayError::from(err));
            }
        }
        tx.commit().await.map_err(crate::DbError::from)?;
        debug!(mutations = batch.len(), "Batch committed");

        let touched: BTreeSet<Collection> = batch.iter().map(touched).collect();
        self.push_snapshots(&touched).await;
        Ok(())
    }
}

impl fmt::Debug for SqliteGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteGateway")
            .field("db", &self.db)
            .field("watchers", &self.watcher_count())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use kidbank_core::gateway::Filter;
    use kidbank_core::{
        CustomTheme, DepositRequest, Kid, KidPatch, Money, ParentProfile, RequestStatus,
        RequestedBy, ThemeColors, Transaction, TransactionType,
    };

    async fn gateway() -> SqliteGateway {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        SqliteGateway::new(db)
    }

    fn kid(id: &str, minutes_ago: i64) -> Kid {
        let at = Utc::now() - chrono::Duration::minutes(minutes_ago);
        Kid {
            id: id.into(),
            parent_id: "u1".into(),
            name: format!("Kid {id}"),
            pin: "4826".into(),
            balance: Money::from_cents(1000),
            theme: "default".into(),
            custom_themes: Vec::new(),
            avatar_emoji: "🦊".into(),
            created_at: at,
            updated_at: at,
            last_login: None,
        }
    }

    fn tx(id: &str, kid_id: &str) -> Transaction {
        Transaction {
            id: id.into(),
            kid_id: kid_id.into(),
            parent_id: "u1".into(),
            kind: TransactionType::Reward,
            amount: Money::from_cents(250),
            description: "Chores".into(),
            requested_by: RequestedBy::Parent,
            processed_by: Some("u1".into()),
            created_at: Utc::now(),
        }
    }

    fn request(id: &str, kid_id: &str) -> DepositRequest {
        DepositRequest {
            id: id.into(),
            kid_id: kid_id.into(),
            kid_name: "Ava".into(),
            kid_avatar: "🐼".into(),
            parent_id: "u1".into(),
            amount: Money::from_cents(500),
            description: "Birthday money".into(),
            status: RequestStatus::Pending,
            parent_note: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    fn insert(doc: Document) -> Mutation {
        Mutation::Insert(doc)
    }

    fn recorder() -> (SnapshotListener, Rc<RefCell<Vec<Vec<Document>>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let listener = SnapshotListener::new(move |docs| log.borrow_mut().push(docs), |_| {});
        (listener, seen)
    }

    #[tokio::test]
    async fn test_round_trips_every_collection() {
        let gateway = gateway().await;
        let mut ava = kid("k1", 0);
        ava.custom_themes.push(CustomTheme {
            id: "custom-1".into(),
            name: "Sunset".into(),
            colors: ThemeColors::default(),
            created_at: Utc::now(),
        });
        let parent = ParentProfile {
            id: "u1".into(),
            email: "sam@example.com".into(),
            display_name: "Sam".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        gateway
            .mutate(vec![
                insert(Document::Parent(parent.clone())),
                insert(Document::Kid(ava.clone())),
                insert(Document::Transaction(tx("t1", "k1"))),
                insert(Document::DepositRequest(request("r1", "k1"))),
            ])
            .await
            .unwrap();

        let stored = gateway.get_document(Collection::Kids, "k1").await.unwrap();
        let stored = stored.and_then(Document::into_kid).unwrap();
        assert_eq!(stored.custom_themes, ava.custom_themes);
        assert_eq!(stored.balance, ava.balance);

        let parent_doc = gateway.get_document(Collection::Parents, "u1").await.unwrap();
        assert_eq!(parent_doc, Some(Document::Parent(parent)));

        let txs = gateway.fetch(&Query::transactions_of("k1", 10)).await.unwrap();
        assert_eq!(txs.len(), 1);
        let pending = gateway.fetch(&Query::pending_requests_for("u1")).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(gateway
            .get_document(Collection::Transactions, "missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_queries_order_newest_first_and_limit() {
        let gateway = gateway().await;
        gateway
            .mutate(vec![
                insert(Document::Kid(kid("old", 30))),
                insert(Document::Kid(kid("new", 1))),
                insert(Document::Kid(kid("middle", 10))),
            ])
            .await
            .unwrap();

        let docs = gateway
            .fetch(&Query::kids_of("u1").limit(2))
            .await
            .unwrap();
        let ids: Vec<&str> = docs.iter().map(Document::id).collect();
        assert_eq!(ids, vec!["new", "middle"]);

        let none = gateway.fetch(&Query::kids_of("someone-else")).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_rolls_back() {
        let gateway = gateway().await;
        gateway.mutate(vec![insert(Document::Kid(kid("k1", 0)))]).await.unwrap();

        let result = gateway
            .mutate(vec![
                Mutation::IncrementBalance {
                    kid_id: "k1".into(),
                    delta: Money::from_cents(-500),
                },
                Mutation::UpdateKid {
                    kid_id: "ghost".into(),
                    patch: KidPatch::theme("mint-fresh"),
                },
            ])
            .await;

        assert_eq!(result, Err(GatewayError::not_found(Collection::Kids, "ghost")));
        let kid = gateway.database().kids().get("k1").await.unwrap().unwrap();
        assert_eq!(kid.balance, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let gateway = gateway().await;
        gateway.mutate(vec![insert(Document::Kid(kid("k1", 0)))]).await.unwrap();
        let result = gateway.mutate(vec![insert(Document::Kid(kid("k1", 0)))]).await;
        assert!(matches!(result, Err(GatewayError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_resolve_twice_conflicts() {
        let gateway = gateway().await;
        gateway
            .mutate(vec![insert(Document::DepositRequest(request("r1", "k1")))])
            .await
            .unwrap();

        let resolve = |status| Mutation::ResolveRequest {
            request_id: "r1".into(),
            status,
            note: Some("Nice work".into()),
            processed_at: Utc::now(),
        };
        gateway.mutate(vec![resolve(RequestStatus::Approved)]).await.unwrap();
        let again = gateway.mutate(vec![resolve(RequestStatus::Denied)]).await;
        assert!(matches!(again, Err(GatewayError::Conflict(_))));

        let stored = gateway.database().requests().get("r1").await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Approved);
        assert_eq!(stored.parent_note.as_deref(), Some("Nice work"));
        assert!(stored.processed_at.is_some());

        let missing = Mutation::ResolveRequest {
            request_id: "nope".into(),
            status: RequestStatus::Denied,
            note: None,
            processed_at: Utc::now(),
        };
        assert!(matches!(
            gateway.mutate(vec![missing]).await,
            Err(GatewayError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_live_query_gets_full_snapshots() {
        let gateway = gateway().await;
        gateway.mutate(vec![insert(Document::Kid(kid("k1", 5)))]).await.unwrap();

        let (listener, seen) = recorder();
        let registration = gateway.subscribe(Query::kids_of("u1"), listener).await.unwrap();
        assert_eq!(seen.borrow().len(), 1);

        gateway
            .mutate(vec![
                Mutation::IncrementBalance {
                    kid_id: "k1".into(),
                    delta: Money::from_cents(250),
                },
                insert(Document::Transaction(tx("t1", "k1"))),
            ])
            .await
            .unwrap();
        gateway.mutate(vec![insert(Document::Kid(kid("k2", 0)))]).await.unwrap();

        {
            let snapshots = seen.borrow();
            assert_eq!(snapshots.len(), 3);
            let first = snapshots[1][0].clone().into_kid().unwrap();
            assert_eq!(first.balance, Money::from_cents(1250));
            assert_eq!(snapshots[2].len(), 2);
        }

        // Requests don't touch the kids query.
        gateway
            .mutate(vec![insert(Document::DepositRequest(request("r1", "k1")))])
            .await
            .unwrap();
        assert_eq!(seen.borrow().len(), 3);

        registration.cancel();
        assert_eq!(gateway.watcher_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_kid_cascade_batch() {
        let gateway = gateway().await;
        gateway
            .mutate(vec![
                insert(Document::Kid(kid("k1", 0))),
                insert(Document::Kid(kid("k2", 0))),
                insert(Document::Transaction(tx("t1", "k1"))),
                insert(Document::Transaction(tx("t2", "k2"))),
                insert(Document::DepositRequest(request("r1", "k1"))),
            ])
            .await
            .unwrap();

        gateway
            .mutate(vec![
                Mutation::Delete {
                    collection: Collection::Kids,
                    id: "k1".into(),
                },
                Mutation::DeleteWhere {
                    collection: Collection::Transactions,
                    filter: Filter::KidId("k1".into()),
                },
                Mutation::DeleteWhere {
                    collection: Collection::DepositRequests,
                    filter: Filter::KidId("k1".into()),
                },
            ])
            .await
            .unwrap();

        assert_eq!(gateway.database().kids().count().await.unwrap(), 1);
        let remaining = gateway
            .fetch(&Query::new(Collection::Transactions))
            .await
            .unwrap();
        let ids: Vec<&str> = remaining.iter().map(Document::id).collect();
        assert_eq!(ids, vec!["t2"]);
        assert!(gateway.database().requests().get("r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_patch_and_custom_theme() {
        let gateway = gateway().await;
        gateway.mutate(vec![insert(Document::Kid(kid("k1", 0)))]).await.unwrap();

        let login = Utc::now();
        gateway
            .mutate(vec![
                Mutation::UpdateKid {
                    kid_id: "k1".into(),
                    patch: KidPatch {
                        name: Some("Ava".into()),
                        last_login: Some(login),
                        ..KidPatch::default()
                    },
                },
                Mutation::AppendCustomTheme {
                    kid_id: "k1".into(),
                    theme: CustomTheme {
                        id: "custom-1".into(),
                        name: "Lagoon".into(),
                        colors: ThemeColors::default(),
                        created_at: login,
                    },
                },
            ])
            .await
            .unwrap();

        let kid = gateway.database().kids().get("k1").await.unwrap().unwrap();
        assert_eq!(kid.name, "Ava");
        assert_eq!(kid.pin, "4826");
        assert_eq!(kid.last_login, Some(login));
        assert_eq!(kid.custom_themes.len(), 1);
        assert_eq!(kid.custom_themes[0].name, "Lagoon");
    }
}
