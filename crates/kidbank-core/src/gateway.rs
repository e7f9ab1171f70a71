//! # Remote Data Gateway Contract
//!
//! The client never talks to a database directly. It asks a [`Gateway`] for
//! live queries and hands it atomic batches of typed [`Mutation`]s.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Session / BankService                       Gateway implementation    │
//! │   ─────────────────────                       ──────────────────────    │
//! │                                                                         │
//! │   subscribe(Query::kids_of(uid), listener) ──►  register watcher        │
//! │                                             ◄──  on_snapshot(all kids)  │
//! │                                                                         │
//! │   mutate([IncrementBalance, Insert(tx)])  ──►  apply ALL or NOTHING     │
//! │                                             ◄──  Ok(()) / GatewayError  │
//! │                                                                         │
//! │                                             ◄──  on_snapshot(all kids)  │
//! │                                                  (every watcher whose   │
//! │                                                   result may change)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - A snapshot is always the FULL current result set, never a diff
//! - A batch either commits every mutation or none
//! - Listener callbacks may fire at any time after `subscribe` returns,
//!   including after the subscriber has moved on; they must check validity

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

use crate::money::Money;
use crate::types::{
    CustomTheme, DepositRequest, Kid, KidPatch, ParentProfile, RequestStatus, Transaction,
};

// =============================================================================
// Errors
// =============================================================================

/// Failures reported by a gateway backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// A mutation or lookup referenced a document that does not exist.
    #[error("{collection} document not found: {id}")]
    NotFound { collection: Collection, id: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Backend unreachable (network down, database closed).
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    /// Insert of an id that already exists.
    #[error("Document already exists: {0}")]
    Conflict(String),

    /// The batch itself is malformed (empty, wrong collection for a filter).
    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl GatewayError {
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        GatewayError::NotFound {
            collection,
            id: id.into(),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// Collections & Queries
// =============================================================================

/// The four document collections of a household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Parents,
    Kids,
    Transactions,
    DepositRequests,
}

impl Collection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Collection::Parents => "parents",
            Collection::Kids => "kids",
            Collection::Transactions => "transactions",
            Collection::DepositRequests => "depositRequests",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equality filter on an indexed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    ParentId(String),
    KidId(String),
    Status(RequestStatus),
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::ParentId(id) => doc.parent_id() == Some(id.as_str()),
            Filter::KidId(id) => doc.kid_id() == Some(id.as_str()),
            Filter::Status(status) => doc.status() == Some(*status),
        }
    }
}

/// Sort order on `created_at`. Ties break on id so results are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// A collection query: filters are ANDed, then sorted, then truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: Collection,
    pub filters: Vec<Filter>,
    pub order: Order,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order: Order::default(),
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// A parent's kids, newest first.
    pub fn kids_of(parent_id: &str) -> Self {
        Self::new(Collection::Kids).filter(Filter::ParentId(parent_id.to_string()))
    }

    /// A kid's most recent transactions.
    pub fn transactions_of(kid_id: &str, limit: usize) -> Self {
        Self::new(Collection::Transactions)
            .filter(Filter::KidId(kid_id.to_string()))
            .limit(limit)
    }

    /// Requests waiting for a parent's decision, newest first.
    pub fn pending_requests_for(parent_id: &str) -> Self {
        Self::new(Collection::DepositRequests)
            .filter(Filter::ParentId(parent_id.to_string()))
            .filter(Filter::Status(RequestStatus::Pending))
    }

    pub fn matches(&self, doc: &Document) -> bool {
        doc.collection() == self.collection && self.filters.iter().all(|f| f.matches(doc))
    }

    /// Filters, sorts and truncates an unordered document set.
    pub fn evaluate<'a>(&self, docs: impl IntoIterator<Item = &'a Document>) -> Vec<Document> {
        let mut selected: Vec<Document> = docs
            .into_iter()
            .filter(|doc| self.matches(doc))
            .cloned()
            .collect();

        selected.sort_by(|a, b| {
            let oldest_first = a
                .created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()));
            match self.order {
                Order::OldestFirst => oldest_first,
                Order::NewestFirst => oldest_first.reverse(),
            }
        });

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

// =============================================================================
// Documents
// =============================================================================

/// One stored record, tagged by collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    Parent(ParentProfile),
    Kid(Kid),
    Transaction(Transaction),
    DepositRequest(DepositRequest),
}

impl Document {
    pub fn id(&self) -> &str {
        match self {
            Document::Parent(p) => &p.id,
            Document::Kid(k) => &k.id,
            Document::Transaction(t) => &t.id,
            Document::DepositRequest(r) => &r.id,
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            Document::Parent(_) => Collection::Parents,
            Document::Kid(_) => Collection::Kids,
            Document::Transaction(_) => Collection::Transactions,
            Document::DepositRequest(_) => Collection::DepositRequests,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Document::Parent(p) => p.created_at,
            Document::Kid(k) => k.created_at,
            Document::Transaction(t) => t.created_at,
            Document::DepositRequest(r) => r.created_at,
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        match self {
            Document::Parent(p) => Some(&p.id),
            Document::Kid(k) => Some(&k.parent_id),
            Document::Transaction(t) => Some(&t.parent_id),
            Document::DepositRequest(r) => Some(&r.parent_id),
        }
    }

    pub fn kid_id(&self) -> Option<&str> {
        match self {
            Document::Parent(_) => None,
            Document::Kid(k) => Some(&k.id),
            Document::Transaction(t) => Some(&t.kid_id),
            Document::DepositRequest(r) => Some(&r.kid_id),
        }
    }

    pub fn status(&self) -> Option<RequestStatus> {
        match self {
            Document::DepositRequest(r) => Some(r.status),
            _ => None,
        }
    }

    pub fn into_kid(self) -> Option<Kid> {
        match self {
            Document::Kid(kid) => Some(kid),
            _ => None,
        }
    }

    pub fn into_transaction(self) -> Option<Transaction> {
        match self {
            Document::Transaction(tx) => Some(tx),
            _ => None,
        }
    }

    pub fn into_request(self) -> Option<DepositRequest> {
        match self {
            Document::DepositRequest(request) => Some(request),
            _ => None,
        }
    }
}

// =============================================================================
// Mutations
// =============================================================================

/// One write inside an atomic batch.
///
/// ## Example: adding money
/// ```text
/// [ IncrementBalance { kid, +$5.00 },     ─┐
///   Insert(Transaction { deposit, $5 }) ] ─┴─ both or neither
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Create a document; fails with `Conflict` if the id exists.
    Insert(Document),
    UpdateKid { kid_id: String, patch: KidPatch },
    /// Server-side increment; `delta` may be negative.
    IncrementBalance { kid_id: String, delta: Money },
    AppendCustomTheme { kid_id: String, theme: CustomTheme },
    /// Move a request out of `Pending`.
    ResolveRequest {
        request_id: String,
        status: RequestStatus,
        note: Option<String>,
        processed_at: DateTime<Utc>,
    },
    Delete { collection: Collection, id: String },
    /// Delete every document of `collection` matching `filter`.
    DeleteWhere { collection: Collection, filter: Filter },
}

impl Mutation {
    /// Rejects batches no backend could apply.
    pub fn check_batch(batch: &[Mutation]) -> GatewayResult<()> {
        if batch.is_empty() {
            return Err(GatewayError::InvalidMutation("empty batch".to_string()));
        }
        for mutation in batch {
            match mutation {
                Mutation::ResolveRequest { status, request_id, .. }
                    if *status == RequestStatus::Pending =>
                {
                    return Err(GatewayError::InvalidMutation(format!(
                        "request {request_id} cannot be resolved back to pending"
                    )));
                }
                Mutation::UpdateKid { patch, kid_id } if patch.is_empty() => {
                    return Err(GatewayError::InvalidMutation(format!(
                        "empty patch for kid {kid_id}"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

// =============================================================================
// Snapshot Listener & Registration
// =============================================================================

/// Callbacks a live query reports to.
#[derive(Clone)]
pub struct SnapshotListener {
    on_snapshot: Rc<dyn Fn(Vec<Document>)>,
    on_error: Rc<dyn Fn(GatewayError)>,
}

impl SnapshotListener {
    pub fn new(
        on_snapshot: impl Fn(Vec<Document>) + 'static,
        on_error: impl Fn(GatewayError) + 'static,
    ) -> Self {
        Self {
            on_snapshot: Rc::new(on_snapshot),
            on_error: Rc::new(on_error),
        }
    }

    pub fn snapshot(&self, docs: Vec<Document>) {
        (self.on_snapshot)(docs)
    }

    pub fn error(&self, err: GatewayError) {
        (self.on_error)(err)
    }
}

impl fmt::Debug for SnapshotListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotListener").finish_non_exhaustive()
    }
}

/// Handle to a live query or auth-state listener.
///
/// `cancel()` is idempotent. Dropping the handle also cancels, since a
/// dropped handle could never be cancelled later.
#[must_use = "dropping a registration cancels it immediately"]
pub struct ListenerRegistration {
    cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl ListenerRegistration {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: RefCell::new(Some(Box::new(cancel))),
        }
    }

    /// A registration with nothing to release.
    pub fn noop() -> Self {
        Self {
            cancel: RefCell::new(None),
        }
    }

    pub fn cancel(&self) {
        let cancel = self.cancel.borrow_mut().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.borrow().is_some()
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.is_active())
            .finish()
    }
}

// =============================================================================
// Gateway Trait
// =============================================================================

/// The document store the client reads from and writes to.
///
/// Futures are `?Send`: the client runs on a single-threaded executor and
/// listeners capture `Rc` state.
#[async_trait(?Send)]
pub trait Gateway {
    /// Starts a live query. The current result set is delivered once the
    /// subscription is established and again after every committed change.
    async fn subscribe(
        &self,
        query: Query,
        listener: SnapshotListener,
    ) -> GatewayResult<ListenerRegistration>;

    /// One-shot read of a query.
    async fn fetch(&self, query: &Query) -> GatewayResult<Vec<Document>>;

    async fn get_document(&self, collection: Collection, id: &str)
        -> GatewayResult<Option<Document>>;

    /// Applies `batch` atomically.
    async fn mutate(&self, batch: Vec<Mutation>) -> GatewayResult<()>;
}

// =============================================================================
// Unit Tests
// =============================================================================
