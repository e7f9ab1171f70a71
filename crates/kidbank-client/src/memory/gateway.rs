//! In-memory document store with live queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

use kidbank_core::gateway::{
    Collection, Document, Gateway, GatewayError, GatewayResult, ListenerRegistration, Mutation,
    Query, SnapshotListener,
};
use kidbank_core::RequestStatus;

type DocKey = (Collection, String);
type Documents = BTreeMap<DocKey, Document>;

struct Watcher {
    id: u64,
    query: Query,
    listener: SnapshotListener,
}

/// Gateway backed by ordered maps.
///
/// Batches run against a copy of the data that replaces the original only
/// when every mutation succeeded. After a commit, each live query touching a
/// changed collection receives its full result set again.
#[derive(Default)]
pub struct MemoryGateway {
    docs: RefCell<Documents>,
    watchers: Rc<RefCell<Vec<Watcher>>>,
    next_watcher: Cell<u64>,
    commits: Cell<u64>,
    fail_next_mutation: RefCell<Option<GatewayError>>,
    fail_subscriptions: RefCell<Option<GatewayError>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        MemoryGateway::default()
    }

    /// Stores a document directly, without notifying live queries.
    pub fn insert(&self, doc: Document) {
        let key = (doc.collection(), doc.id().to_string());
        self.docs.borrow_mut().insert(key, doc);
    }

    pub fn document(&self, collection: Collection, id: &str) -> Option<Document> {
        self.docs.borrow().get(&(collection, id.to_string())).cloned()
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.docs
            .borrow()
            .keys()
            .filter(|(c, _)| *c == collection)
            .count()
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.borrow().len()
    }

    /// Number of batches committed so far.
    pub fn commits(&self) -> u64 {
        self.commits.get()
    }

    /// Makes the next `mutate` fail with `err` without applying anything.
    pub fn fail_next_mutation(&self, err: GatewayError) {
        *self.fail_next_mutation.borrow_mut() = Some(err);
    }

    /// Makes every `subscribe` fail with `err` until cleared with `None`.
    pub fn fail_subscriptions(&self, err: Option<GatewayError>) {
        *self.fail_subscriptions.borrow_mut() = err;
    }

    /// Reports `err` to every live query and drops them, like a backend
    /// terminating its listeners.
    pub fn break_subscriptions(&self, err: GatewayError) {
        let watchers: Vec<Watcher> = self.watchers.borrow_mut().drain(..).collect();
        warn!(count = watchers.len(), error = %err, "Terminating live queries");
        for watcher in watchers {
            watcher.listener.error(err.clone());
        }
    }

    fn push_snapshots(&self, touched: &BTreeSet<Collection>) {
        let targets: Vec<(Query, SnapshotListener)> = self
            .watchers
            .borrow()
            .iter()
            .filter(|w| touched.contains(&w.query.collection))
            .map(|w| (w.query.clone(), w.listener.clone()))
            .collect();

        for (query, listener) in targets {
            let snapshot = query.evaluate(self.docs.borrow().values());
            listener.snapshot(snapshot);
        }
    }
}

fn kid_mut<'a>(docs: &'a mut Documents, kid_id: &str) -> GatewayResult<&'a mut kidbank_core::Kid> {
    match docs.get_mut(&(Collection::Kids, kid_id.to_string())) {
        Some(Document::Kid(kid)) => Ok(kid),
        _ => Err(GatewayError::not_found(Collection::Kids, kid_id)),
    }
}

/// Applies one mutation to `docs`.
fn apply(docs: &mut Documents, mutation: &Mutation, now: DateTime<Utc>) -> GatewayResult<()> {
    match mutation {
        Mutation::Insert(doc) => {
            let key = (doc.collection(), doc.id().to_string());
            if docs.contains_key(&key) {
                return Err(GatewayError::Conflict(format!("{} {}", key.0, key.1)));
            }
            docs.insert(key, doc.clone());
        }
        Mutation::UpdateKid { kid_id, patch } => {
            let kid = kid_mut(docs, kid_id)?;
            patch.apply_to(kid);
            kid.updated_at = now;
        }
        Mutation::IncrementBalance { kid_id, delta } => {
            let kid = kid_mut(docs, kid_id)?;
            kid.balance += *delta;
            kid.updated_at = now;
        }
        Mutation::AppendCustomTheme { kid_id, theme } => {
            let kid = kid_mut(docs, kid_id)?;
            kid.custom_themes.push(theme.clone());
            kid.updated_at = now;
        }
        Mutation::ResolveRequest {
            request_id,
            status,
            note,
            processed_at,
        } => {
            let key = (Collection::DepositRequests, request_id.clone());
            let Some(Document::DepositRequest(request)) = docs.get_mut(&key) else {
                return Err(GatewayError::not_found(Collection::DepositRequests, request_id));
            };
            if request.status != RequestStatus::Pending {
                return Err(GatewayError::Conflict(format!(
                    "request {request_id} is already {}",
                    request.status
                )));
            }
            request.status = *status;
            request.parent_note = note.clone();
            request.processed_at = Some(*processed_at);
        }
        Mutation::Delete { collection, id } => {
            docs.remove(&(*collection, id.clone()));
        }
        Mutation::DeleteWhere { collection, filter } => {
            docs.retain(|(c, _), doc| c != collection || !filter.matches(doc));
        }
    }
    Ok(())
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
impl Gateway for MemoryGateway {
    async fn subscribe(
        &self,
        query: Query,
        listener: SnapshotListener,
    ) -> GatewayResult<ListenerRegistration> {
        if let Some(err) = self.fail_subscriptions.borrow().clone() {
            return Err(err);
        }

        let id = self.next_watcher.get() + 1;
        self.next_watcher.set(id);
        debug!(watcher = id, collection = %query.collection, "Live query started");

        let initial = query.evaluate(self.docs.borrow().values());
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
        Ok(query.evaluate(self.docs.borrow().values()))
    }

    async fn get_document(&self, collection: Collection, id: &str) -> GatewayResult<Option<Document>> {
        Ok(self.document(collection, id))
    }

    async fn mutate(&self, batch: Vec<Mutation>) -> GatewayResult<()> {
        Mutation::check_batch(&batch)?;
        if let Some(err) = self.fail_next_mutation.borrow_mut().take() {
            warn!(error = %err, "Injected mutation failure");
            return Err(err);
        }

        let now = Utc::now();
        let mut staged = self.docs.borrow().clone();
        for mutation in &batch {
            apply(&mut staged, mutation, now)?;
        }
        *self.docs.borrow_mut() = staged;
        self.commits.set(self.commits.get() + 1);
        debug!(mutations = batch.len(), "Batch committed");

        let touched: BTreeSet<Collection> = batch.iter().map(touched).collect();
        self.push_snapshots(&touched);
        Ok(())
    }
}

impl fmt::Debug for MemoryGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryGateway")
            .field("documents", &self.docs.borrow().len())
            .field("watchers", &self.watcher_count())
            .finish()
    }
}
