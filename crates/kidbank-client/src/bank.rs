//! # Bank Service
//!
//! Every write a screen can make, expressed as gateway batches.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  screen handler                                                         │
//! │      │  ui.spawn(async { bank.add_money(..).await })                    │
//! │      ▼                                                                  │
//! │  1. signed in?            ──► NotAuthenticated                          │
//! │  2. validate input        ──► ValidationError                           │
//! │  3. gateway.mutate(batch) ──► all or nothing                            │
//! │      │                                                                  │
//! │      ├── live queries push fresh snapshots into the store               │
//! │      ▼                                                                  │
//! │  4. store update; balances are re-read from the gateway and the read   │
//! │     issued last wins, so overlapping writes settle on the newest value  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use kidbank_core::gateway::{Collection, Document, Filter, Gateway, Mutation};
use kidbank_core::validation::{
    validate_description, validate_kid_name, validate_pin, MAX_AMOUNT, MIN_AMOUNT,
};
use kidbank_core::{
    CoreError, CustomTheme, DepositRequest, Kid, KidPatch, Money, NewKid, RequestStatus,
    RequestedBy, Transaction, TransactionType, User, ValidationError, DEFAULT_AVATAR,
    DEFAULT_THEME_ID,
};

use crate::error::{ClientError, ClientResult};
use crate::store::Store;

/// Description of a request made without one.
pub const DEFAULT_REQUEST_DESCRIPTION: &str = "Deposit request";

#[derive(Clone)]
pub struct BankService {
    gateway: Rc<dyn Gateway>,
    store: Store,
    balance_reads: Rc<RefCell<BalanceReads>>,
}

/// Sequence numbers of post-write balance reads.
#[derive(Debug, Default)]
struct BalanceReads {
    issued: u64,
    applied: HashMap<String, u64>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn check_amount(amount: Money) -> ClientResult<()> {
    if amount < MIN_AMOUNT || amount > MAX_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field: "Amount".to_string(),
            min: MIN_AMOUNT,
            max: MAX_AMOUNT,
        }
        .into());
    }
    Ok(())
}

fn describe(description: &str, fallback: &str) -> ClientResult<String> {
    Ok(validate_description(description)?.unwrap_or_else(|| fallback.to_string()))
}

impl BankService {
    pub fn new(gateway: Rc<dyn Gateway>, store: Store) -> Self {
        BankService {
            gateway,
            store,
            balance_reads: Rc::new(RefCell::new(BalanceReads::default())),
        }
    }

    /// Copies the kid's balance from the gateway into the store after a
    /// write.
    ///
    /// Skipped when a read issued later has already been applied, or when the
    /// store holds a snapshot newer than this read.
    async fn refresh_balance(&self, kid_id: &str) {
        let seq = {
            let mut reads = self.balance_reads.borrow_mut();
            reads.issued += 1;
            reads.issued
        };

        let fresh = match self.gateway.get_document(Collection::Kids, kid_id).await {
            Ok(doc) => doc.and_then(Document::into_kid),
            Err(e) => {
                warn!(kid_id, error = %e, "Could not re-read balance");
                None
            }
        };
        let Some(fresh) = fresh else {
            return;
        };

        let superseded = self
            .balance_reads
            .borrow()
            .applied
            .get(kid_id)
            .is_some_and(|&applied| applied > seq);
        let stale = self
            .store
            .kid(kid_id)
            .is_some_and(|kid| kid.updated_at > fresh.updated_at);
        if superseded || stale {
            debug!(kid_id, seq, "Balance read superseded");
            return;
        }

        self.balance_reads
            .borrow_mut()
            .applied
            .insert(kid_id.to_string(), seq);
        self.store
            .update_kid(kid_id, &KidPatch::balance(fresh.balance));
    }

    fn require_user(&self) -> ClientResult<User> {
        self.store.user().ok_or_else(ClientError::not_authenticated)
    }

    /// The kid from the store, or from the gateway if the live query has not
    /// delivered it yet.
    async fn find_kid(&self, kid_id: &str) -> ClientResult<Kid> {
        if let Some(kid) = self.store.kid(kid_id) {
            return Ok(kid);
        }
        self.gateway
            .get_document(Collection::Kids, kid_id)
            .await?
            .and_then(Document::into_kid)
            .ok_or_else(|| CoreError::KidNotFound(kid_id.to_string()).into())
    }

    // =========================================================================
    // Kids
    // =========================================================================

    /// Creates a kid account and returns its id.
    pub async fn create_kid(&self, new_kid: NewKid) -> ClientResult<String> {
        let user = self.require_user()?;
        let name = validate_kid_name(&new_kid.name)?;
        let pin = validate_pin(&new_kid.pin)?;
        if new_kid.initial_balance.is_negative() {
            return Err(ClientError::validation("Starting balance cannot be negative"));
        }

        let now = Utc::now();
        let avatar = if new_kid.avatar_emoji.trim().is_empty() {
            DEFAULT_AVATAR.to_string()
        } else {
            new_kid.avatar_emoji
        };
        let kid = Kid {
            id: new_id(),
            parent_id: user.id,
            name,
            pin,
            balance: new_kid.initial_balance,
            theme: DEFAULT_THEME_ID.to_string(),
            custom_themes: Vec::new(),
            avatar_emoji: avatar,
            created_at: now,
            updated_at: now,
            last_login: None,
        };

        self.gateway
            .mutate(vec![Mutation::Insert(Document::Kid(kid.clone()))])
            .await?;
        info!(kid_id = %kid.id, "Kid created");

        let id = kid.id.clone();
        self.store.add_kid(kid);
        Ok(id)
    }

    /// Applies a partial update. Name and PIN are validated when present.
    pub async fn update_kid(&self, kid_id: &str, mut patch: KidPatch) -> ClientResult<()> {
        self.require_user()?;
        if let Some(name) = &patch.name {
            patch.name = Some(validate_kid_name(name)?);
        }
        if let Some(pin) = &patch.pin {
            patch.pin = Some(validate_pin(pin)?);
        }
        if patch.is_empty() {
            debug!(kid_id, "Empty kid update skipped");
            return Ok(());
        }

        self.gateway
            .mutate(vec![Mutation::UpdateKid {
                kid_id: kid_id.to_string(),
                patch: patch.clone(),
            }])
            .await?;
        self.store.update_kid(kid_id, &patch);
        Ok(())
    }

    pub async fn save_kid_theme(&self, kid_id: &str, theme_id: &str) -> ClientResult<()> {
        self.update_kid(kid_id, KidPatch::theme(theme_id)).await
    }

    /// Appends a designed theme to the kid's collection.
    pub async fn save_custom_theme(&self, kid_id: &str, theme: CustomTheme) -> ClientResult<()> {
        self.require_user()?;
        self.gateway
            .mutate(vec![Mutation::AppendCustomTheme {
                kid_id: kid_id.to_string(),
                theme: theme.clone(),
            }])
            .await?;

        let mut kids = self.store.kids();
        if let Some(kid) = kids.iter_mut().find(|k| k.id == kid_id) {
            if kid.custom_theme(&theme.id).is_none() {
                kid.custom_themes.push(theme);
            }
        }
        self.store.set_kids(kids);
        Ok(())
    }

    /// Deletes a kid together with its transactions and requests.
    pub async fn delete_kid(&self, kid_id: &str) -> ClientResult<()> {
        self.require_user()?;
        let by_kid = || Filter::KidId(kid_id.to_string());
        self.gateway
            .mutate(vec![
                Mutation::Delete {
                    collection: Collection::Kids,
                    id: kid_id.to_string(),
                },
                Mutation::DeleteWhere {
                    collection: Collection::Transactions,
                    filter: by_kid(),
                },
                Mutation::DeleteWhere {
                    collection: Collection::DepositRequests,
                    filter: by_kid(),
                },
            ])
            .await?;
        info!(kid_id, "Kid deleted");
        self.store.remove_kid(kid_id);
        Ok(())
    }

    // =========================================================================
    // Money
    // =========================================================================

    /// Credits a kid's account.
    ///
    /// ## Batch
    /// ```text
    /// [ IncrementBalance { kid, +amount },
    ///   Insert(Transaction { kind, amount, requested_by: parent }) ]
    /// ```
    pub async fn add_money(
        &self,
        kid_id: &str,
        amount: Money,
        description: &str,
        kind: TransactionType,
    ) -> ClientResult<Transaction> {
        if !kind.is_credit() {
            return Err(ClientError::validation(format!("{} cannot add money", kind.label())));
        }
        self.move_money(kid_id, amount, description, kind).await
    }

    /// Debits a kid's account.
    ///
    /// ## Rules
    /// - The balance known to the store must cover `amount`
    ///   (`InsufficientFunds` otherwise)
    pub async fn remove_money(
        &self,
        kid_id: &str,
        amount: Money,
        description: &str,
        kind: TransactionType,
    ) -> ClientResult<Transaction> {
        if kind.is_credit() {
            return Err(ClientError::validation(format!("{} cannot remove money", kind.label())));
        }
        self.move_money(kid_id, amount, description, kind).await
    }

    async fn move_money(
        &self,
        kid_id: &str,
        amount: Money,
        description: &str,
        kind: TransactionType,
    ) -> ClientResult<Transaction> {
        let user = self.require_user()?;
        check_amount(amount)?;
        let description = describe(description, kind.label())?;
        let kid = self.find_kid(kid_id).await?;

        if !kind.is_credit() && kid.balance < amount {
            return Err(CoreError::InsufficientFunds {
                available: kid.balance,
                requested: amount,
            }
            .into());
        }

        let transaction = Transaction {
            id: new_id(),
            kid_id: kid.id.clone(),
            parent_id: user.id.clone(),
            kind,
            amount,
            description,
            requested_by: RequestedBy::Parent,
            processed_by: Some(user.id),
            created_at: Utc::now(),
        };
        let delta = transaction.signed_amount();

        self.gateway
            .mutate(vec![
                Mutation::IncrementBalance {
                    kid_id: kid.id.clone(),
                    delta,
                },
                Mutation::Insert(Document::Transaction(transaction.clone())),
            ])
            .await?;
        info!(kid_id = %kid.id, kind = %kind, amount = %amount, "Money moved");

        self.refresh_balance(&kid.id).await;
        Ok(transaction)
    }

    // =========================================================================
    // Deposit Requests
    // =========================================================================

    /// Files a request from the kid currently logged in.
    pub async fn create_deposit_request(
        &self,
        amount: Money,
        description: &str,
    ) -> ClientResult<DepositRequest> {
        let user = self.require_user()?;
        let kid = self.store.current_kid().ok_or_else(ClientError::not_in_kid_mode)?;
        check_amount(amount)?;

        let request = DepositRequest {
            id: new_id(),
            kid_id: kid.id,
            kid_name: kid.name,
            kid_avatar: kid.avatar_emoji,
            parent_id: user.id,
            amount,
            description: describe(description, DEFAULT_REQUEST_DESCRIPTION)?,
            status: RequestStatus::Pending,
            parent_note: None,
            created_at: Utc::now(),
            processed_at: None,
        };

        self.gateway
            .mutate(vec![Mutation::Insert(Document::DepositRequest(request.clone()))])
            .await?;
        info!(request_id = %request.id, amount = %amount, "Deposit requested");
        Ok(request)
    }

    /// Approves a pending request and credits the kid.
    ///
    /// ## Batch
    /// ```text
    /// [ ResolveRequest { approved, note },
    ///   IncrementBalance { kid, +amount },
    ///   Insert(Transaction { deposit, requested_by: kid }) ]
    /// ```
    pub async fn approve_request(&self, request_id: &str, note: &str) -> ClientResult<()> {
        let user = self.require_user()?;
        let request = self.pending_request(request_id).await?;
        let now = Utc::now();

        let transaction = Transaction {
            id: new_id(),
            kid_id: request.kid_id.clone(),
            parent_id: user.id.clone(),
            kind: TransactionType::Deposit,
            amount: request.amount,
            description: request.description.clone(),
            requested_by: RequestedBy::Kid,
            processed_by: Some(user.id),
            created_at: now,
        };

        self.gateway
            .mutate(vec![
                Mutation::ResolveRequest {
                    request_id: request.id.clone(),
                    status: RequestStatus::Approved,
                    note: note_or_none(note),
                    processed_at: now,
                },
                Mutation::IncrementBalance {
                    kid_id: request.kid_id.clone(),
                    delta: request.amount,
                },
                Mutation::Insert(Document::Transaction(transaction)),
            ])
            .await?;
        info!(request_id, amount = %request.amount, "Request approved");

        self.store.remove_request(request_id);
        self.refresh_balance(&request.kid_id).await;
        Ok(())
    }

    pub async fn deny_request(&self, request_id: &str, note: &str) -> ClientResult<()> {
        self.require_user()?;
        let request = self.pending_request(request_id).await?;
        self.gateway
            .mutate(vec![Mutation::ResolveRequest {
                request_id: request.id,
                status: RequestStatus::Denied,
                note: note_or_none(note),
                processed_at: Utc::now(),
            }])
            .await?;
        info!(request_id, "Request denied");
        self.store.remove_request(request_id);
        Ok(())
    }

    async fn pending_request(&self, request_id: &str) -> ClientResult<DepositRequest> {
        let request = self
            .gateway
            .get_document(Collection::DepositRequests, request_id)
            .await?
            .and_then(Document::into_request)
            .ok_or_else(|| CoreError::RequestNotFound(request_id.to_string()))?;

        if request.status != RequestStatus::Pending {
            return Err(CoreError::RequestAlreadyResolved {
                request_id: request_id.to_string(),
                status: request.status.to_string(),
            }
            .into());
        }
        Ok(request)
    }
}

fn note_or_none(note: &str) -> Option<String> {
    let note = note.trim();
    (!note.is_empty()).then(|| note.to_string())
}

impl fmt::Debug for BankService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BankService").finish_non_exhaustive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::memory::MemoryGateway;
    use async_trait::async_trait;
    use kidbank_core::gateway::{
        GatewayError, GatewayResult, ListenerRegistration, Query, SnapshotListener,
    };

    struct Fixture {
        gateway: Rc<MemoryGateway>,
        store: Store,
        bank: BankService,
    }

    fn fixture() -> Fixture {
        let gateway = Rc::new(MemoryGateway::new());
        let store = Store::new();
        store.set_user(Some(User::new("u1", "a@b.com", None)));
        let bank = BankService::new(gateway.clone(), store.clone());
        Fixture {
            gateway,
            store,
            bank,
        }
    }

    /// Yields once inside every `mutate`, letting other writes interleave.
    struct YieldingGateway {
        inner: Rc<MemoryGateway>,
    }

    #[async_trait(?Send)]
    impl Gateway for YieldingGateway {
        async fn subscribe(
            &self,
            query: Query,
            listener: SnapshotListener,
        ) -> GatewayResult<ListenerRegistration> {
            self.inner.subscribe(query, listener).await
        }

        async fn fetch(&self, query: &Query) -> GatewayResult<Vec<Document>> {
            self.inner.fetch(query).await
        }

        async fn get_document(
            &self,
            collection: Collection,
            id: &str,
        ) -> GatewayResult<Option<Document>> {
            self.inner.get_document(collection, id).await
        }

        async fn mutate(&self, batch: Vec<Mutation>) -> GatewayResult<()> {
            tokio::task::yield_now().await;
            self.inner.mutate(batch).await
        }
    }

    fn yielding_fixture() -> Fixture {
        let gateway = Rc::new(MemoryGateway::new());
        let store = Store::new();
        store.set_user(Some(User::new("u1", "a@b.com", None)));
        let front = Rc::new(YieldingGateway {
            inner: gateway.clone(),
        });
        let bank = BankService::new(front, store.clone());
        Fixture {
            gateway,
            store,
            bank,
        }
    }

    fn new_kid(balance: i64) -> NewKid {
        NewKid {
            name: "Sam".into(),
            pin: "4826".into(),
            avatar_emoji: String::new(),
            initial_balance: Money::from_cents(balance),
        }
    }

    fn stored_kid(f: &Fixture, id: &str) -> Kid {
        f.gateway
            .document(Collection::Kids, id)
            .and_then(Document::into_kid)
            .unwrap()
    }

    #[tokio::test]
    async fn test_requires_sign_in() {
        let f = fixture();
        f.store.set_user(None);
        let err = f.bank.create_kid(new_kid(0)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthenticated);
    }

    #[tokio::test]
    async fn test_create_kid_defaults() {
        let f = fixture();
        let id = f.bank.create_kid(new_kid(500)).await.unwrap();

        let kid = stored_kid(&f, &id);
        assert_eq!(kid.avatar_emoji, DEFAULT_AVATAR);
        assert_eq!(kid.theme, "default");
        assert_eq!(kid.balance.cents(), 500);
        assert_eq!(f.store.kids().len(), 1);
    }

    #[tokio::test]
    async fn test_create_kid_validates() {
        let f = fixture();
        let mut bad = new_kid(0);
        bad.pin = "1234".into();
        let err = f.bank.create_kid(bad).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(f.gateway.count(Collection::Kids), 0);
    }

    #[tokio::test]
    async fn test_add_and_remove_money() {
        let f = fixture();
        let id = f.bank.create_kid(new_kid(1000)).await.unwrap();

        let tx = f
            .bank
            .add_money(&id, Money::from_cents(250), "", TransactionType::Reward)
            .await
            .unwrap();
        assert_eq!(tx.description, "Reward");
        assert_eq!(f.store.kid(&id).unwrap().balance.cents(), 1250);

        f.bank
            .remove_money(&id, Money::from_cents(1250), "Broke a window", TransactionType::Penalty)
            .await
            .unwrap();
        assert_eq!(stored_kid(&f, &id).balance.cents(), 0);
        assert_eq!(f.store.kid(&id).unwrap().balance.cents(), 0);
        assert_eq!(f.gateway.count(Collection::Transactions), 2);
    }

    #[tokio::test]
    async fn test_overlapping_deposits_settle_on_newest_balance() {
        let f = yielding_fixture();
        let id = f.bank.create_kid(new_kid(1000)).await.unwrap();
        let five = Money::from_cents(500);

        let (first, second) = tokio::join!(
            f.bank.add_money(&id, five, "", TransactionType::Deposit),
            f.bank.add_money(&id, five, "", TransactionType::Deposit),
        );
        first.unwrap();
        second.unwrap();

        assert_eq!(stored_kid(&f, &id).balance.cents(), 2000);
        assert_eq!(f.store.kid(&id).unwrap().balance.cents(), 2000);
    }

    #[tokio::test]
    async fn test_live_snapshot_is_not_counted_twice() {
        let f = fixture();
        let id = f.bank.create_kid(new_kid(1000)).await.unwrap();
        let store = f.store.clone();
        let _registration = f
            .gateway
            .subscribe(
                Query::kids_of("u1"),
                SnapshotListener::new(
                    move |docs| {
                        store.set_kids(docs.into_iter().filter_map(Document::into_kid).collect());
                    },
                    |_| {},
                ),
            )
            .await
            .unwrap();

        f.bank
            .add_money(&id, Money::from_cents(500), "", TransactionType::Reward)
            .await
            .unwrap();
        assert_eq!(f.store.kid(&id).unwrap().balance.cents(), 1500);
    }

    #[tokio::test]
    async fn test_remove_money_needs_funds() {
        let f = fixture();
        let id = f.bank.create_kid(new_kid(300)).await.unwrap();
        let err = f
            .bank
            .remove_money(&id, Money::from_cents(500), "", TransactionType::Withdrawal)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientFunds);
        assert_eq!(err.message, "Insufficient balance");
        assert_eq!(f.gateway.count(Collection::Transactions), 0);
    }

    #[tokio::test]
    async fn test_wrong_direction_is_rejected() {
        let f = fixture();
        let id = f.bank.create_kid(new_kid(300)).await.unwrap();
        assert!(f
            .bank
            .add_money(&id, Money::from_cents(100), "", TransactionType::Penalty)
            .await
            .is_err());
        assert!(f
            .bank
            .add_money(&id, Money::zero(), "", TransactionType::Deposit)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_store_untouched() {
        let f = fixture();
        let id = f.bank.create_kid(new_kid(300)).await.unwrap();
        f.gateway
            .fail_next_mutation(GatewayError::Unavailable("offline".into()));

        let err = f
            .bank
            .add_money(&id, Money::from_cents(100), "", TransactionType::Deposit)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::GatewayError);
        assert_eq!(f.store.kid(&id).unwrap().balance.cents(), 300);
    }

    #[tokio::test]
    async fn test_request_lifecycle() {
        let f = fixture();
        let id = f.bank.create_kid(new_kid(100)).await.unwrap();
        let kid = f.store.kid(&id).unwrap();

        let err = f
            .bank
            .create_deposit_request(Money::from_cents(300), "")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotInKidMode);

        f.store.enter_kid_mode(kid);
        let request = f
            .bank
            .create_deposit_request(Money::from_cents(300), "")
            .await
            .unwrap();
        assert_eq!(request.description, DEFAULT_REQUEST_DESCRIPTION);
        f.store.exit_kid_mode();
        f.store.set_pending_requests(vec![request.clone()]);

        f.bank.approve_request(&request.id, "  ").await.unwrap();
        assert_eq!(f.store.pending_count(), 0);
        assert_eq!(f.store.kid(&id).unwrap().balance.cents(), 400);
        assert_eq!(stored_kid(&f, &id).balance.cents(), 400);

        let err = f.bank.deny_request(&request.id, "").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_delete_kid_cascades() {
        let f = fixture();
        let id = f.bank.create_kid(new_kid(100)).await.unwrap();
        f.bank
            .add_money(&id, Money::from_cents(100), "", TransactionType::Deposit)
            .await
            .unwrap();

        f.bank.delete_kid(&id).await.unwrap();
        assert_eq!(f.gateway.count(Collection::Kids), 0);
        assert_eq!(f.gateway.count(Collection::Transactions), 0);
        assert!(f.store.kids().is_empty());
    }

    #[tokio::test]
    async fn test_save_custom_theme_updates_store() {
        let f = fixture();
        let id = f.bank.create_kid(new_kid(0)).await.unwrap();
        let theme = CustomTheme {
            id: "custom-1".into(),
            name: "Red Rocket".into(),
            colors: Default::default(),
            created_at: Utc::now(),
        };
        f.bank.save_custom_theme(&id, theme).await.unwrap();
        f.bank.save_kid_theme(&id, "custom-1").await.unwrap();

        let kid = f.store.kid(&id).unwrap();
        assert_eq!(kid.theme, "custom-1");
        assert!(kid.custom_theme("custom-1").is_some());
        assert_eq!(stored_kid(&f, &id).custom_themes.len(), 1);
    }
}
