//! In-memory identity provider.

use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, info};

use kidbank_core::gateway::ListenerRegistration;
use kidbank_core::identity::{account_id, AuthError, AuthResult, IdentityProvider};
use kidbank_core::User;

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    user: User,
    password: String,
    disabled: bool,
}

type AuthListener = Rc<dyn Fn(Option<User>)>;

/// Accounts keyed by lowercase email.
///
/// User ids are UUIDv5 of the email, so the same address always maps to the
/// same id across runs.
#[derive(Default)]
pub struct MemoryIdentity {
    accounts: RefCell<BTreeMap<String, Account>>,
    current: RefCell<Option<User>>,
    listeners: Rc<RefCell<Vec<(u64, AuthListener)>>>,
    next_listener: Cell<u64>,
    fail_next: RefCell<Option<AuthError>>,
    reset_requests: RefCell<BTreeSet<String>>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        MemoryIdentity::default()
    }

    pub fn user_id_for(email: &str) -> String {
        account_id(email)
    }

    /// Creates an account without signing in.
    pub fn add_account(&self, email: &str, password: &str, display_name: Option<&str>) -> User {
        let key = email.trim().to_lowercase();
        let user = User::new(
            Self::user_id_for(&key),
            key.clone(),
            display_name.map(str::to_string),
        );
        self.accounts.borrow_mut().insert(
            key,
            Account {
                user: user.clone(),
                password: password.to_string(),
                disabled: false,
            },
        );
        user
    }

    pub fn disable_account(&self, email: &str) {
        if let Some(account) = self.accounts.borrow_mut().get_mut(&email.trim().to_lowercase()) {
            account.disabled = true;
        }
    }

    /// Makes the next account operation fail with `err`.
    pub fn fail_next(&self, err: AuthError) {
        *self.fail_next.borrow_mut() = Some(err);
    }

    pub fn has_reset_request(&self, email: &str) -> bool {
        self.reset_requests.borrow().contains(&email.trim().to_lowercase())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn injected_failure(&self) -> AuthResult<()> {
        match self.fail_next.borrow_mut().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn set_current(&self, user: Option<User>) {
        *self.current.borrow_mut() = user.clone();
        let listeners: Vec<AuthListener> =
            self.listeners.borrow().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(user.clone());
        }
    }
}

fn check_email(email: &str) -> AuthResult<String> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail)
    }
}

#[async_trait(?Send)]
impl IdentityProvider for MemoryIdentity {
    fn on_auth_state_changed(&self, callback: Box<dyn Fn(Option<User>)>) -> ListenerRegistration {
        let id = self.next_listener.get() + 1;
        self.next_listener.set(id);
        let callback: AuthListener = Rc::from(callback);
        self.listeners.borrow_mut().push((id, callback.clone()));

        callback(self.current_user());

        let listeners: Weak<RefCell<Vec<(u64, AuthListener)>>> = Rc::downgrade(&self.listeners);
        ListenerRegistration::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.borrow_mut().retain(|(lid, _)| *lid != id);
            }
        })
    }

    fn current_user(&self) -> Option<User> {
        self.current.borrow().clone()
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<User> {
        self.injected_failure()?;
        let email = check_email(email)?;
        let user = {
            let accounts = self.accounts.borrow();
            let account = accounts.get(&email).ok_or(AuthError::UserNotFound)?;
            if account.disabled {
                return Err(AuthError::UserDisabled);
            }
            if account.password != password {
                return Err(AuthError::WrongPassword);
            }
            account.user.clone()
        };
        info!(user_id = %user.id, "Signed in");
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AuthResult<User> {
        self.injected_failure()?;
        let email = check_email(email)?;
        if self.accounts.borrow().contains_key(&email) {
            return Err(AuthError::EmailAlreadyInUse);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        let user = self.add_account(&email, password, display_name);
        info!(user_id = %user.id, "Account created");
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.injected_failure()?;
        if self.current.borrow().is_some() {
            info!("Signed out");
            self.set_current(None);
        }
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> AuthResult<()> {
        self.injected_failure()?;
        let email = check_email(email)?;
        if !self.accounts.borrow().contains_key(&email) {
            return Err(AuthError::UserNotFound);
        }
        debug!(email = %email, "Password reset requested");
        self.reset_requests.borrow_mut().insert(email);
        Ok(())
    }
}

impl fmt::Debug for MemoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryIdentity")
            .field("accounts", &self.accounts.borrow().len())
            .field("current", &self.current.borrow().as_ref().map(|u| u.id.clone()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_checks_password() {
        let identity = MemoryIdentity::new();
        identity.add_account("Parent@Example.com", "secret1", Some("Pat"));

        assert_eq!(
            identity.sign_in("parent@example.com", "nope").await,
            Err(AuthError::WrongPassword)
        );
        assert_eq!(
            identity.sign_in("other@example.com", "secret1").await,
            Err(AuthError::UserNotFound)
        );
        let user = identity.sign_in(" PARENT@example.com ", "secret1").await.unwrap();
        assert_eq!(user.display_name, "Pat");
        assert_eq!(user.id, MemoryIdentity::user_id_for("parent@example.com"));
    }

    #[tokio::test]
    async fn test_auth_listener_fires_immediately_and_on_change() {
        let identity = MemoryIdentity::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let registration = identity.on_auth_state_changed(Box::new(move |user| {
            log.borrow_mut().push(user.map(|u| u.email));
        }));

        identity.sign_up("kid.parent@example.com", "secret1", None).await.unwrap();
        identity.sign_out().await.unwrap();
        registration.cancel();
        identity.sign_in("kid.parent@example.com", "secret1").await.unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![None, Some("kid.parent@example.com".to_string()), None]
        );
        assert_eq!(identity.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_sign_up_rules() {
        let identity = MemoryIdentity::new();
        assert_eq!(
            identity.sign_up("bad-email", "secret1", None).await,
            Err(AuthError::InvalidEmail)
        );
        assert_eq!(
            identity.sign_up("a@b.com", "123", None).await,
            Err(AuthError::WeakPassword)
        );
        identity.sign_up("a@b.com", "secret1", None).await.unwrap();
        assert_eq!(
            identity.sign_up("A@B.com", "secret1", None).await,
            Err(AuthError::EmailAlreadyInUse)
        );
    }

    #[tokio::test]
    async fn test_disabled_and_injected_failures() {
        let identity = MemoryIdentity::new();
        identity.add_account("a@b.com", "secret1", None);
        identity.disable_account("a@b.com");
        assert_eq!(
            identity.sign_in("a@b.com", "secret1").await,
            Err(AuthError::UserDisabled)
        );

        identity.fail_next(AuthError::NetworkRequestFailed);
        assert_eq!(
            identity.reset_password("a@b.com").await,
            Err(AuthError::NetworkRequestFailed)
        );
        identity.reset_password("a@b.com").await.unwrap();
        assert!(identity.has_reset_request("A@b.com"));
    }
}
