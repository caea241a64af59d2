//! Referral registration.
//!
//! A referral touches two records: the referee is created with its referrer
//! set, then the referrer gains the referee in its referral set and is
//! credited. Creating the referee is the single-writer gate: a concurrent or
//! repeated start for the same referee fails there with `AlreadyRegistered`,
//! so the referrer is never credited twice.

use std::sync::Arc;

use crate::core::config::referral::REWARD;
use crate::core::error::{AppError, AppResult};
use crate::rewards::ledger::BalanceLedger;
use crate::storage::{StoreError, User, UserStore};

/// Result of a committed referral.
///
/// The referee record always exists once this is returned; `linked` and
/// `credited` report whether the follow-up writes on the referrer succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferralOutcome {
    pub referee: User,
    pub linked: bool,
    pub credited: bool,
    /// Referrer balance after the credit, when it succeeded
    pub referrer_balance: Option<f64>,
}

#[derive(Clone)]
pub struct ReferralEngine {
    store: Arc<dyn UserStore>,
    ledger: BalanceLedger,
}

impl ReferralEngine {
    pub fn new(store: Arc<dyn UserStore>, ledger: BalanceLedger) -> Self {
        Self { store, ledger }
    }

    /// Registers `id` without a referrer.
    pub async fn register_user(&self, id: i64) -> AppResult<User> {
        let user = User::new(id);
        self.store.create(&user).await?;
        log::info!("Registered user {}", id);
        Ok(user)
    }

    /// Registers `referee_id` as referred by `referrer_id` and rewards the referrer.
    ///
    /// # Errors
    /// Checked in this order:
    /// * `AlreadyRegistered` - the referee already has a record
    /// * `NotFound` - the referrer does not exist
    /// * `SelfReferral` - both ids are equal
    /// * `AlreadyReferred` - some user already lists the referee
    pub async fn register_referral(&self, referrer_id: i64, referee_id: i64) -> AppResult<ReferralOutcome> {
        if self.store.exists(referee_id).await? {
            return Err(AppError::AlreadyRegistered(referee_id));
        }
        if !self.store.exists(referrer_id).await? {
            return Err(AppError::NotFound(referrer_id));
        }
        if referrer_id == referee_id {
            return Err(AppError::SelfReferral);
        }
        if self.store.is_referred_by_anyone(referee_id).await? {
            return Err(AppError::AlreadyReferred(referee_id));
        }

        let referee = User::referred(referee_id, referrer_id);
        match self.store.create(&referee).await {
            Ok(_) => {}
            Err(StoreError::Duplicate(_)) => {
                log::warn!("User {} was registered concurrently, referral dropped", referee_id);
                return Err(AppError::AlreadyRegistered(referee_id));
            }
            Err(e) => return Err(e.into()),
        }

        let linked = match self.store.add_referred_user(referrer_id, referee_id).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to link referee {} to referrer {}: {}", referee_id, referrer_id, e);
                false
            }
        };

        let referrer_balance = match self.ledger.credit(referrer_id, REWARD).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                log::error!("Failed to credit referrer {}: {}", referrer_id, e);
                None
            }
        };

        log::info!("User {} joined through referrer {}", referee_id, referrer_id);
        Ok(ReferralOutcome {
            referee,
            linked,
            credited: referrer_balance.is_some(),
            referrer_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_store;
    use crate::storage::SqliteUserStore;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn engine() -> (TempDir, Arc<SqliteUserStore>, ReferralEngine) {
        let (dir, store) = temp_store();
        let ledger = BalanceLedger::new(store.clone());
        let engine = ReferralEngine::new(store.clone(), ledger);
        (dir, store, engine)
    }

    #[tokio::test]
    async fn test_valid_referral_links_and_credits() {
        let (_dir, store, engine) = engine();
        engine.register_user(100).await.unwrap();

        let outcome = engine.register_referral(100, 200).await.unwrap();

        assert!(outcome.linked);
        assert!(outcome.credited);
        assert_eq!(outcome.referrer_balance, Some(10.0));
        assert_eq!(store.get_by_id(200).await.unwrap().referred_by, Some(100));
        let referrer = store.get_by_id(100).await.unwrap();
        assert_eq!(referrer.referred_to, vec![200]);
        assert_eq!(referrer.balance, 10.0);
    }

    #[tokio::test]
    async fn test_self_referral_changes_nothing() {
        let (_dir, store, engine) = engine();
        engine.register_user(100).await.unwrap();

        // An existing user is already registered; a new one has no record to refer them yet.
        assert!(matches!(
            engine.register_referral(100, 100).await,
            Err(AppError::AlreadyRegistered(100))
        ));
        assert!(matches!(engine.register_referral(5, 5).await, Err(AppError::NotFound(5))));
        assert!(!store.exists(5).await.unwrap());
        assert_eq!(store.get_by_id(100).await.unwrap(), User::new(100));
    }

    #[tokio::test]
    async fn test_unknown_referrer_creates_nothing() {
        let (_dir, store, engine) = engine();

        assert!(matches!(engine.register_referral(100, 200).await, Err(AppError::NotFound(100))));
        assert!(!store.exists(200).await.unwrap());
    }

    #[tokio::test]
    async fn test_existing_referee_is_rejected() {
        let (_dir, store, engine) = engine();
        engine.register_user(100).await.unwrap();
        engine.register_user(200).await.unwrap();

        assert!(matches!(
            engine.register_referral(100, 200).await,
            Err(AppError::AlreadyRegistered(200))
        ));
        assert_eq!(store.get_by_id(100).await.unwrap().balance, 0.0);
        assert_eq!(store.get_by_id(200).await.unwrap().referred_by, None);
    }

    #[tokio::test]
    async fn test_deleted_referee_cannot_be_referred_again() {
        let (_dir, store, engine) = engine();
        engine.register_user(100).await.unwrap();
        engine.register_user(300).await.unwrap();
        engine.register_referral(100, 200).await.unwrap();
        store.delete_by_id(200).await.unwrap();

        assert!(matches!(
            engine.register_referral(300, 200).await,
            Err(AppError::AlreadyReferred(200))
        ));
        assert_eq!(store.get_by_id(300).await.unwrap().balance, 0.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_referrals_credit_once() {
        let (_dir, store, engine) = engine();
        engine.register_user(100).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.register_referral(100, 200).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AppError::AlreadyRegistered(200)) | Err(AppError::AlreadyReferred(200)) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(successes, 1);
        let referrer = store.get_by_id(100).await.unwrap();
        assert_eq!(referrer.balance, 10.0);
        assert_eq!(referrer.referred_to, vec![200]);
    }
}
