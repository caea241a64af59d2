use std::sync::Arc;

use crate::core::error::{AppError, AppResult};
use crate::storage::UserStore;

/// Balance and account-number mutations.
///
/// Every change is delegated to a single atomic store statement; the ledger
/// only validates input. Balances are rounded to cents and never go below zero.
#[derive(Clone)]
pub struct BalanceLedger {
    store: Arc<dyn UserStore>,
}

impl BalanceLedger {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Adds `amount` to the user's balance and returns the new balance.
    ///
    /// # Errors
    /// `InvalidAmount` for non-positive, non-finite or sub-cent amounts, `NotFound` for unknown users.
    pub async fn credit(&self, user_id: i64, amount: f64) -> AppResult<f64> {
        validate_amount(amount)?;
        let balance = self.store.adjust_balance(user_id, amount).await?;
        log::info!("Credited {:.2} to user {}, balance {:.2}", amount, user_id, balance);
        Ok(balance)
    }

    /// Subtracts `amount`, clamping at zero, and returns the new balance.
    pub async fn debit(&self, user_id: i64, amount: f64) -> AppResult<f64> {
        validate_amount(amount)?;
        let balance = self.store.adjust_balance(user_id, -amount).await?;
        log::info!("Debited {:.2} from user {}, balance {:.2}", amount, user_id, balance);
        Ok(balance)
    }

    pub async fn set_account_number(&self, user_id: i64, account_number: i64) -> AppResult<()> {
        if account_number <= 0 {
            return Err(AppError::InvalidInput(format!(
                "account number must be positive: {}",
                account_number
            )));
        }
        self.store.update_account_number(user_id, account_number).await?;
        Ok(())
    }
}

/// Amounts must be finite, positive and in whole cents.
pub fn validate_amount(amount: f64) -> AppResult<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::InvalidAmount(amount));
    }
    let cents = amount * 100.0;
    if (cents - cents.round()).abs() > CENT_TOLERANCE {
        return Err(AppError::InvalidAmount(amount));
    }
    Ok(())
}

const CENT_TOLERANCE: f64 = 1e-6;

/// Parses a user-supplied amount such as `"12.5"`.
pub fn parse_amount(raw: &str) -> AppResult<f64> {
    let amount = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| AppError::InvalidInput(format!("not a number: {}", raw)))?;
    validate_amount(amount)?;
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_store;
    use crate::storage::User;

    async fn ledger_with_user(id: i64) -> (tempfile::TempDir, Arc<crate::storage::SqliteUserStore>, BalanceLedger) {
        let (dir, store) = temp_store();
        store.create(&User::new(id)).await.unwrap();
        let ledger = BalanceLedger::new(store.clone());
        (dir, store, ledger)
    }

    #[tokio::test]
    async fn test_credit_then_debit() {
        let (_dir, store, ledger) = ledger_with_user(1).await;

        assert_eq!(ledger.credit(1, 10.0).await.unwrap(), 10.0);
        assert_eq!(ledger.debit(1, 2.5).await.unwrap(), 7.5);
        assert_eq!(store.get_by_id(1).await.unwrap().balance, 7.5);
    }

    #[tokio::test]
    async fn test_debit_beyond_balance_clamps_to_zero() {
        let (_dir, store, ledger) = ledger_with_user(1).await;
        ledger.credit(1, 5.0).await.unwrap();

        assert_eq!(ledger.debit(1, 7.0).await.unwrap(), 0.0);
        assert_eq!(store.get_by_id(1).await.unwrap().balance, 0.0);
    }

    #[tokio::test]
    async fn test_non_positive_amounts_leave_balance_untouched() {
        let (_dir, store, ledger) = ledger_with_user(1).await;
        ledger.credit(1, 3.0).await.unwrap();

        for amount in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(ledger.credit(1, amount).await, Err(AppError::InvalidAmount(_))));
            assert!(matches!(ledger.debit(1, amount).await, Err(AppError::InvalidAmount(_))));
        }
        assert_eq!(store.get_by_id(1).await.unwrap().balance, 3.0);
    }

    #[tokio::test]
    async fn test_sub_cent_amounts_are_rejected() {
        let (_dir, store, ledger) = ledger_with_user(1).await;
        ledger.credit(1, 1.0).await.unwrap();

        for amount in [0.004, 0.001, 1.005, 12.345] {
            assert!(matches!(ledger.credit(1, amount).await, Err(AppError::InvalidAmount(_))));
            assert!(matches!(ledger.debit(1, amount).await, Err(AppError::InvalidAmount(_))));
        }
        assert_eq!(store.get_by_id(1).await.unwrap().balance, 1.0);

        assert_eq!(ledger.credit(1, 0.01).await.unwrap(), 1.01);
        assert_eq!(ledger.debit(1, 0.1).await.unwrap(), 0.91);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let (_dir, _store, ledger) = ledger_with_user(1).await;

        assert!(matches!(ledger.credit(2, 1.0).await, Err(AppError::NotFound(2))));
        assert!(matches!(ledger.set_account_number(2, 9).await, Err(AppError::NotFound(2))));
    }

    #[tokio::test]
    async fn test_account_number_must_be_positive() {
        let (_dir, store, ledger) = ledger_with_user(1).await;

        assert!(matches!(ledger.set_account_number(1, 0).await, Err(AppError::InvalidInput(_))));
        ledger.set_account_number(1, 123456).await.unwrap();
        ledger.set_account_number(1, 654321).await.unwrap();
        assert_eq!(store.get_by_id(1).await.unwrap().account_number, Some(654321));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 12.5 ").unwrap(), 12.5);
        assert!(matches!(parse_amount("abc"), Err(AppError::InvalidInput(_))));
        assert!(matches!(parse_amount("-3"), Err(AppError::InvalidAmount(_))));
        assert!(matches!(parse_amount("inf"), Err(AppError::InvalidAmount(_))));
        assert!(matches!(parse_amount("0.004"), Err(AppError::InvalidAmount(_))));
        assert_eq!(parse_amount("19.99").unwrap(), 19.99);
    }
}
