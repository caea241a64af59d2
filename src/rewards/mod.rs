//! Reward accounting: balances, account numbers and referral linking

pub mod ledger;
pub mod referral;

pub use ledger::BalanceLedger;
pub use referral::{ReferralEngine, ReferralOutcome};
