//! HTML reply texts

use teloxide::utils::html::escape;

use crate::core::config::referral::REWARD;
use crate::core::error::AppError;
use crate::storage::{User, UserStats};

pub const HELP: &str = "<b>🤖 Bot Commands</b>
Here are the commands you can use:

<b>🔹 General Commands</b>
/start - 🚀 Start the bot
/help - 📖 Show this help message
/info - ℹ️ Show your user info
/accno - 🆔 Set or update account number

<b>🔸 Owner Commands</b>
/add - ➕ Add balance
/remove - ➖ Remove balance
/stats - 📊 Show bot statistics
/broadcast - 📢 Broadcast a message to all users

⚠️ <i>Note: Owner commands are restricted to the bot owner only.</i>";

pub const UNAUTHORIZED: &str = "❌ You are not authorized to use this command.";
pub const TRY_AGAIN: &str = "❌ An error occurred. Please try again later.\n/start";
pub const INVALID_CALLBACK: &str = "❌ Invalid callback data.";
pub const USER_NOT_FOUND_ALERT: &str = "❌ User not found.";
pub const USER_NOT_FOUND_EDIT: &str = "❌ <b>User not found.</b>";
pub const INFO_LOADED: &str = "ℹ️ User information loaded successfully.";
pub const WALLET_LOADED: &str = "Wallet information loaded.";
pub const INVALID_REFERRAL_CODE: &str = "❌ <b>Invalid referral code!</b>\n\nPlease check the code and try again.";
pub const UNKNOWN_REFERRAL_CODE: &str =
    "❌ <b>The referral code is not valid.</b>\n\nPlease check with the person who referred you.";
pub const BROADCAST_NEEDS_REPLY: &str = "❌ <b>Reply to a message to broadcast</b>";
pub const BROADCAST_STARTED: &str = "📢 <b>Broadcast started.</b>\n\nYou will get a report when it finishes.";
pub const BROADCAST_RUNNING: &str = "⏳ A broadcast is already running. Wait for its report first.";

pub fn usage(command: &str, args: &str) -> String {
    format!(
        "❌ Invalid arguments.\n\nUsage: <code>/{} {}</code>",
        command,
        escape(args)
    )
}

pub fn welcome_back(name: &str, user: &User) -> String {
    format!(
        "👋 <b>Welcome back, {}!</b>\n\n\
         💰 <b>Balance:</b> {:.2}\n\
         🤝 <b>Referred Users:</b> {}\n\n\
         🚀 Keep earning rewards by referring your friends!",
        escape(name),
        user.balance,
        user.referral_count()
    )
}

pub fn welcome_new(name: &str, user: &User) -> String {
    format!(
        "🎉 <b>Welcome to the Refer &amp; Earn Bot, {}!</b>\n\n\
         💰 <b>Balance:</b> {:.2}\n\
         🤝 <b>Referred Users:</b> {}\n\n\
         🔗 Use your referral link to invite friends and earn rewards!",
        escape(name),
        user.balance,
        user.referral_count()
    )
}

/// Sent to the referrer when someone joins with their code.
pub fn referral_success(referee_name: &str, referee_id: i64) -> String {
    format!(
        "🎉 <b>Referral Successful!</b>\n\n\
         👤 You referred <b>{}</b> ({}) successfully!\n\
         💵 You’ve earned <b>{:.2} DOGS tokens</b>! Keep sharing and earning more! 🚀",
        escape(referee_name),
        referee_id,
        REWARD
    )
}

pub fn user_info(user: &User) -> String {
    format!(
        "👤 <b>User Information</b>\n\n\
         🔹 <b>User ID:</b> {}\n\
         🔗 <b>Referrer ID:</b> {}\n\
         🤝 <b>Referred Users:</b> {}\n\
         💰 <b>Account Balance:</b> {:.2}",
        user.id,
        user.referred_by.unwrap_or(0),
        user.referral_count(),
        user.balance
    )
}

pub fn wallet_info(user: &User) -> String {
    let account = user
        .account_number
        .map(|n| n.to_string())
        .unwrap_or_else(|| "not set, use /accno".to_string());
    format!(
        "💰 <b>Wallet Information</b>\n\n\
         🔹 <b>User ID:</b> {}\n\
         🔗 <b>Referrer ID:</b> {}\n\
         🤝 <b>Referred Users:</b> {}\n\
         🏦 <b>Account Number:</b> {}\n\
         💵 <b>Account Balance:</b> {:.2}",
        user.id,
        user.referred_by.unwrap_or(0),
        user.referral_count(),
        account,
        user.balance
    )
}

pub fn balance_added(user_id: i64, amount: f64, balance: f64) -> String {
    format!(
        "✅ Successfully updated balance for user <b>{}</b>.\n\n\
         🔹 <b>Amount Added:</b> {:.2}\n\
         💵 <b>New Balance:</b> {:.2}",
        user_id, amount, balance
    )
}

pub fn balance_removed(user_id: i64, amount: f64, balance: f64) -> String {
    format!(
        "✅ Successfully updated balance for user <b>{}</b>.\n\n\
         🔹 <b>Amount Deducted:</b> {:.2}\n\
         💵 <b>New Balance:</b> {:.2}",
        user_id, amount, balance
    )
}

pub fn account_updated(user_id: i64, account_number: i64) -> String {
    format!(
        "✅ Account number successfully updated for user <b>{}</b>.\n\n\
         🔹 <b>New Account Number:</b> {}",
        user_id, account_number
    )
}

pub fn stats(stats: &UserStats) -> String {
    format!(
        "📊 <b>Bot Statistics</b>\n\n\
         👥 <b>Total Users:</b> {}\n\
         🤝 <b>Referred Users:</b> {}\n\
         💰 <b>Outstanding Balance:</b> {:.2}",
        stats.total_users, stats.referred_users, stats.total_balance
    )
}

pub fn broadcast_report(delivered: u64, failed: u64, cancelled: bool) -> String {
    if cancelled {
        format!(
            "⚠️ <b>Broadcast cancelled</b>\n\nDelivered to {} users before stopping, {} failed.",
            delivered, failed
        )
    } else {
        format!(
            "✅ <b>Broadcast successfully to {} users</b>\n\nFailed: {}",
            delivered, failed
        )
    }
}

pub fn withdraw_requested(balance: f64) -> String {
    format!("✅ Withdrawal request for {:.2} sent to the owner.", balance)
}

pub const WITHDRAW_NOT_OWN: &str = "❌ You can only withdraw from your own wallet.";
pub const WITHDRAW_NO_ACCOUNT: &str = "❌ Set your account number first with /accno.";
pub const WITHDRAW_EMPTY: &str = "❌ Your balance is empty.";

/// Logger chat notices
pub fn log_new_user(name: &str, user_id: i64) -> String {
    format!(
        "#NEW_USER\n\n👤 <b>Name:</b> {}\n🔹 <b>User ID:</b> <code>{}</code>",
        escape(name),
        user_id
    )
}

pub fn log_referral(name: &str, user_id: i64, referrer_id: i64) -> String {
    format!(
        concat!(
            "#NEW_REFERRAL\n\n👤 <b>Name:</b> {}\n🔹 <b>User ID:</b> <code>{}</code>\n",
            "🔗 <b>Referrer ID:</b> <code>{}</code>"
        ),
        escape(name),
        user_id,
        referrer_id
    )
}

pub fn log_withdrawal(user: &User) -> String {
    format!(
        concat!(
            "#WITHDRAW\n\n🔹 <b>User ID:</b> <code>{}</code>\n",
            "🏦 <b>Account Number:</b> <code>{}</code>\n💵 <b>Amount:</b> {:.2}"
        ),
        user.id,
        user.account_number.unwrap_or(0),
        user.balance
    )
}

/// Reply text for a failed command.
pub fn error_text(err: &AppError) -> String {
    match err {
        AppError::NotFound(_) => "❌ <b>User not found.</b>\n\nPlease check the User ID and try again.".to_string(),
        AppError::AlreadyRegistered(_) => "ℹ️ You are already registered.".to_string(),
        AppError::SelfReferral => "❌ <b>You cannot use your own referral code.</b>".to_string(),
        AppError::AlreadyReferred(_) => "❌ <b>You have already been referred.</b>".to_string(),
        AppError::InvalidInput(msg) => format!("❌ Invalid input: {}", escape(msg)),
        AppError::InvalidAmount(_) => {
            "❌ Invalid amount. Please enter a positive number with at most two decimals.".to_string()
        },
        AppError::Unauthorized(_) => UNAUTHORIZED.to_string(),
        AppError::BroadcastInProgress => BROADCAST_RUNNING.to_string(),
        AppError::Transport(_) | AppError::StoreUnavailable(_) | AppError::Config(_) => TRY_AGAIN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balances_render_with_two_decimals() {
        let user = User {
            id: 5,
            referred_by: Some(2),
            referred_to: vec![6, 7],
            account_number: None,
            balance: 10.0,
        };

        let text = user_info(&user);
        assert!(text.contains("<b>Referrer ID:</b> 2"));
        assert!(text.contains("<b>Referred Users:</b> 2"));
        assert!(text.contains("10.00"));
        assert!(wallet_info(&user).contains("not set"));
    }

    #[test]
    fn test_names_are_escaped() {
        let text = welcome_new("<script>", &User::new(1));
        assert!(text.contains("&lt;script&gt;"));
        assert!(!text.contains("<script>"));
    }

    #[test]
    fn test_store_failures_hide_details() {
        let text = error_text(&AppError::StoreUnavailable("disk I/O error".into()));
        assert_eq!(text, TRY_AGAIN);
    }
}
