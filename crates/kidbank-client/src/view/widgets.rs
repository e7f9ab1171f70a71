//! Line builders shared by screens.

use chrono::{DateTime, Utc};
use kidbank_core::{DepositRequest, Kid, Money, Transaction};

use crate::theme::Palette;

/// "Just now", "5 minutes ago", "Yesterday", "3 weeks ago", …
pub fn format_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - at).num_seconds().max(0);
    if seconds < 60 {
        return "Just now".to_string();
    }

    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    };

    let minutes = seconds / 60;
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }
    let days = hours / 24;
    if days < 7 {
        return if days == 1 {
            "Yesterday".to_string()
        } else {
            format!("{days} days ago")
        };
    }
    let weeks = days / 7;
    if weeks < 4 {
        return plural(weeks, "week");
    }
    let months = days / 30;
    if months < 12 {
        return plural(months.max(1), "month");
    }
    plural(days / 365, "year")
}

pub fn heading(title: &str) -> Vec<String> {
    vec![title.to_string(), "=".repeat(title.chars().count())]
}

pub fn balance(label: &str, amount: Money) -> String {
    format!("{label}: {amount}")
}

pub fn kid_row(kid: &Kid) -> String {
    format!("{} {}  {}  [{}]", kid.avatar_emoji, kid.name, kid.balance, kid.id)
}

pub fn transaction_row(tx: &Transaction, now: DateTime<Utc>) -> String {
    let icon = if tx.kind.is_credit() { "↑" } else { "↓" };
    format!(
        "{icon} {:<24} {:>10}  {}",
        tx.description,
        tx.signed_amount().signed().to_string(),
        format_relative(tx.created_at, now)
    )
}

/// Newest first, at most `limit`; an empty-state line otherwise.
pub fn transaction_list(transactions: &[Transaction], limit: usize, now: DateTime<Utc>) -> Vec<String> {
    if transactions.is_empty() {
        return vec![
            "📝 No transactions yet".to_string(),
            "   Transactions will appear here".to_string(),
        ];
    }
    transactions
        .iter()
        .take(limit)
        .map(|tx| transaction_row(tx, now))
        .collect()
}

pub fn request_row(request: &DepositRequest, now: DateTime<Utc>) -> String {
    format!(
        "{} {} asks for {}: \"{}\" ({})  [{}]",
        request.kid_avatar,
        request.kid_name,
        request.amount,
        request.description,
        format_relative(request.created_at, now),
        request.id
    )
}

pub fn palette_line(palette: &Palette) -> String {
    format!(
        "Theme: {} (primary {}, text {})",
        palette.name,
        palette.colors.primary,
        palette.text_on_primary()
    )
}

/// `●●○○` for a PIN pad with two digits entered.
pub fn pin_dots(entered: usize, length: usize) -> String {
    (0..length)
        .map(|i| if i < entered { '●' } else { '○' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_relative_time_buckets() {
        let now = Utc::now();
        let ago = |d: Duration| format_relative(now - d, now);
        assert_eq!(ago(Duration::seconds(10)), "Just now");
        assert_eq!(ago(Duration::minutes(1)), "1 minute ago");
        assert_eq!(ago(Duration::minutes(45)), "45 minutes ago");
        assert_eq!(ago(Duration::hours(3)), "3 hours ago");
        assert_eq!(ago(Duration::days(1)), "Yesterday");
        assert_eq!(ago(Duration::days(16)), "2 weeks ago");
        assert_eq!(ago(Duration::days(65)), "2 months ago");
        assert_eq!(ago(Duration::days(800)), "2 years ago");
        assert_eq!(format_relative(now + Duration::minutes(5), now), "Just now");
    }

    #[test]
    fn test_pin_dots() {
        assert_eq!(pin_dots(0, 4), "○○○○");
        assert_eq!(pin_dots(3, 4), "●●●○");
    }
}
