// Output row formatting for enriched accounts

use crate::account::Account;
use crate::parsers::{is_line_break, DELIMITER};

/// Header written once at the top of every output file
pub const OUTBOUND_HEADER: &str = "Account ID,First Name,Created On,Status,Status Set On";

/// Format one account as an output row.
///
/// Absent values become empty columns. The diagnostic is appended as a
/// sixth column only when it is non-empty, so clean rows always have five.
/// Line breaks are removed from the diagnostic so every account stays on
/// one output line.
pub fn format_account(account: &Account) -> String {
    let mut row = String::with_capacity(64);

    if let Some(id) = account.id {
        row.push_str(&id.to_string());
    }
    row.push(DELIMITER);
    row.push_str(&account.first_name);
    row.push(DELIMITER);
    row.push_str(&account.created_on);
    row.push(DELIMITER);
    row.push_str(account.status.as_deref().unwrap_or_default());
    row.push(DELIMITER);
    row.push_str(account.status_set_on.as_deref().unwrap_or_default());

    if let Some(diagnostic) = account.diagnostic.as_deref().filter(|d| !d.is_empty()) {
        row.push(DELIMITER);
        row.extend(diagnostic.chars().filter(|c| !is_line_break(*c)));
    }

    row
}
