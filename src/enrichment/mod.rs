//! Status enrichment for parsed accounts
//!
//! Workers only depend on the [`EnrichmentPort`] trait. The HTTP
//! implementation talking to the account service lives in `client`.

mod client;

pub use client::StatusClient;

use thiserror::Error;
use tracing::debug;

use crate::account::{Account, AccountStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnrichError {
    /// The account cannot be looked up, or the service answered without data
    #[error("{0}")]
    InvalidInput(String),

    /// Transport failure or a non-2xx response
    #[error("{0}")]
    RemoteFailure(String),
}

/// Capability for looking up the remote status of one account.
///
/// Implementations are shared by every worker thread. Retries, if any,
/// belong inside the implementation.
pub trait EnrichmentPort: Send + Sync {
    fn enrich(&self, account: &Account) -> Result<AccountStatus, EnrichError>;
}

impl<F> EnrichmentPort for F
where
    F: Fn(&Account) -> Result<AccountStatus, EnrichError> + Send + Sync,
{
    fn enrich(&self, account: &Account) -> Result<AccountStatus, EnrichError> {
        self(account)
    }
}

/// Run one account through the port.
///
/// Accounts without a positive id are not sent. Any failure is recorded in
/// the account's diagnostic; the original fields are left untouched.
/// Returns whether the lookup succeeded.
pub fn enrich_account(port: &dyn EnrichmentPort, account: &mut Account) -> bool {
    if !account.has_valid_id() {
        let raw_id = account.id.map(|id| id.to_string()).unwrap_or_default();
        account.set_diagnostic(Account::invalid_id_message(&raw_id));
        return false;
    }

    match port.enrich(account) {
        Ok(status) => {
            account.apply_status(status);
            true
        }
        Err(err) => {
            debug!(id = ?account.id, error = %err, "enrichment failed");
            account.set_diagnostic(err.to_string());
            false
        }
    }
}
