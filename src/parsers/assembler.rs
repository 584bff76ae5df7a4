use thiserror::Error;

use super::tokenizer::{scrub, tokenize, DELIMITER};
use crate::account::Account;

/// Lowercased prefix identifying the inbound header row
pub const INBOUND_HEADER_PREFIX: &str = "account id,account name,first name,created on";

/// Positional columns required to build an account
const REQUIRED_FIELDS: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The row cannot become an account at all and is dropped
    #[error("Malformed line: {reason}")]
    MalformedLine { reason: String },

    /// The row has all columns but the id is not a number. The partially
    /// assembled account is kept so it can still reach the output.
    #[error("{}", Account::invalid_id_message(.raw))]
    InvalidIdentifier { raw: String, account: Box<Account> },
}

/// Check whether a raw line is the inbound header row
pub fn is_inbound_header(line: &str) -> bool {
    line.trim().to_lowercase().starts_with(INBOUND_HEADER_PREFIX)
}

/// Build an account from one raw line
pub fn assemble(line: &str) -> Result<Account, ParseError> {
    if !line.contains(DELIMITER) {
        return Err(ParseError::MalformedLine {
            reason: "no delimiter found".to_string(),
        });
    }

    let scrubbed = scrub(line);
    let mut tokens = tokenize(&scrubbed).into_iter();
    let found = tokens.len();
    let (Some(raw_id), Some(name), Some(first_name), Some(created_on)) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(ParseError::MalformedLine {
            reason: format!("expected at least {REQUIRED_FIELDS} fields, found {found}"),
        });
    };

    let parsed = raw_id.trim().parse::<i64>();
    match parsed {
        Ok(id) => Ok(Account::new(Some(id), name, first_name, created_on)),
        Err(_) => Err(ParseError::InvalidIdentifier {
            account: Box::new(Account::new(None, name, first_name, created_on)),
            raw: raw_id,
        }),
    }
}
