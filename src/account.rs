/// One account row from the inbound file, optionally enriched with status
/// data from the account service.
///
/// `diagnostic` carries a note about parse or enrichment problems. It is
/// written to the output file as a trailing column and never stops the
/// pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub id: Option<i64>,
    pub name: String,
    pub first_name: String,
    pub created_on: String,
    pub status: Option<String>,
    pub status_set_on: Option<String>,
    pub diagnostic: Option<String>,
}

/// Status fields returned by an enrichment lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountStatus {
    pub status: Option<String>,
    pub status_set_on: Option<String>,
}

impl Account {
    pub fn new(
        id: Option<i64>,
        name: impl Into<String>,
        first_name: impl Into<String>,
        created_on: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            first_name: first_name.into(),
            created_on: created_on.into(),
            ..Default::default()
        }
    }

    /// Only positive ids can be looked up remotely
    pub fn has_valid_id(&self) -> bool {
        matches!(self.id, Some(id) if id >= 1)
    }

    pub fn apply_status(&mut self, status: AccountStatus) {
        if status.status.is_some() {
            self.status = status.status;
        }
        if status.status_set_on.is_some() {
            self.status_set_on = status.status_set_on;
        }
    }

    pub fn set_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostic = Some(message.into());
    }

    /// Message used when a row cannot be enriched because its id is unusable
    pub fn invalid_id_message(raw_id: &str) -> String {
        format!("Account does not have a valid ID={}", raw_id)
    }
}
