//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name           | Description                                             | Key Methods      |
// |----------------|---------------------------------------------------------|------------------|
// | FilterRequest  | Client-supplied subscribe/unsubscribe fields (raw)      | with_* builders  |
//--------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{BookSpec, StreamKind};

/// Raw subscribe/unsubscribe request as received from a client.
///
/// Fields are kept loosely typed so that validation can report the precise
/// failure (unknown stream, bad address, missing book leg) instead of a
/// generic deserialization error. `books` entries stay as JSON values for the
/// same reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streams: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts_proposed: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub books: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_password: Option<String>,
}

/// Request body of `subscribe`.
pub type SubscribeRequest = FilterRequest;

/// Request body of `unsubscribe`. Same shape as `subscribe`.
pub type UnsubscribeRequest = FilterRequest;

impl FilterRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_streams<I, S>(mut self, streams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.streams = Some(streams.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_stream_kinds(self, kinds: &[StreamKind]) -> Self {
        self.with_streams(kinds.iter().map(|kind| kind.as_str()))
    }

    pub fn with_accounts<I, S>(mut self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accounts = Some(accounts.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_accounts_proposed<I, S>(mut self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accounts_proposed = Some(accounts.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a raw book entry, exactly as a client would send it.
    pub fn with_raw_book(mut self, book: Value) -> Self {
        self.books.get_or_insert_with(Vec::new).push(book);
        self
    }

    /// Adds a typed book entry.
    pub fn with_book(self, book: &BookSpec) -> Self {
        // BookSpec only holds strings and bools, so this cannot fail.
        let value = serde_json::to_value(book).unwrap_or(Value::Null);
        self.with_raw_book(value)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_url_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.url_username = Some(username.into());
        self.url_password = Some(password.into());
        self
    }
}
