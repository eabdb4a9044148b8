//! Validation of raw subscribe/unsubscribe requests.
//!
//! A request is parsed in full before any connection state is touched, so a
//! rejected request never leaves a partial mutation behind.

use reqwest::Url;
use serde_json::{Map, Value};

use crate::domain::models::requests::FilterRequest;
use crate::domain::models::types::{BookSide, BookSpec, CurrencySpec, StreamKind, UrlCallback};
use crate::domain::services::validation::{is_valid_address, validate_currency_spec};

use super::{SubscriptionError, SubscriptionResult};

/// Which call a request is parsed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Subscribe,
    Unsubscribe,
}

/// What a request does to the connection's URL callback.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UrlChange {
    #[default]
    Keep,
    Set(UrlCallback),
    Clear,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedFilter {
    pub streams: Vec<StreamKind>,
    pub accounts: Vec<String>,
    pub accounts_proposed: Vec<String>,
    pub books: Vec<BookSpec>,
    pub url: UrlChange,
}

impl ParsedFilter {
    /// Validates a raw request.
    ///
    /// Fields are checked in order (streams, accounts, accounts_proposed,
    /// books, url) and the first violation is returned.
    ///
    /// # Arguments
    /// * `request` - The raw client request
    /// * `mode` - Whether the request is a subscribe or an unsubscribe
    ///
    /// # Returns
    /// * `Ok(ParsedFilter)` - The validated request
    /// * `Err(SubscriptionError)` - The first validation failure
    pub fn parse(request: &FilterRequest, mode: FilterMode) -> SubscriptionResult<Self> {
        let streams = request
            .streams
            .iter()
            .flatten()
            .map(|name| {
                name.parse::<StreamKind>()
                    .map_err(|_| SubscriptionError::UnknownStreamType(name.clone()))
            })
            .collect::<SubscriptionResult<Vec<_>>>()?;

        let accounts = parse_accounts(request.accounts.as_deref())?;
        let accounts_proposed = parse_accounts(request.accounts_proposed.as_deref())?;

        let books = request
            .books
            .iter()
            .flatten()
            .map(parse_book)
            .collect::<SubscriptionResult<Vec<_>>>()?;

        let url = match mode {
            FilterMode::Subscribe => parse_url_callback(request)?,
            FilterMode::Unsubscribe if request.url.is_some() => UrlChange::Clear,
            FilterMode::Unsubscribe => UrlChange::Keep,
        };

        Ok(Self {
            streams,
            accounts,
            accounts_proposed,
            books,
            url,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
            && self.accounts.is_empty()
            && self.accounts_proposed.is_empty()
            && self.books.is_empty()
            && self.url == UrlChange::Keep
    }
}

fn parse_accounts(accounts: Option<&[String]>) -> SubscriptionResult<Vec<String>> {
    let accounts = accounts.unwrap_or_default();
    if let Some(bad) = accounts.iter().find(|a| !is_valid_address(a)) {
        return Err(SubscriptionError::InvalidAccountAddress(bad.clone()));
    }
    Ok(accounts.to_vec())
}

/// Parses one entry of `books`.
fn parse_book(value: &Value) -> SubscriptionResult<BookSpec> {
    let book = value.as_object().ok_or_else(|| {
        SubscriptionError::MalformedFilterPayload("book entry must be an object".to_string())
    })?;

    let taker_pays = book
        .get("taker_pays")
        .ok_or(SubscriptionError::MissingTakerPays)?;
    let taker_gets = book
        .get("taker_gets")
        .ok_or(SubscriptionError::MissingTakerGets)?;

    let taker_pays = parse_leg(taker_pays, BookSide::TakerPays)?;
    let taker_gets = parse_leg(taker_gets, BookSide::TakerGets)?;

    Ok(BookSpec {
        taker_gets,
        taker_pays,
        snapshot: parse_flag(book, "snapshot")?,
        both: parse_flag(book, "both")?,
    })
}

fn parse_leg(value: &Value, side: BookSide) -> SubscriptionResult<CurrencySpec> {
    let leg = value.as_object().ok_or_else(|| {
        SubscriptionError::MalformedFilterPayload(format!("{} must be an object", side))
    })?;

    let currency = optional_str(leg, "currency", side)?;
    let issuer = optional_str(leg, "issuer", side)?;

    validate_currency_spec(currency, issuer)
        .map_err(|reason| SubscriptionError::InvalidCurrencySpec { side, reason })
}

fn optional_str<'a>(
    leg: &'a Map<String, Value>,
    field: &str,
    side: BookSide,
) -> SubscriptionResult<Option<&'a str>> {
    match leg.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(SubscriptionError::MalformedFilterPayload(format!(
            "{}.{} must be a string",
            side, field
        ))),
    }
}

fn parse_flag(book: &Map<String, Value>, field: &str) -> SubscriptionResult<bool> {
    match book.get(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(_) => Err(SubscriptionError::MalformedFilterPayload(format!(
            "{} must be a boolean",
            field
        ))),
    }
}

fn parse_url_callback(request: &FilterRequest) -> SubscriptionResult<UrlChange> {
    let Some(url) = request.url.as_deref() else {
        if request.url_username.is_some() || request.url_password.is_some() {
            return Err(SubscriptionError::MalformedFilterPayload(
                "url_username and url_password require url".to_string(),
            ));
        }
        return Ok(UrlChange::Keep);
    };

    let parsed = Url::parse(url)
        .map_err(|e| SubscriptionError::MalformedFilterPayload(format!("invalid url: {}", e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SubscriptionError::MalformedFilterPayload(format!(
            "unsupported url scheme: {}",
            parsed.scheme()
        )));
    }

    // Stored verbatim, not in the normalized form produced by the parser.
    Ok(UrlChange::Set(UrlCallback {
        url: url.to_string(),
        username: request.url_username.clone(),
        password: request.url_password.clone(),
    }))
}
