//! Protocol-agnostic representations of RabbitMQ entities.
//!
//! Both transports translate their wire formats to and from these types, so
//! callers never see AMQP frames or management API records.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Message headers. Values are arbitrary JSON-like data.
pub type Headers = BTreeMap<String, serde_json::Value>;

/// Routing behavior of an exchange. It cannot be changed once the exchange
/// exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ExchangeType {
    /// Routes to bindings whose key equals the routing key.
    #[default]
    Direct,
    /// Routes on header values, ignoring the routing key.
    Headers,
    /// Routes to every binding, ignoring the routing key.
    Fanout,
    /// Routes to bindings whose pattern matches the routing key.
    Topic,
    /// A type provided by a server plugin, e.g. `x-delayed-message`.
    Other(String),
}

impl ExchangeType {
    pub fn as_str(&self) -> &str {
        match self {
            ExchangeType::Direct => "direct",
            ExchangeType::Headers => "headers",
            ExchangeType::Fanout => "fanout",
            ExchangeType::Topic => "topic",
            ExchangeType::Other(kind) => kind,
        }
    }

    /// Maps a server-reported type, keeping unknown ones as `Other`.
    pub fn from_wire(kind: &str) -> Self {
        kind.parse().unwrap_or_else(|_| ExchangeType::Other(kind.to_owned()))
    }
}

impl FromStr for ExchangeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ExchangeType::Direct),
            "headers" => Ok(ExchangeType::Headers),
            "fanout" => Ok(ExchangeType::Fanout),
            "topic" => Ok(ExchangeType::Topic),
            _ => Err(Error::Config(format!(
                "unknown exchange type '{}', expected one of: direct, headers, fanout, topic",
                s
            ))),
        }
    }
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum QueueType {
    #[default]
    Classic,
    /// Replicated queue, see https://www.rabbitmq.com/docs/quorum-queues.
    Quorum,
    /// Server-reported type this client does not create, e.g. `stream`.
    Other(String),
}

impl QueueType {
    pub fn as_str(&self) -> &str {
        match self {
            QueueType::Classic => "classic",
            QueueType::Quorum => "quorum",
            QueueType::Other(kind) => kind,
        }
    }

    pub fn from_wire(kind: &str) -> Self {
        if kind.is_empty() {
            return QueueType::Classic;
        }
        kind.parse().unwrap_or_else(|_| QueueType::Other(kind.to_owned()))
    }
}

impl FromStr for QueueType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(QueueType::Classic),
            "quorum" => Ok(QueueType::Quorum),
            _ => Err(Error::Config(format!("unknown queue type '{}', expected one of: classic, quorum", s))),
        }
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a binding targets a queue or another exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BindingType {
    #[default]
    ToQueue,
    ToExchange,
}

impl BindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingType::ToQueue => "queue",
            BindingType::ToExchange => "exchange",
        }
    }

    /// Path segment the management API uses for the destination kind.
    pub(crate) fn path_segment(&self) -> &'static str {
        match self {
            BindingType::ToQueue => "q",
            BindingType::ToExchange => "e",
        }
    }
}

impl FromStr for BindingType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue" => Ok(BindingType::ToQueue),
            "exchange" => Ok(BindingType::ToExchange),
            _ => Err(Error::Config(format!("unknown binding destination type '{}'", s))),
        }
    }
}

impl fmt::Display for BindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exchange {
    /// Names starting with `amq.` are reserved for predefined exchanges.
    pub name: String,
    pub kind: ExchangeType,
    /// Survives server restarts.
    pub durable: bool,
    /// Removed once its last binding is gone.
    pub auto_delete: bool,
    /// Cannot be published to directly, only through exchange bindings.
    pub internal: bool,
    /// Do not wait for the server to confirm the declaration.
    pub no_wait: bool,
}

impl Exchange {
    /// An exchange reference where only the name matters, as used by bindings
    /// and messages.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Queue {
    /// May be empty, in which case the server generates a name on creation.
    pub name: String,
    pub kind: QueueType,
    pub durable: bool,
    /// Removed once its last consumer is gone.
    pub auto_delete: bool,
    /// Ready messages, reported by the server when listing.
    pub messages: u64,
    /// Node hosting the queue leader, reported by the server when listing.
    pub node: String,
    /// Delivered but unacknowledged messages, reported by the server when
    /// listing.
    pub messages_unacknowledged: u64,
}

impl Queue {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Routing rule from an exchange to a queue or another exchange.
///
/// Binding a durable queue requires a durable source exchange. This is left
/// to the server to enforce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    pub kind: BindingType,
    /// Source exchange, only its name is sent to the server.
    pub from: Exchange,
    pub target_name: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    /// Target exchange, only its name is sent to the server. The empty name is
    /// the default exchange.
    pub target: Exchange,
    pub headers: Headers,
    pub routing_key: String,
    pub body: Vec<u8>,
}

/// Server identity as reported by the management API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overview {
    pub product: String,
    pub version: String,
    pub erlang_version: String,
    pub cluster_name: String,
    pub management_version: String,
}

/// Checks the charset allowed for exchange and queue names: letters, digits,
/// hyphens, underscores, periods and colons.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// Parses headers written as `key1=value1,key2=value2`. Values are kept as
/// strings and a repeated key keeps its last value.
pub fn parse_headers(s: &str) -> Result<Headers, Error> {
    let mut headers = Headers::new();
    if s.trim().is_empty() {
        return Ok(headers);
    }
    for pair in s.split(',') {
        let tokens = pair.trim().split('=').collect::<Vec<&str>>();
        match tokens.as_slice() {
            [key, value] if !key.trim().is_empty() => {
                headers.insert(key.trim().to_owned(), serde_json::Value::String(value.trim().to_owned()));
            }
            _ => {
                return Err(Error::Config(format!("expected header in form key=value, got '{}'", pair.trim())));
            }
        }
    }
    Ok(headers)
}
