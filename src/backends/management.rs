use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use ureq::http::Response;
use ureq::tls::TlsConfig;
use ureq::{Agent, Body};

use crate::error::{Error, Result};
use crate::model::{Binding, BindingType, Exchange, ExchangeType, Headers, Message, Overview, Queue, QueueType};
use crate::utils::encode_component;

/// The only virtual host this client works with, already encoded for paths.
pub const VHOST: &str = "%2F";

/// Ack mode sent with every message fetch. The server re-queues fetched
/// messages regardless of the `requeue` flag in the same request.
pub const FETCH_ACKMODE: &str = "ack_requeue_true";

type ErrorKind = fn(String) -> Error;

/// Blocking client for the RabbitMQ HTTP management API.
///
/// Each call builds a new agent, so no connection or session is reused
/// between calls.
#[derive(Debug, Clone)]
pub struct ManagementClient {
    base: String,
    user: String,
    password: String,
    verify_certificates: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ExchangeInfo {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    durable: bool,
    auto_delete: bool,
    internal: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct QueueInfo {
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    durable: bool,
    auto_delete: bool,
    messages: Option<u64>,
    node: Option<String>,
    messages_unacknowledged: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct BindingInfo {
    source: String,
    destination: String,
    destination_type: String,
    routing_key: String,
}

#[derive(Debug, Serialize)]
struct FetchRequest {
    count: usize,
    requeue: bool,
    encoding: &'static str,
    ackmode: &'static str,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FetchedProperties {
    headers: Option<Headers>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FetchedMessage {
    payload_bytes: u64,
    redelivered: bool,
    exchange: String,
    routing_key: String,
    headers: Option<Headers>,
    properties: Option<FetchedProperties>,
    payload: String,
    payload_encoding: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct OverviewInfo {
    product_name: Option<String>,
    product_version: Option<String>,
    rabbitmq_version: String,
    erlang_version: String,
    cluster_name: String,
    management_version: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ErrorBody {
    error: String,
    reason: String,
}

impl ManagementClient {
    pub fn new(base: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_owned(),
            user: user.into(),
            password: password.into(),
            verify_certificates: false,
        }
    }

    pub fn with_verify_certificates(mut self, verify: bool) -> Self {
        self.verify_certificates = verify;
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn agent(&self) -> Agent {
        let tls = TlsConfig::builder()
            .disable_verification(!self.verify_certificates)
            .build();
        Agent::config_builder()
            .http_status_as_error(false)
            .tls_config(tls)
            .build()
            .into()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base, path)
    }

    fn authorization(&self) -> String {
        let credentials = format!("{}:{}", self.user, self.password);
        format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(credentials))
    }

    fn get(&self, path: &str, kind: ErrorKind, what: &str) -> Result<Response<Body>> {
        log::debug!("GET {}", self.url(path));
        let response = self
            .agent()
            .get(self.url(path))
            .header("Authorization", self.authorization())
            .call()
            .map_err(|e| transport_error(kind, what, e))?;
        expect_success(response, kind, what)
    }

    fn delete(&self, path: &str, kind: ErrorKind, what: &str) -> Result<Response<Body>> {
        log::debug!("DELETE {}", self.url(path));
        let response = self
            .agent()
            .delete(self.url(path))
            .header("Authorization", self.authorization())
            .call()
            .map_err(|e| transport_error(kind, what, e))?;
        expect_success(response, kind, what)
    }

    fn put_json(&self, path: &str, body: &impl Serialize, kind: ErrorKind, what: &str) -> Result<Response<Body>> {
        log::debug!("PUT {}", self.url(path));
        let response = self
            .agent()
            .put(self.url(path))
            .header("Authorization", self.authorization())
            .send_json(body)
            .map_err(|e| transport_error(kind, what, e))?;
        expect_success(response, kind, what)
    }

    fn post_json(&self, path: &str, body: &impl Serialize, kind: ErrorKind, what: &str) -> Result<Response<Body>> {
        log::debug!("POST {}", self.url(path));
        let response = self
            .agent()
            .post(self.url(path))
            .header("Authorization", self.authorization())
            .send_json(body)
            .map_err(|e| transport_error(kind, what, e))?;
        expect_success(response, kind, what)
    }

    /// Creates the exchange. Declaring an existing exchange with the same
    /// settings succeeds, conflicting settings are rejected by the server.
    pub fn declare_exchange(&self, exchange: &Exchange) -> Result<()> {
        let body = json!({
            "type": exchange.kind.as_str(),
            "durable": exchange.durable,
            "auto_delete": exchange.auto_delete,
            "internal": exchange.internal,
            "arguments": {},
        });
        let path = format!("exchanges/{}/{}", VHOST, encode_component(&exchange.name));
        self.put_json(&path, &body, Error::Declare, "declaring exchange")?;
        Ok(())
    }

    /// Creates the queue and returns its name. The management API cannot
    /// generate names, so `queue.name` must be set.
    pub fn declare_queue(&self, queue: &Queue) -> Result<String> {
        if queue.name.is_empty() {
            return Err(Error::Declare(
                "declaring queue: the management API requires a queue name".to_owned(),
            ));
        }
        let body = json!({
            "durable": queue.durable,
            "auto_delete": queue.auto_delete,
            "arguments": { "x-queue-type": queue.kind.as_str() },
        });
        let path = format!("queues/{}/{}", VHOST, encode_component(&queue.name));
        self.put_json(&path, &body, Error::Declare, "declaring queue")?;
        Ok(queue.name.clone())
    }

    pub fn declare_binding(&self, binding: &Binding) -> Result<()> {
        let body = json!({
            "routing_key": binding.key,
            "arguments": {},
        });
        let path = format!(
            "bindings/{}/e/{}/{}/{}",
            VHOST,
            encode_component(&binding.from.name),
            binding.kind.path_segment(),
            encode_component(&binding.target_name),
        );
        self.post_json(&path, &body, Error::Declare, "declaring binding")?;
        Ok(())
    }

    pub fn list_exchanges(&self) -> Result<Vec<Exchange>> {
        let infos: Vec<ExchangeInfo> = read_json(
            self.get(&format!("exchanges/{}", VHOST), Error::List, "listing exchanges")?,
            Error::List,
            "listing exchanges",
        )?;
        Ok(infos.into_iter().map(exchange_from_info).collect())
    }

    pub fn list_queues(&self) -> Result<Vec<Queue>> {
        let infos: Vec<QueueInfo> = read_json(
            self.get(&format!("queues/{}", VHOST), Error::List, "listing queues")?,
            Error::List,
            "listing queues",
        )?;
        Ok(infos.into_iter().map(queue_from_info).collect())
    }

    pub fn list_bindings(&self) -> Result<Vec<Binding>> {
        let infos: Vec<BindingInfo> = read_json(
            self.get(&format!("bindings/{}", VHOST), Error::List, "listing bindings")?,
            Error::List,
            "listing bindings",
        )?;
        infos.into_iter().map(binding_from_info).collect()
    }

    /// Fetches up to `max` messages from the queue.
    ///
    /// The request always uses [`FETCH_ACKMODE`], so the server puts the
    /// messages back even when `requeue` is false.
    pub fn get_messages(&self, queue: &Queue, max: usize, requeue: bool) -> Result<Vec<Message>> {
        let body = FetchRequest {
            count: max,
            requeue,
            encoding: "auto",
            ackmode: FETCH_ACKMODE,
        };
        let path = format!("queues/{}/{}/get", VHOST, encode_component(&queue.name));
        let response = self.post_json(&path, &body, Error::Read, "reading messages")?;
        let fetched: Vec<FetchedMessage> = read_json(response, Error::Read, "reading messages")?;
        fetched.into_iter().map(message_from_fetched).collect()
    }

    /// Fails with [`Error::Delete`] if the exchange does not exist.
    pub fn delete_exchange(&self, name: &str) -> Result<()> {
        let path = format!("exchanges/{}/{}", VHOST, encode_component(name));
        self.delete(&path, Error::Delete, "deleting exchange")?;
        Ok(())
    }

    /// Fails with [`Error::Delete`] if the queue does not exist.
    pub fn delete_queue(&self, name: &str) -> Result<()> {
        let path = format!("queues/{}/{}", VHOST, encode_component(name));
        self.delete(&path, Error::Delete, "deleting queue")?;
        Ok(())
    }

    pub fn overview(&self) -> Result<Overview> {
        let info: OverviewInfo = read_json(
            self.get("overview", Error::List, "reading server overview")?,
            Error::List,
            "reading server overview",
        )?;
        Ok(Overview {
            product: info.product_name.unwrap_or_else(|| "RabbitMQ".to_owned()),
            version: info.product_version.unwrap_or(info.rabbitmq_version),
            erlang_version: info.erlang_version,
            cluster_name: info.cluster_name,
            management_version: info.management_version,
        })
    }
}

fn transport_error(kind: ErrorKind, what: &str, err: ureq::Error) -> Error {
    match err {
        ureq::Error::Io(_)
        | ureq::Error::HostNotFound
        | ureq::Error::ConnectionFailed
        | ureq::Error::Timeout(_) => Error::Connection(format!("{}: {}", what, err)),
        _ => kind(format!("{}: {}", what, err)),
    }
}

fn expect_success(mut response: Response<Body>, kind: ErrorKind, what: &str) -> Result<Response<Body>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.body_mut().read_to_string().unwrap_or_default();
    let reason = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .map(|body| if body.reason.is_empty() { body.error } else { body.reason })
        .filter(|reason| !reason.is_empty());

    Err(kind(match reason {
        Some(reason) => format!("{}: server returned {}: {}", what, status, reason),
        None => format!("{}: server returned {}", what, status),
    }))
}

fn read_json<T: serde::de::DeserializeOwned>(mut response: Response<Body>, kind: ErrorKind, what: &str) -> Result<T> {
    // topology listings come back in a single response and can outgrow
    // ureq's default body limit
    response
        .body_mut()
        .with_config()
        .limit(u64::MAX)
        .read_json::<T>()
        .map_err(|e| kind(format!("{}: decoding response: {}", what, e)))
}

fn exchange_from_info(info: ExchangeInfo) -> Exchange {
    Exchange {
        name: info.name,
        kind: ExchangeType::from_wire(&info.kind),
        durable: info.durable,
        auto_delete: info.auto_delete,
        internal: info.internal,
        no_wait: false,
    }
}

fn queue_from_info(info: QueueInfo) -> Queue {
    Queue {
        name: info.name,
        kind: QueueType::from_wire(info.kind.as_deref().unwrap_or_default()),
        durable: info.durable,
        auto_delete: info.auto_delete,
        messages: info.messages.unwrap_or_default(),
        node: info.node.unwrap_or_default(),
        messages_unacknowledged: info.messages_unacknowledged.unwrap_or_default(),
    }
}

fn binding_from_info(info: BindingInfo) -> Result<Binding> {
    let kind = info
        .destination_type
        .parse::<BindingType>()
        .map_err(|e| Error::List(format!("listing bindings: {}", e)))?;
    Ok(Binding {
        kind,
        from: Exchange::named(info.source),
        target_name: info.destination,
        key: info.routing_key,
    })
}

fn message_from_fetched(fetched: FetchedMessage) -> Result<Message> {
    log::trace!(
        "fetched {} bytes from \"{}\" (redelivered: {})",
        fetched.payload_bytes,
        fetched.exchange,
        fetched.redelivered
    );
    let headers = fetched
        .headers
        .or_else(|| fetched.properties.and_then(|properties| properties.headers))
        .unwrap_or_default();

    // with "auto" encoding the server base64-encodes payloads that are not
    // valid UTF-8
    let body = match fetched.payload_encoding.as_deref() {
        Some("base64") => base64::engine::general_purpose::STANDARD
            .decode(fetched.payload.as_bytes())
            .map_err(|e| Error::Read(format!("reading messages: decoding base64 payload: {}", e)))?,
        _ => fetched.payload.into_bytes(),
    };

    Ok(Message {
        target: Exchange::named(fetched.exchange),
        headers,
        routing_key: fetched.routing_key,
        body,
    })
}
