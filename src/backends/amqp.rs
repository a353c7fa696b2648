use std::time::{SystemTime, UNIX_EPOCH};

use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldArray, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};

use crate::error::{Error, Result};
use crate::model::{Headers, Message, Queue};

struct Session {
    connection: Connection,
    channel: Channel,
}

/// AMQP client holding at most one connection with a single channel.
///
/// There is no pooling: every `connect` dials a new connection. Callers must
/// `close` the client once done, as the connection is not released on drop.
pub struct AmqpClient {
    uri: String,
    session: Option<Session>,
}

impl AmqpClient {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            session: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Dials the server and opens a channel, closing any previous one first.
    pub async fn connect(&mut self) -> Result<()> {
        self.close().await?;

        log::debug!("dialling AMQP server");
        let connection = Connection::connect(&self.uri, ConnectionProperties::default())
            .await
            .map_err(|e| Error::Connection(format!("dialling RabbitMQ server: {}", e)))?;

        let channel = match connection.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                let _ = connection.close(200, "channel setup failed").await;
                return Err(Error::Connection(format!("establishing AMQP channel: {}", e)));
            }
        };
        log::debug!("AMQP channel {} open", channel.id());

        self.session = Some(Session { connection, channel });
        Ok(())
    }

    async fn channel(&mut self) -> Result<&Channel> {
        if self.session.is_none() {
            self.connect().await?;
        }
        self.session
            .as_ref()
            .map(|session| &session.channel)
            .ok_or_else(|| Error::Connection("no AMQP channel after connect".to_owned()))
    }

    /// Publishes without publisher confirms. Success means the local channel
    /// accepted the frame, not that the broker routed or stored it.
    pub async fn publish(&mut self, message: &Message) -> Result<()> {
        let frame = PublishFrame::from_message(message);
        let channel = self.channel().await?;

        log::debug!(
            "publishing {} bytes to exchange \"{}\" with routing key \"{}\"",
            frame.body.len(),
            frame.exchange,
            frame.routing_key
        );
        channel
            .basic_publish(
                &frame.exchange,
                &frame.routing_key,
                BasicPublishOptions::default(),
                &frame.body,
                frame.properties,
            )
            .await
            .map_err(|e| Error::Publish(format!("publishing message: {}", e)))?;

        Ok(())
    }

    /// Declares a queue and returns the name reported by the server, which is
    /// generated when `queue.name` is empty.
    pub async fn declare_queue(&mut self, queue: &Queue) -> Result<String> {
        let mut arguments = FieldTable::default();
        arguments.insert(
            ShortString::from("x-queue-type"),
            AMQPValue::LongString(LongString::from(queue.kind.as_str().to_owned())),
        );
        let options = QueueDeclareOptions {
            durable: queue.durable,
            auto_delete: queue.auto_delete,
            ..QueueDeclareOptions::default()
        };

        let channel = self.channel().await?;
        let declared = channel
            .queue_declare(&queue.name, options, arguments)
            .await
            .map_err(|e| Error::Declare(format!("declaring queue: {}", e)))?;

        Ok(declared.name().as_str().to_owned())
    }

    /// Closes the channel and its connection. Does nothing when not connected.
    pub async fn close(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        log::debug!("closing AMQP channel {}", session.channel.id());
        // the connection is closed even when closing the channel failed
        let channel_closed = session
            .channel
            .close(200, "OK")
            .await
            .map_err(|e| Error::Connection(format!("closing AMQP channel: {}", e)));
        let connection_closed = session
            .connection
            .close(200, "OK")
            .await
            .map_err(|e| Error::Connection(format!("closing AMQP connection: {}", e)));
        channel_closed.and(connection_closed)
    }
}

/// Everything that goes into a `basic.publish`.
#[derive(Debug, Clone)]
pub struct PublishFrame {
    pub exchange: String,
    pub routing_key: String,
    pub properties: BasicProperties,
    pub body: Vec<u8>,
}

impl PublishFrame {
    pub fn from_message(message: &Message) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since| since.as_secs())
            .unwrap_or_default();

        Self {
            exchange: message.target.name.clone(),
            routing_key: message.routing_key.clone(),
            properties: BasicProperties::default()
                .with_headers(headers_to_field_table(&message.headers))
                .with_timestamp(timestamp),
            body: message.body.clone(),
        }
    }
}

pub fn headers_to_field_table(headers: &Headers) -> FieldTable {
    let mut table = FieldTable::default();
    for (key, value) in headers {
        table.insert(ShortString::from(key.clone()), json_to_amqp(value));
    }
    table
}

fn json_to_amqp(value: &serde_json::Value) -> AMQPValue {
    use serde_json::Value;

    match value {
        Value::Null => AMQPValue::Void,
        Value::Bool(b) => AMQPValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AMQPValue::LongLongInt(i),
            None => AMQPValue::Double(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => AMQPValue::LongString(LongString::from(s.clone())),
        Value::Array(items) => {
            AMQPValue::FieldArray(FieldArray::from(items.iter().map(json_to_amqp).collect::<Vec<_>>()))
        }
        Value::Object(map) => {
            let mut table = FieldTable::default();
            for (key, value) in map {
                table.insert(ShortString::from(key.clone()), json_to_amqp(value));
            }
            AMQPValue::FieldTable(table)
        }
    }
}
