use crate::backends::amqp::AmqpClient;
use crate::backends::management::ManagementClient;
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::model::{Binding, Exchange, Message, Overview, Queue};

/// Operations rabbitcat performs against a RabbitMQ server.
pub trait Provider {
    /// Creates an exchange. Nothing happens if an identical exchange exists.
    fn create_exchange(&self, exchange: &Exchange) -> impl Future<Output = Result<()>>;

    /// Creates a queue and returns its name. If `queue.name` is empty, the
    /// name generated by the server is returned.
    ///
    /// Server-generated names are checked against a live broker by
    /// `empty_queue_name_returns_generated_name` in `tests/broker_it.rs`,
    /// which is ignored by default (`cargo test -- --ignored`).
    fn create_queue(&self, queue: &Queue) -> impl Future<Output = Result<String>>;

    /// Creates a binding. Nothing happens if the binding exists.
    fn create_binding(&self, binding: &Binding) -> impl Future<Output = Result<()>>;

    /// Returns the exchanges passing `filter`, in server order. Pass a filter
    /// that always returns true to get all of them.
    fn get_exchanges(&self, filter: impl Fn(&Exchange) -> bool) -> impl Future<Output = Result<Vec<Exchange>>>;

    /// Returns the queues passing `filter`, in server order.
    fn get_queues(&self, filter: impl Fn(&Queue) -> bool) -> impl Future<Output = Result<Vec<Queue>>>;

    /// Returns the bindings passing `filter`, in server order.
    fn get_bindings(&self, filter: impl Fn(&Binding) -> bool) -> impl Future<Output = Result<Vec<Binding>>>;

    /// Reads up to `max` messages from `queue`.
    ///
    /// `requeue` is forwarded to the server, but the fetch always uses an ack
    /// mode that re-queues, so messages stay in the queue either way.
    fn get_messages(&self, queue: &Queue, max: usize, requeue: bool) -> impl Future<Output = Result<Vec<Message>>>;

    /// Publishes a message to its target exchange, which has to exist. Routing
    /// is up to the exchange type; an empty exchange name targets the default
    /// exchange.
    fn publish_message(&self, message: &Message) -> impl Future<Output = Result<()>>;

    /// Deletes an exchange, failing if it does not exist.
    fn delete_exchange(&self, exchange: &Exchange) -> impl Future<Output = Result<()>>;

    /// Deletes a queue, failing if it does not exist.
    fn delete_queue(&self, queue: &Queue) -> impl Future<Output = Result<()>>;

    fn overview(&self) -> impl Future<Output = Result<Overview>>;
}

/// [`Provider`] speaking AMQP for publishing and server-named queues, and
/// the management API for everything else.
///
/// Nothing is kept between calls: each operation opens its own connection
/// and releases it before returning.
#[derive(Debug, Clone)]
pub struct Broker {
    config: ConnectionConfig,
}

impl Broker {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn management(&self) -> ManagementClient {
        ManagementClient::new(self.config.api_uri(), &self.config.user, &self.config.password)
            .with_verify_certificates(self.config.verify_certificates)
    }

    /// Runs a blocking management API call off the async runtime.
    async fn with_management<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(ManagementClient) -> Result<T> + Send + 'static,
    {
        let client = self.management();
        tokio::task::spawn_blocking(move || call(client))
            .await
            .map_err(|e| Error::Connection(format!("management API call aborted: {}", e)))?
    }

    /// Runs `call` on a fresh AMQP client that is closed afterwards on every
    /// path. A close failure is reported only when `call` succeeded.
    async fn with_amqp<T>(&self, call: impl AsyncFnOnce(&mut AmqpClient) -> Result<T>) -> Result<T> {
        let mut client = AmqpClient::new(self.config.uri());
        let result = call(&mut client).await;
        let closed = client.close().await;
        match (result, closed) {
            (Err(err), Err(close_err)) => {
                log::warn!("{}", close_err);
                Err(err)
            }
            (result, closed) => closed.and(result),
        }
    }
}

impl Provider for Broker {
    async fn create_exchange(&self, exchange: &Exchange) -> Result<()> {
        let exchange = exchange.clone();
        self.with_management(move |client| client.declare_exchange(&exchange)).await
    }

    async fn create_queue(&self, queue: &Queue) -> Result<String> {
        if queue.name.is_empty() {
            // only AMQP lets the server pick a name
            return self.with_amqp(async |client: &mut AmqpClient| client.declare_queue(queue).await).await;
        }
        let queue = queue.clone();
        self.with_management(move |client| client.declare_queue(&queue)).await
    }

    async fn create_binding(&self, binding: &Binding) -> Result<()> {
        let binding = binding.clone();
        self.with_management(move |client| client.declare_binding(&binding)).await
    }

    async fn get_exchanges(&self, filter: impl Fn(&Exchange) -> bool) -> Result<Vec<Exchange>> {
        let exchanges = self.with_management(|client| client.list_exchanges()).await?;
        Ok(exchanges.into_iter().filter(|exchange| filter(exchange)).collect())
    }

    async fn get_queues(&self, filter: impl Fn(&Queue) -> bool) -> Result<Vec<Queue>> {
        let queues = self.with_management(|client| client.list_queues()).await?;
        Ok(queues.into_iter().filter(|queue| filter(queue)).collect())
    }

    async fn get_bindings(&self, filter: impl Fn(&Binding) -> bool) -> Result<Vec<Binding>> {
        let bindings = self.with_management(|client| client.list_bindings()).await?;
        Ok(bindings.into_iter().filter(|binding| filter(binding)).collect())
    }

    async fn get_messages(&self, queue: &Queue, max: usize, requeue: bool) -> Result<Vec<Message>> {
        let queue = queue.clone();
        self.with_management(move |client| client.get_messages(&queue, max, requeue)).await
    }

    async fn publish_message(&self, message: &Message) -> Result<()> {
        self.with_amqp(async |client: &mut AmqpClient| client.publish(message).await).await
    }

    async fn delete_exchange(&self, exchange: &Exchange) -> Result<()> {
        let name = exchange.name.clone();
        self.with_management(move |client| client.delete_exchange(&name)).await
    }

    async fn delete_queue(&self, queue: &Queue) -> Result<()> {
        let name = queue.name.clone();
        self.with_management(move |client| client.delete_queue(&name)).await
    }

    async fn overview(&self) -> Result<Overview> {
        self.with_management(|client| client.overview()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker() -> Broker {
        Broker::new(ConnectionConfig::new("127.0.0.1:1", "guest", "guest").unwrap())
    }

    #[tokio::test]
    async fn publish_to_unreachable_server_fails_with_connection_error() {
        let message = Message {
            target: Exchange::named("events"),
            routing_key: "a".to_owned(),
            body: b"x".to_vec(),
            ..Default::default()
        };
        let err = broker().publish_message(&message).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)), "{err}");
    }

    #[tokio::test]
    async fn server_named_queue_goes_through_amqp() {
        // the management API would never be asked: this port has no broker
        // and the AMQP dial is what fails
        let err = broker().create_queue(&Queue::default()).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)), "{err}");
        assert!(err.to_string().contains("dialling RabbitMQ server"), "{err}");
    }

    #[test]
    fn management_client_uses_config() {
        let config = ConnectionConfig::new("rabbit:8443", "ops", "pw")
            .unwrap()
            .with_verify_certificates(true);
        let client = Broker::new(config).management();
        assert_eq!(client.base(), "https://rabbit:8443");
    }
}
