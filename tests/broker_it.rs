//! Round trips against a live broker. Run with a local RabbitMQ that has the
//! management plugin enabled:
//!
//! ```shell
//! docker run -d -p 5672:5672 -p 15672:15672 rabbitmq:3-management
//! RABBITCAT_IT_API_URL=http://localhost:15672 cargo test --test broker_it -- --ignored
//! ```

use rabbitcat::{
    Binding, BindingType, Broker, ConnectionConfig, Error, Exchange, ExchangeType, Headers, Message, Provider, Queue,
};
use serde_json::json;

fn broker() -> Broker {
    let api_url = std::env::var("RABBITCAT_IT_API_URL").unwrap_or_else(|_| "http://localhost:15672".to_owned());
    let config = ConnectionConfig::new("localhost", "guest", "guest")
        .unwrap()
        .with_api_url(Some(api_url));
    Broker::new(config)
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ"]
async fn empty_queue_name_returns_generated_name() -> Result<(), Box<dyn std::error::Error>> {
    let broker = broker();
    let name = broker.create_queue(&Queue { auto_delete: false, ..Default::default() }).await?;
    assert!(!name.is_empty());
    assert!(name.starts_with("amq.gen-"), "{name}");

    let queues = broker.get_queues(|queue| queue.name == name).await?;
    assert_eq!(queues.len(), 1);

    broker.delete_queue(&Queue::named(&name)).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ"]
async fn publish_then_peek() -> Result<(), Box<dyn std::error::Error>> {
    let broker = broker();
    let exchange = Exchange {
        name: "rabbitcat.it".to_owned(),
        kind: ExchangeType::Direct,
        ..Default::default()
    };
    broker.create_exchange(&exchange).await?;
    broker.create_exchange(&exchange).await?;
    let queue = broker.create_queue(&Queue::named("rabbitcat.it.peek")).await?;
    broker
        .create_binding(&Binding {
            kind: BindingType::ToQueue,
            from: Exchange::named(&exchange.name),
            target_name: queue.clone(),
            key: "peek".to_owned(),
        })
        .await?;

    for n in 0..4 {
        broker
            .publish_message(&Message {
                target: Exchange::named(&exchange.name),
                headers: Headers::from([("k".to_owned(), json!("v"))]),
                routing_key: "peek".to_owned(),
                body: format!("message {n}").into_bytes(),
            })
            .await?;
    }
    // publishing is fire-and-forget, give the broker a moment to route
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    let messages = broker.get_messages(&Queue::named(&queue), 3, true).await?;
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].body, b"message 0");
    assert_eq!(messages[0].routing_key, "peek");
    assert_eq!(messages[0].target.name, exchange.name);
    assert_eq!(messages[0].headers["k"], json!("v"));

    broker.delete_queue(&Queue::named(&queue)).await?;
    broker.delete_exchange(&exchange).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running RabbitMQ"]
async fn deleting_unknown_exchange_fails() {
    let err = broker()
        .delete_exchange(&Exchange::named("rabbitcat.it.does-not-exist"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Delete(_)), "{err}");
}
