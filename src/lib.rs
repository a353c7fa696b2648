//! RabbitMQ client for managing topology and publishing messages.
//!
//! [`Broker`] implements [`Provider`] on top of two transports: an AMQP
//! connection for publishing and the HTTP management API for everything
//! else.

pub mod backends;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod utils;
pub mod version;

pub use config::ConnectionConfig;
pub use error::{Error, Result};
pub use model::{Binding, BindingType, Exchange, ExchangeType, Headers, Message, Overview, Queue, QueueType};
pub use provider::{Broker, Provider};
