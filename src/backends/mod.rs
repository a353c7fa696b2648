pub mod amqp;
pub mod management;
