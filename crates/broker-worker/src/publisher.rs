use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use transit_core::{MessageNotPublished, Publisher};

/// Downstream publisher for the merged feed: one durable fanout exchange,
/// declared once at construction, republished to on every call. Mirrors
/// [`crate::consumer::BrokerConsumer`]'s declare-then-use shape, just in
/// the opposite direction.
pub struct AmqpPublisher {
    channel: Channel,
    exchange_name: String,
}

impl AmqpPublisher {
    pub async fn connect(broker_url: &str, exchange_name: &str) -> Result<Self, lapin::Error> {
        let connection = Connection::connect(broker_url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                exchange_name,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;

        Ok(Self { channel, exchange_name: exchange_name.to_owned() })
    }
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn publish(&self, feed: Vec<u8>) -> Result<(), MessageNotPublished> {
        self.channel
            .basic_publish(&self.exchange_name, "", BasicPublishOptions::default(), &feed, BasicProperties::default())
            .await
            .map_err(|why| MessageNotPublished(Box::new(why)))?
            .await
            .map_err(|why| MessageNotPublished(Box::new(why)))?;

        Ok(())
    }
}

/// Wraps a [`Publisher`] with kirin's `MAX_RETRIES` bounded-retry behavior
/// for the transient transport failures spec.md §7 calls out.
pub struct RetryingPublisher<P> {
    inner: P,
    max_attempts: u32,
}

impl<P> RetryingPublisher<P> {
    pub fn new(inner: P, max_attempts: u32) -> Self {
        Self { inner, max_attempts: max_attempts.max(1) }
    }
}

#[async_trait]
impl<P: Publisher> Publisher for RetryingPublisher<P> {
    async fn publish(&self, feed: Vec<u8>) -> Result<(), MessageNotPublished> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.inner.publish(feed.clone()).await {
                Ok(()) => return Ok(()),
                Err(why) if attempt < self.max_attempts => {
                    log::warn!("publish attempt {attempt}/{} failed: {:?}", self.max_attempts, why.0);
                }
                Err(why) => return Err(why),
            }
        }
    }
}
