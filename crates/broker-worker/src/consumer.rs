use lapin::options::{BasicCancelOptions, BasicConsumeOptions, BasicQosOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer};

/// Fatal preconditions a worker checks once at construction, matching
/// kirin's `piv_worker.py` startup checks: a misconfigured contributor
/// never gets a half-started worker retrying forever against bad settings.
#[derive(Debug)]
pub enum ConnectError {
    MissingBrokerFields,
    Amqp(lapin::Error),
}

impl From<lapin::Error> for ConnectError {
    fn from(why: lapin::Error) -> Self {
        ConnectError::Amqp(why)
    }
}

/// One AMQP channel consuming from one contributor's durable queue, bound
/// to its fanout exchange. Prefetch is pinned to 1 so a slow handler never
/// lets the broker pile up unacked deliveries on this consumer.
///
/// The exchange itself is never declared here: it is provisioned once
/// upstream of this worker and only ever `queue_declare`d/`queue_bind`d
/// against, both at initial connect and on a later rebind.
pub struct BrokerConsumer {
    pub channel: Channel,
    pub consumer: Consumer,
    consumer_tag: String,
}

impl BrokerConsumer {
    pub async fn connect(broker_url: &str, exchange_name: &str, queue_name: &str, consumer_tag: &str) -> Result<Self, ConnectError> {
        let connection = Connection::connect(broker_url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel.basic_qos(1, BasicQosOptions::default()).await?;

        channel
            .queue_declare(queue_name, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
            .await?;

        channel
            .queue_bind(queue_name, exchange_name, "", QueueBindOptions::default(), FieldTable::default())
            .await?;

        let consumer = channel
            .basic_consume(queue_name, consumer_tag, BasicConsumeOptions::default(), FieldTable::default())
            .await?;

        Ok(Self {
            channel,
            consumer,
            consumer_tag: consumer_tag.to_owned(),
        })
    }

    /// Rebinds this consumer to a new exchange/queue pair on the same
    /// channel: cancels the old consumer, declares and binds the new queue,
    /// and starts consuming from it. Never declares the exchange, matching
    /// `connect`.
    pub async fn rebind(&mut self, exchange_name: &str, queue_name: &str) -> Result<(), ConnectError> {
        self.channel.basic_cancel(&self.consumer_tag, BasicCancelOptions::default()).await?;

        self.channel
            .queue_declare(queue_name, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
            .await?;

        self.channel
            .queue_bind(queue_name, exchange_name, "", QueueBindOptions::default(), FieldTable::default())
            .await?;

        self.consumer = self
            .channel
            .basic_consume(queue_name, &self.consumer_tag, BasicConsumeOptions::default(), FieldTable::default())
            .await?;

        Ok(())
    }
}
