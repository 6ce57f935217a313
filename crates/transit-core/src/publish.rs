use std::error;

use async_trait::async_trait;

#[derive(Debug)]
pub struct MessageNotPublished(pub Box<dyn error::Error + Send + Sync>);

pub type PublishError = MessageNotPublished;

/// The downstream publisher that ships the binary transit-realtime feed.
/// Transport failures surface as [`MessageNotPublished`] so the handler can
/// report failure to its caller without retrying indefinitely.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, feed: Vec<u8>) -> Result<(), MessageNotPublished>;
}
