use passline_api::{
    DEFAULT_BROADCAST_CAPACITY, PublishError, PublisherConfig, PublisherKind, TokenPublisher,
};
use tokio::sync::broadcast;

pub type TokenReceiver = broadcast::Receiver<String>;

/// Subscription side of a [`BroadcastPublisher`], kept by whoever wires the publisher.
#[derive(Clone)]
pub struct TokenFeed(broadcast::Sender<String>);

impl TokenFeed {
    pub fn subscribe(&self) -> TokenReceiver {
        self.0.subscribe()
    }
}

/// Records each hand-off in the log stream. The token itself is never logged.
pub struct LogPublisher {
    topic: String,
}

impl LogPublisher {
    pub fn new(topic: String) -> Self {
        Self { topic }
    }
}

impl TokenPublisher for LogPublisher {
    fn id(&self) -> &str {
        &self.topic
    }

    fn publish(&self, token: &str) -> Result<(), PublishError> {
        if self.topic.is_empty() {
            return Err(PublishError::Delivery("topic is empty".to_string()));
        }
        tracing::info!(topic = %self.topic, bytes = token.len(), "token published");
        Ok(())
    }
}

/// Fans tokens out to in-process subscribers.
pub struct BroadcastPublisher {
    topic: String,
    sender: broadcast::Sender<String>,
}

impl BroadcastPublisher {
    pub fn new(topic: String, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { topic, sender }
    }

    pub fn feed(&self) -> TokenFeed {
        TokenFeed(self.sender.clone())
    }

    pub fn subscribe(&self) -> TokenReceiver {
        self.sender.subscribe()
    }
}

impl TokenPublisher for BroadcastPublisher {
    fn id(&self) -> &str {
        &self.topic
    }

    fn publish(&self, token: &str) -> Result<(), PublishError> {
        let delivered = self
            .sender
            .send(token.to_string())
            .map_err(|_| PublishError::Closed(format!("{} has no subscribers", self.topic)))?;
        tracing::debug!(topic = %self.topic, subscribers = delivered, "token broadcast");
        Ok(())
    }
}

pub struct NoopPublisher;

impl TokenPublisher for NoopPublisher {
    fn id(&self) -> &str {
        "none"
    }

    fn publish(&self, _token: &str) -> Result<(), PublishError> {
        Ok(())
    }
}

/// A configured publisher plus, for broadcast, the handle to subscribe with.
pub struct BuiltPublisher {
    pub publisher: Box<dyn TokenPublisher>,
    pub feed: Option<TokenFeed>,
}

pub fn build_publisher(cfg: &PublisherConfig) -> BuiltPublisher {
    match cfg.kind {
        PublisherKind::Log => BuiltPublisher {
            publisher: Box::new(LogPublisher::new(cfg.topic.clone())),
            feed: None,
        },
        PublisherKind::Broadcast => {
            let capacity = cfg.capacity().unwrap_or_else(|e| {
                tracing::warn!(topic = %cfg.topic, "{e}, using {DEFAULT_BROADCAST_CAPACITY}");
                DEFAULT_BROADCAST_CAPACITY
            });
            let publisher = BroadcastPublisher::new(cfg.topic.clone(), capacity);
            let feed = Some(publisher.feed());
            BuiltPublisher {
                publisher: Box::new(publisher),
                feed,
            }
        }
        PublisherKind::None => BuiltPublisher {
            publisher: Box::new(NoopPublisher),
            feed: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_reaches_subscribers() {
        let publisher = BroadcastPublisher::new("t".to_string(), 4);
        let mut rx = publisher.subscribe();
        publisher.publish("a.b.c").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "a.b.c");
    }

    #[test]
    fn broadcast_without_subscribers_fails() {
        let publisher = BroadcastPublisher::new("t".to_string(), 4);
        assert!(matches!(
            publisher.publish("a.b.c"),
            Err(PublishError::Closed(_))
        ));
    }

    #[test]
    fn factory_follows_kind() {
        let mut cfg = PublisherConfig::default();
        let built = build_publisher(&cfg);
        assert_eq!(built.publisher.id(), "passline.tokens");
        assert!(built.feed.is_none());

        cfg.kind = PublisherKind::None;
        assert_eq!(build_publisher(&cfg).publisher.id(), "none");
    }

    #[test]
    fn broadcast_factory_exposes_feed_with_capacity() {
        let mut cfg = PublisherConfig {
            kind: PublisherKind::Broadcast,
            ..PublisherConfig::default()
        };
        cfg.attributes
            .insert(passline_api::CAPACITY_ATTRIBUTE.to_string(), "2".to_string());
        let built = build_publisher(&cfg);
        let mut rx = built.feed.unwrap().subscribe();

        for token in ["t1", "t2", "t3"] {
            built.publisher.publish(token).unwrap();
        }
        // Capacity 2: the oldest token is overwritten.
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(1))
        ));
        assert_eq!(rx.try_recv().unwrap(), "t2");
        assert_eq!(rx.try_recv().unwrap(), "t3");
    }

    #[test]
    fn log_publisher_needs_topic() {
        assert!(LogPublisher::new(String::new()).publish("x").is_err());
        assert!(LogPublisher::new("t".to_string()).publish("x").is_ok());
    }
}
