//! Background delivery of webhooks.
//!
//! Webhooks are queued after the response has been handed to the listener and
//! delivered in order by a single consumer task. Delivery failures are logged
//! and never reach the client that triggered them.

use super::client::HttpClient;
use crate::model::HttpWebhook;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default number of webhooks that may wait for delivery.
pub const DEFAULT_QUEUE_SIZE: usize = 1024;

pub struct WebhookQueue {
    capacity: usize,
    sender: Mutex<Option<mpsc::Sender<HttpWebhook>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl WebhookQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            sender: Mutex::new(None),
            consumer: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Spawn the consumer. Calling `start` on a running queue does nothing.
    pub fn start(&self, client: Arc<dyn HttpClient>) {
        let mut sender = self.sender.lock();
        if sender.is_some() {
            return;
        }
        let (tx, rx) = mpsc::channel(self.capacity);
        *sender = Some(tx);
        let cancel = self.cancel.clone();
        *self.consumer.lock() = Some(tokio::spawn(consume(rx, client, cancel)));
        info!("Webhook queue started (capacity={})", self.capacity);
    }

    /// Queue a webhook. Returns false when the queue is stopped or full.
    pub fn enqueue(&self, webhook: HttpWebhook) -> bool {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            warn!("Webhook queue not running, dropping webhook {}", webhook.http_request);
            return false;
        };
        match sender.try_send(webhook) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(webhook)) => {
                warn!("Webhook queue full, dropping webhook {}", webhook.http_request);
                false
            }
            Err(mpsc::error::TrySendError::Closed(webhook)) => {
                warn!("Webhook queue closed, dropping webhook {}", webhook.http_request);
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Stop accepting webhooks and abort any pending delay.
    pub async fn shutdown(&self) {
        self.sender.lock().take();
        self.cancel.cancel();
        let consumer = self.consumer.lock().take();
        if let Some(consumer) = consumer {
            if let Err(e) = consumer.await {
                warn!("Webhook consumer ended abnormally: {}", e);
            }
        }
        info!("Webhook queue stopped");
    }
}

async fn consume(
    mut rx: mpsc::Receiver<HttpWebhook>,
    client: Arc<dyn HttpClient>,
    cancel: CancellationToken,
) {
    loop {
        let webhook = tokio::select! {
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(webhook) => webhook,
                None => break,
            },
        };
        if let Some(delay) = &webhook.delay {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay.as_duration()) => {}
            }
        }
        let description = webhook.http_request.to_string();
        match client.send(webhook.http_request, None).await {
            Ok(response) => debug!("Webhook {} delivered: {}", description, response.status()),
            Err(e) => warn!("Webhook {} failed: {}", description, e),
        }
    }
    debug!("Webhook consumer exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::client::ClientError;
    use crate::model::{Delay, HttpRequest, HttpResponse, SocketAddress};
    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedSender;

    struct RecordingClient {
        sent: UnboundedSender<String>,
        fail: bool,
    }

    #[async_trait]
    impl HttpClient for RecordingClient {
        async fn send(
            &self,
            request: HttpRequest,
            _target: Option<SocketAddress>,
        ) -> Result<HttpResponse, ClientError> {
            let _ = self.sent.send(request.path_str().to_string());
            if self.fail {
                Err(ClientError::NoTarget)
            } else {
                Ok(HttpResponse::new())
            }
        }
    }

    fn webhook(path: &str, delay: Option<Delay>) -> HttpWebhook {
        HttpWebhook {
            http_request: HttpRequest::new().with_path(path),
            delay,
        }
    }

    #[tokio::test]
    async fn test_delivers_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let queue = WebhookQueue::new(8);
        queue.start(Arc::new(RecordingClient { sent: tx, fail: false }));

        assert!(queue.enqueue(webhook("/first", Some(Delay::milliseconds(20)))));
        assert!(queue.enqueue(webhook("/second", None)));

        assert_eq!(rx.recv().await.as_deref(), Some("/first"));
        assert_eq!(rx.recv().await.as_deref(), Some("/second"));
        queue.shutdown().await;
        assert!(!queue.is_running());
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_consumer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let queue = WebhookQueue::new(8);
        queue.start(Arc::new(RecordingClient { sent: tx, fail: true }));

        queue.enqueue(webhook("/a", None));
        queue.enqueue(webhook("/b", None));
        assert_eq!(rx.recv().await.as_deref(), Some("/a"));
        assert_eq!(rx.recv().await.as_deref(), Some("/b"));
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_before_start_is_rejected() {
        let queue = WebhookQueue::new(1);
        assert!(!queue.enqueue(webhook("/a", None)));
    }

    #[tokio::test]
    async fn test_shutdown_aborts_pending_delay() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let queue = WebhookQueue::new(1);
        queue.start(Arc::new(RecordingClient { sent: tx, fail: false }));
        queue.enqueue(webhook("/slow", Some(Delay::new(crate::model::TimeUnit::Hours, 1))));
        tokio::time::timeout(std::time::Duration::from_secs(5), queue.shutdown())
            .await
            .unwrap();
    }
}
