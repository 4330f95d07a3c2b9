//! In-process message broker.
//!
//! [`LocalBroker`] implements the [`MessageBroker`] seam with one consumer
//! thread per queue, delivering messages serially in publish order. It backs
//! the integration tests and stands in for the networked connector in local
//! runs; a production deployment swaps in a connector implementing the same
//! trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;

use tracing::{debug, info};

use crate::traits::{BrokerError, DeliverCallback, MessageBroker};

/// Inbound queue the engine subscribes to.
pub const INCIDENT_QUEUE: &str = "dispatch_engine";
/// Outbound queue assignment proposals are published to.
pub const PROPOSAL_QUEUE: &str = "dispatch_api";

struct QueueState {
    sender: Option<Sender<Vec<u8>>>,
    /// Messages published before a consumer registered.
    backlog: Vec<Vec<u8>>,
    worker: Option<JoinHandle<()>>,
}

struct Registry {
    queues: HashMap<String, QueueState>,
    /// Declaration order, used to drain consumers deterministically on close.
    order: Vec<String>,
}

/// In-process broker with per-queue consumer threads.
pub struct LocalBroker {
    connected: AtomicBool,
    registry: Mutex<Registry>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            registry: Mutex::new(Registry {
                queues: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBroker for LocalBroker {
    fn connect(&self) -> Result<(), BrokerError> {
        if !self.connected.swap(true, Ordering::SeqCst) {
            info!("local broker connected");
        }
        Ok(())
    }

    fn declare_queue(&self, queue: &str, durable: bool) -> Result<(), BrokerError> {
        self.connect()?;
        let mut registry = self.lock_registry();
        if !registry.queues.contains_key(queue) {
            registry.queues.insert(
                queue.to_string(),
                QueueState {
                    sender: None,
                    backlog: Vec::new(),
                    worker: None,
                },
            );
            registry.order.push(queue.to_string());
            debug!(queue, durable, "declared queue");
        }
        Ok(())
    }

    fn publish(&self, queue: &str, message: &str) -> Result<(), BrokerError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrokerError::NotConnected);
        }
        let mut registry = self.lock_registry();
        let state = registry
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;
        match &state.sender {
            Some(sender) => sender
                .send(message.as_bytes().to_vec())
                .map_err(|_| BrokerError::ConsumerGone(queue.to_string())),
            None => {
                state.backlog.push(message.as_bytes().to_vec());
                Ok(())
            }
        }
    }

    fn consume(&self, queue: &str, callback: DeliverCallback) -> Result<(), BrokerError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrokerError::NotConnected);
        }
        let mut registry = self.lock_registry();
        let state = registry
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;
        if state.sender.is_some() {
            return Err(BrokerError::ConsumerExists(queue.to_string()));
        }

        let (sender, receiver) = mpsc::channel::<Vec<u8>>();
        for message in state.backlog.drain(..) {
            // Cannot fail: the receiving end outlives this loop.
            let _ = sender.send(message);
        }
        let worker = std::thread::Builder::new()
            .name(format!("consumer-{queue}"))
            .spawn(move || {
                for body in receiver {
                    callback(&body);
                }
            })
            .map_err(|err| BrokerError::Connection(err.to_string()))?;

        state.sender = Some(sender);
        state.worker = Some(worker);
        debug!(queue, "registered consumer");
        Ok(())
    }

    fn health_check(&self) -> Result<(), BrokerError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::NotConnected)
        }
    }

    /// Stops delivery and joins every consumer thread, in queue-declaration
    /// order, so in-flight messages finish before the broker reports closed.
    /// A handler still running on an earlier queue's consumer can publish to
    /// later queues until its thread drains.
    fn close(&self) {
        if !self.connected.load(Ordering::SeqCst) {
            return;
        }
        let order = {
            let registry = self.lock_registry();
            registry.order.clone()
        };
        for queue in order {
            let worker = {
                let mut registry = self.lock_registry();
                let Some(state) = registry.queues.get_mut(&queue) else {
                    continue;
                };
                state.sender = None;
                state.worker.take()
            };
            if let Some(worker) = worker {
                let _ = worker.join();
            }
        }
        self.connected.store(false, Ordering::SeqCst);
        info!("local broker closed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn collecting_callback(sink: Arc<Mutex<Vec<String>>>) -> DeliverCallback {
        Box::new(move |body| {
            let text = String::from_utf8_lossy(body).to_string();
            sink.lock().unwrap().push(text);
        })
    }

    #[test]
    fn delivers_messages_in_publish_order() {
        let broker = LocalBroker::new();
        broker.connect().unwrap();
        broker.declare_queue("orders", false).unwrap();

        let sink = Arc::new(Mutex::new(Vec::new()));
        broker
            .consume("orders", collecting_callback(Arc::clone(&sink)))
            .unwrap();

        broker.publish("orders", "one").unwrap();
        broker.publish("orders", "two").unwrap();
        broker.publish("orders", "three").unwrap();
        broker.close();

        assert_eq!(*sink.lock().unwrap(), vec!["one", "two", "three"]);
    }

    #[test]
    fn buffers_messages_published_before_consumer() {
        let broker = LocalBroker::new();
        broker.connect().unwrap();
        broker.declare_queue("early", false).unwrap();
        broker.publish("early", "first").unwrap();

        let sink = Arc::new(Mutex::new(Vec::new()));
        broker
            .consume("early", collecting_callback(Arc::clone(&sink)))
            .unwrap();
        broker.close();

        assert_eq!(*sink.lock().unwrap(), vec!["first"]);
    }

    #[test]
    fn publish_to_undeclared_queue_fails() {
        let broker = LocalBroker::new();
        broker.connect().unwrap();
        let err = broker.publish("missing", "x").unwrap_err();
        assert!(matches!(err, BrokerError::UnknownQueue(queue) if queue == "missing"));
    }

    #[test]
    fn second_consumer_is_rejected() {
        let broker = LocalBroker::new();
        broker.connect().unwrap();
        broker.declare_queue("single", false).unwrap();
        broker.consume("single", Box::new(|_| {})).unwrap();

        let err = broker.consume("single", Box::new(|_| {})).unwrap_err();
        assert!(matches!(err, BrokerError::ConsumerExists(_)));
    }

    #[test]
    fn declare_is_idempotent() {
        let broker = LocalBroker::new();
        broker.declare_queue("twice", true).unwrap();
        broker.declare_queue("twice", true).unwrap();

        let sink = Arc::new(Mutex::new(Vec::new()));
        broker
            .consume("twice", collecting_callback(Arc::clone(&sink)))
            .unwrap();
        broker.publish("twice", "still one queue").unwrap();
        broker.close();

        assert_eq!(sink.lock().unwrap().len(), 1);
    }

    #[test]
    fn health_check_requires_connection() {
        let broker = LocalBroker::new();
        assert!(broker.health_check().is_err());
        broker.connect().unwrap();
        assert!(broker.health_check().is_ok());
    }
}
