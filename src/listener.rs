//! Queue listener: consumes the configured queues and routes messages to
//! the event dispatcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info};

use crate::events::{EventDispatcher, parse_event};
use crate::traits::{BrokerError, MessageBroker};

/// Invalid listener construction.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("at least one queue is required")]
    NoQueues,
}

/// Consumes queues and routes messages to an [`EventDispatcher`].
///
/// Lifecycle is NotStarted -> Listening -> Stopped: starting twice is a
/// no-op, as is stopping before starting. Messages are acknowledged on
/// delivery; a malformed or failing message is discarded, never redelivered.
pub struct QueueListener {
    broker: Arc<dyn MessageBroker>,
    queues: Vec<String>,
    durable: bool,
    dispatcher: Arc<EventDispatcher>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl QueueListener {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        queues: Vec<String>,
        durable: bool,
        dispatcher: EventDispatcher,
    ) -> Result<Self, ListenerError> {
        if queues.is_empty() {
            return Err(ListenerError::NoQueues);
        }
        Ok(Self {
            broker,
            queues,
            durable,
            dispatcher: Arc::new(dispatcher),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    /// Connects, declares each queue, and registers one consumer per queue.
    pub fn start(&self) -> Result<(), BrokerError> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        self.broker.connect()?;
        for queue in &self.queues {
            self.broker.declare_queue(queue, self.durable)?;
            let dispatcher = Arc::clone(&self.dispatcher);
            let queue_name = queue.clone();
            self.broker.consume(
                queue,
                Box::new(move |body| deliver(&dispatcher, &queue_name, body)),
            )?;
            info!(queue = %queue, "listening to queue");
        }
        Ok(())
    }

    /// Closes the broker connection. Idempotent; a listener that never
    /// started stays untouched.
    pub fn stop(&self) {
        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        if self
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        self.broker.close();
        info!("queue listener stopped");
    }
}

/// One delivery: decode UTF-8, parse the envelope, dispatch. Failures are
/// logged and the message is dropped so the queue keeps flowing.
fn deliver(dispatcher: &EventDispatcher, queue: &str, body: &[u8]) {
    let payload = match std::str::from_utf8(body) {
        Ok(payload) => payload,
        Err(err) => {
            error!(queue, error = %err, "discarding non-UTF-8 message");
            return;
        }
    };
    match parse_event(payload) {
        Ok(message) => dispatcher.dispatch(&message),
        Err(err) => {
            error!(queue, payload, error = %err, "discarding invalid message");
        }
    }
}
