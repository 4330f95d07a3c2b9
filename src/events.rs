//! Event envelopes and dispatch-by-key.
//!
//! Inbound messages are JSON objects carrying a top-level `event` string;
//! the body stays untyped so each handler can decode its own payload shape.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{error, warn};

/// Envelope describing an incoming message with its event key. The raw
/// payload is kept alongside the parsed body for logging.
#[derive(Debug, Clone)]
pub struct EventMessage {
    pub event_key: String,
    pub body: Value,
    pub raw: String,
}

/// Failure to turn a raw payload into an [`EventMessage`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload does not contain a non-empty 'event' field")]
    MissingEventKey,
}

/// Parses a raw broker payload into an event envelope.
pub fn parse_event(payload: &str) -> Result<EventMessage, ParseError> {
    let body: Value = serde_json::from_str(payload)?;
    let event_key = body
        .get("event")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(ParseError::MissingEventKey)?
        .to_string();

    Ok(EventMessage {
        event_key,
        body,
        raw: payload.to_string(),
    })
}

/// Handler error. Dispatch logs it and moves on; it never propagates past
/// the dispatch boundary.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Handles a specific event key coming from the consumed queues.
pub trait EventHandler: Send + Sync {
    /// The event key this handler responds to.
    fn event_key(&self) -> &str;

    fn handle(&self, message: &EventMessage) -> Result<(), HandlerError>;
}

/// Invalid handler set at construction time.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("handler provided an empty event key")]
    EmptyEventKey,
    #[error("duplicate handler registration for event '{0}'")]
    Duplicate(String),
}

/// Dispatches an event to the matching handler.
pub struct EventDispatcher {
    handlers: HashMap<String, Box<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new(handlers: Vec<Box<dyn EventHandler>>) -> Result<Self, RegistrationError> {
        let mut by_key: HashMap<String, Box<dyn EventHandler>> = HashMap::new();
        for handler in handlers {
            let event_key = handler.event_key().trim().to_string();
            if event_key.is_empty() {
                return Err(RegistrationError::EmptyEventKey);
            }
            if by_key.contains_key(&event_key) {
                return Err(RegistrationError::Duplicate(event_key));
            }
            by_key.insert(event_key, handler);
        }
        Ok(Self { handlers: by_key })
    }

    /// Routes one message. An unmatched event key is dropped with a warning;
    /// a failing handler is logged with the offending payload and does not
    /// disturb subsequent messages.
    pub fn dispatch(&self, message: &EventMessage) {
        let Some(handler) = self.handlers.get(&message.event_key) else {
            warn!(event = %message.event_key, "no handler registered for event");
            return;
        };
        if let Err(err) = handler.handle(message) {
            error!(
                event = %message.event_key,
                payload = %message.raw,
                error = %err,
                "event handler failed"
            );
        }
    }
}
