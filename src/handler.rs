//! Incident handler: glues an inbound incident event to a published
//! assignment proposal.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::broker::PROPOSAL_QUEUE;
use crate::events::{EventHandler, EventMessage, HandlerError};
use crate::model::{DecisionResult, VehicleAssignmentProposal};
use crate::traits::{DecisionEngine, MessageBroker};

/// Event key consumed by this handler.
pub const NEW_INCIDENT: &str = "new_incident";
/// Event key of the published proposal envelope.
pub const VEHICLE_ASSIGNMENT_PROPOSAL: &str = "vehicle_assignment_proposal";

#[derive(Serialize)]
struct ProposalEnvelope<'a> {
    event: &'static str,
    payload: ProposalPayload<'a>,
}

#[derive(Serialize)]
struct ProposalPayload<'a> {
    proposal_id: Uuid,
    incident_id: Uuid,
    generated_at: String,
    proposals: &'a [VehicleAssignmentProposal],
    missing_by_vehicle_type: BTreeMap<String, u32>,
}

/// Runs the decision engine for each new incident and publishes the
/// resulting proposal envelope.
pub struct IncidentHandler {
    broker: Arc<dyn MessageBroker>,
    durable_queue: bool,
    engine: Box<dyn DecisionEngine>,
    proposal_queue_declared: AtomicBool,
}

impl IncidentHandler {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        durable_queue: bool,
        engine: Box<dyn DecisionEngine>,
    ) -> Self {
        Self {
            broker,
            durable_queue,
            engine,
            proposal_queue_declared: AtomicBool::new(false),
        }
    }

    /// Declares the outbound queue exactly once, on the first message.
    fn ensure_proposal_queue(&self) -> Result<(), HandlerError> {
        if self
            .proposal_queue_declared
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.broker.declare_queue(PROPOSAL_QUEUE, self.durable_queue)?;
        }
        Ok(())
    }

    fn publish_proposal(&self, incident_id: Uuid, result: &DecisionResult) {
        let envelope = ProposalEnvelope {
            event: VEHICLE_ASSIGNMENT_PROPOSAL,
            payload: ProposalPayload {
                proposal_id: Uuid::new_v4(),
                incident_id,
                generated_at: Utc::now().to_rfc3339(),
                proposals: &result.proposals,
                missing_by_vehicle_type: result
                    .missing_by_vehicle_type
                    .iter()
                    .map(|(vehicle_type_id, count)| (vehicle_type_id.to_string(), *count))
                    .collect(),
            },
        };

        let message = match serde_json::to_string(&envelope) {
            Ok(message) => message,
            Err(err) => {
                error!(
                    incident = %incident_id,
                    error = %err,
                    "failed to serialize assignment proposal"
                );
                return;
            }
        };
        match self.broker.publish(PROPOSAL_QUEUE, &message) {
            Ok(()) => info!(
                queue = PROPOSAL_QUEUE,
                incident = %incident_id,
                "sent assignment proposal"
            ),
            Err(err) => error!(
                incident = %incident_id,
                error = %err,
                "failed to publish assignment proposal"
            ),
        }
    }
}

impl EventHandler for IncidentHandler {
    fn event_key(&self) -> &str {
        NEW_INCIDENT
    }

    fn handle(&self, message: &EventMessage) -> Result<(), HandlerError> {
        self.ensure_proposal_queue()?;
        info!(payload = %message.raw, "processing new incident event");

        let Some(incident_id) = extract_incident_id(&message.body) else {
            return Ok(());
        };

        let result = self.engine.propose_assignments(incident_id)?;
        log_decision_result(incident_id, &result);
        self.publish_proposal(incident_id, &result);
        Ok(())
    }
}

/// Pulls `payload.incident_id` out of the envelope body. Each failure mode
/// is logged; the message is dropped rather than retried.
fn extract_incident_id(body: &Value) -> Option<Uuid> {
    let Some(payload) = body.get("payload") else {
        warn!("missing payload in event message");
        return None;
    };
    let Some(raw_id) = payload.get("incident_id").and_then(Value::as_str) else {
        warn!("missing or invalid incident_id in payload");
        return None;
    };
    match Uuid::parse_str(raw_id) {
        Ok(incident_id) => Some(incident_id),
        Err(_) => {
            warn!(incident_id = raw_id, "invalid incident_id format");
            None
        }
    }
}

fn log_decision_result(incident_id: Uuid, result: &DecisionResult) {
    info!(
        incident = %incident_id,
        proposals = result.proposals.len(),
        missing_types = result.missing_by_vehicle_type.len(),
        "decision proposals generated"
    );
    if !result.missing_by_vehicle_type.is_empty() {
        warn!(
            incident = %incident_id,
            missing = ?result.missing_by_vehicle_type,
            "unmet vehicle demand after allocation"
        );
    }
}
