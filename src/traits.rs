//! Core seams of the dispatch engine.
//!
//! These are intentionally minimal: every external collaborator (data API,
//! broker, relational store) and every swappable policy (scoring) sits
//! behind one of these traits so the decision core can be exercised in
//! isolation.

use uuid::Uuid;

use crate::model::{
    DecisionResult, GeoPoint, IncidentSituation, ResourcePlan, TravelEstimate, Vehicle,
};

/// Abstraction over the external data required for decision making.
///
/// The situation and resource-plan fetches are fatal to a decision run when
/// they fail; vehicle listing and travel estimation failures are handled by
/// the engine itself.
pub trait DecisionDataSource: Send + Sync {
    fn incident_situation(&self, incident_id: Uuid) -> Result<IncidentSituation, DataSourceError>;

    fn resource_plan(&self, incident_id: Uuid) -> Result<ResourcePlan, DataSourceError>;

    fn list_vehicles(&self) -> Result<Vec<Vehicle>, DataSourceError>;

    fn estimate_travel(&self, from: GeoPoint, to: GeoPoint)
    -> Result<TravelEstimate, DataSourceError>;
}

/// Failure while talking to the external data API.
#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("transport failure calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("unexpected status {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },
    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Score and explanatory rationale for one vehicle candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub score: f64,
    pub rationale: String,
}

/// Computes a score and rationale for a vehicle candidate.
///
/// Distance and time are optional: either may be unavailable when the
/// incident or vehicle has no usable position.
pub trait ScoringStrategy: Send + Sync {
    fn score(
        &self,
        vehicle: &Vehicle,
        distance_km: Option<f64>,
        estimated_time_min: Option<f64>,
    ) -> ScoredCandidate;
}

/// Produces vehicle assignment proposals for an incident.
pub trait DecisionEngine: Send + Sync {
    fn propose_assignments(&self, incident_id: Uuid) -> Result<DecisionResult, EngineError>;
}

/// Fatal decision-run failure. Anything recoverable is absorbed inside the
/// engine and never surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to fetch decision data: {0}")]
    DataSource(#[from] DataSourceError),
}

/// Callback invoked with the raw bytes of each delivered message.
pub type DeliverCallback = Box<dyn Fn(&[u8]) + Send + 'static>;

/// Minimal broker operations the engine consumes. The physical connector
/// (AMQP or otherwise) implements this; [`crate::broker::LocalBroker`]
/// provides an in-process implementation.
///
/// Message acknowledgement is automatic on delivery: a consumed message is
/// never redelivered, regardless of what its handler does.
pub trait MessageBroker: Send + Sync {
    fn connect(&self) -> Result<(), BrokerError>;

    /// Declares a queue. Declaring the same queue twice is a no-op.
    fn declare_queue(&self, queue: &str, durable: bool) -> Result<(), BrokerError>;

    fn publish(&self, queue: &str, message: &str) -> Result<(), BrokerError>;

    /// Registers the single consumer for a queue. Deliveries run serially
    /// on one consumer thread per queue.
    fn consume(&self, queue: &str, callback: DeliverCallback) -> Result<(), BrokerError>;

    fn health_check(&self) -> Result<(), BrokerError>;

    fn close(&self);
}

/// Broker operation failure.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker is not connected")]
    NotConnected,
    #[error("queue '{0}' has not been declared")]
    UnknownQueue(String),
    #[error("queue '{0}' already has a consumer")]
    ConsumerExists(String),
    #[error("consumer for queue '{0}' has shut down")]
    ConsumerGone(String),
    #[error("broker connection failed: {0}")]
    Connection(String),
}

/// Relational-store client consumed only by the startup connectivity probe.
/// Pooling and query execution belong to the concrete implementation.
pub trait DatabaseClient {
    fn connect(&self) -> Result<(), DatabaseError>;

    /// A `SELECT 1`-equivalent round trip.
    fn health_check(&self) -> Result<(), DatabaseError>;

    fn close(&self);
}

/// Relational-store failure during the startup probe.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("database connection failed: {0}")]
    Connection(String),
    #[error("database connectivity check failed: {0}")]
    Connectivity(String),
}
