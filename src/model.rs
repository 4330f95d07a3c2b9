//! Domain and wire types for the dispatch engine.
//!
//! These double as the JSON shapes exchanged with the fleet API and the
//! broker: field names are snake_case on the wire, unknown fields are
//! ignored, and anything the upstream system may omit is an `Option`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Incident snapshot plus the currently active phases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentSituation {
    pub incident: Option<IncidentSnapshot>,
    #[serde(default)]
    pub phases_active: Vec<ActivePhase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncidentSnapshot {
    pub incident_id: Option<Uuid>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub status: Option<String>,
}

impl IncidentSnapshot {
    /// Position of the incident, when both coordinates are known.
    pub fn position(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

/// One active stage of incident response.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivePhase {
    pub incident_phase_id: Uuid,
    pub phase_type_id: Uuid,
    pub priority: Option<i32>,
}

/// Per-incident resource plan: ordered phase requirements plus the
/// availability table used as a remaining-quota signal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourcePlan {
    pub incident_id: Option<Uuid>,
    #[serde(default)]
    pub phase_requirements: Vec<PhaseRequirement>,
    #[serde(default)]
    pub availability: Vec<VehicleAvailability>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhaseRequirement {
    pub phase_type: Option<PhaseTypeRef>,
    #[serde(default)]
    pub groups: Vec<RequirementGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhaseTypeRef {
    pub phase_type_id: Uuid,
    pub code: Option<String>,
    pub label: Option<String>,
}

/// Cluster of vehicle-type requirements combinable via min/max totals.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequirementGroup {
    pub group_id: Option<Uuid>,
    pub label: Option<String>,
    /// Combination rule tag. Informational only.
    pub rule: Option<String>,
    pub min_total: Option<i32>,
    pub max_total: Option<i32>,
    /// Lower value means higher priority; absent sorts last.
    pub priority: Option<i32>,
    pub is_hard: Option<bool>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Requirement {
    pub vehicle_type: Option<VehicleTypeRef>,
    pub min_quantity: Option<i32>,
    pub max_quantity: Option<i32>,
    pub mandatory: Option<bool>,
    /// Lower value is preferred when expanding beyond the floor.
    pub preference_rank: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleTypeRef {
    pub vehicle_type_id: Uuid,
    pub code: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleAvailability {
    pub vehicle_type: Option<VehicleTypeRef>,
    pub available: Option<i32>,
    pub assigned: Option<i32>,
    pub total: Option<i32>,
}

/// A fleet vehicle as listed by the data API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Vehicle {
    pub vehicle_id: Option<Uuid>,
    pub call_sign: Option<String>,
    pub vehicle_type: Option<VehicleTypeRef>,
    /// Fraction of fuel/charge remaining, nominally in `[0, 1]`.
    pub energy_level: Option<f64>,
    pub base_station: Option<BaseStation>,
    pub current_position: Option<VehiclePosition>,
    /// Presence excludes the vehicle from candidate pools.
    pub active_assignment: Option<ActiveAssignment>,
}

impl Vehicle {
    /// Current position when reported, else the base station location.
    pub fn resolved_position(&self) -> Option<GeoPoint> {
        if let Some(position) = &self.current_position {
            if let (Some(latitude), Some(longitude)) = (position.latitude, position.longitude) {
                return Some(GeoPoint {
                    latitude,
                    longitude,
                });
            }
        }
        if let Some(base) = &self.base_station {
            if let (Some(latitude), Some(longitude)) = (base.latitude, base.longitude) {
                return Some(GeoPoint {
                    latitude,
                    longitude,
                });
            }
        }
        None
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaseStation {
    pub station_id: Option<Uuid>,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehiclePosition {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveAssignment {
    pub vehicle_assignment_id: Option<Uuid>,
    pub incident_phase_id: Option<Uuid>,
}

/// Route geometry as GeoJSON LineString coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<Vec<f64>>,
}

/// Distance, travel time and geometry estimation for one route.
#[derive(Debug, Clone, Default)]
pub struct TravelEstimate {
    pub distance_km: Option<f64>,
    pub duration_min: Option<f64>,
    pub geometry: Option<RouteGeometry>,
}

/// Optional global filters applied to candidates before scoring.
#[derive(Debug, Clone, Default)]
pub struct DecisionCriteria {
    pub max_distance_km: Option<f64>,
    pub min_energy_level: Option<f64>,
}

/// Proposed vehicle assignment with a score and rationale for auditing.
#[derive(Debug, Clone, Serialize)]
pub struct VehicleAssignmentProposal {
    pub incident_phase_id: Uuid,
    pub vehicle_id: Uuid,
    pub distance_km: Option<f64>,
    pub estimated_time_min: Option<f64>,
    pub route_geometry: Option<RouteGeometry>,
    pub energy_level: Option<f64>,
    pub score: f64,
    pub rationale: String,
}

/// Outcome of one decision run: proposals plus unmet demand per vehicle
/// type.
#[derive(Debug, Clone, Default)]
pub struct DecisionResult {
    pub proposals: Vec<VehicleAssignmentProposal>,
    pub missing_by_vehicle_type: BTreeMap<Uuid, u32>,
}
