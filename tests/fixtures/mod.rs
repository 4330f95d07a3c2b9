//! Shared fixtures for dispatch-engine integration tests.
//!
//! Builders for situations, plans and vehicles, plus a mock data source
//! implementing the `DecisionDataSource` seam.
#![allow(dead_code)]

use dispatch_engine::haversine;
use dispatch_engine::model::{
    ActivePhase, GeoPoint, IncidentSituation, IncidentSnapshot, PhaseRequirement, PhaseTypeRef,
    Requirement, RequirementGroup, ResourcePlan, RouteGeometry, TravelEstimate, Vehicle,
    VehicleAvailability, VehiclePosition, VehicleTypeRef,
};
use dispatch_engine::traits::{DataSourceError, DecisionDataSource};
use uuid::Uuid;

pub fn type_ref(vehicle_type_id: Uuid) -> VehicleTypeRef {
    VehicleTypeRef {
        vehicle_type_id,
        code: None,
        label: None,
    }
}

pub fn phase_type(phase_type_id: Uuid) -> PhaseTypeRef {
    PhaseTypeRef {
        phase_type_id,
        code: None,
        label: None,
    }
}

pub fn active_phase(incident_phase_id: Uuid, phase_type_id: Uuid, priority: i32) -> ActivePhase {
    ActivePhase {
        incident_phase_id,
        phase_type_id,
        priority: Some(priority),
    }
}

pub fn requirement(vehicle_type_id: Uuid, min_quantity: i32) -> Requirement {
    Requirement {
        vehicle_type: Some(type_ref(vehicle_type_id)),
        min_quantity: Some(min_quantity),
        max_quantity: None,
        mandatory: Some(true),
        preference_rank: None,
    }
}

pub fn group(requirements: Vec<Requirement>) -> RequirementGroup {
    RequirementGroup {
        requirements,
        ..RequirementGroup::default()
    }
}

pub fn phase_requirement(phase_type_id: Uuid, groups: Vec<RequirementGroup>) -> PhaseRequirement {
    PhaseRequirement {
        phase_type: Some(phase_type(phase_type_id)),
        groups,
    }
}

pub fn plan(phase_requirements: Vec<PhaseRequirement>) -> ResourcePlan {
    ResourcePlan {
        incident_id: None,
        phase_requirements,
        availability: Vec::new(),
    }
}

pub fn availability(vehicle_type_id: Uuid, available: i32) -> VehicleAvailability {
    VehicleAvailability {
        vehicle_type: Some(type_ref(vehicle_type_id)),
        available: Some(available),
        assigned: Some(0),
        total: Some(available),
    }
}

pub fn situation_at(
    latitude: f64,
    longitude: f64,
    phases_active: Vec<ActivePhase>,
) -> IncidentSituation {
    IncidentSituation {
        incident: Some(IncidentSnapshot {
            incident_id: None,
            latitude: Some(latitude),
            longitude: Some(longitude),
            address: None,
            city: None,
            status: None,
        }),
        phases_active,
    }
}

pub fn situation_without_location(phases_active: Vec<ActivePhase>) -> IncidentSituation {
    IncidentSituation {
        incident: Some(IncidentSnapshot {
            incident_id: None,
            latitude: None,
            longitude: None,
            address: None,
            city: None,
            status: None,
        }),
        phases_active,
    }
}

pub fn vehicle_at(
    vehicle_id: Uuid,
    vehicle_type_id: Uuid,
    latitude: f64,
    longitude: f64,
) -> Vehicle {
    Vehicle {
        vehicle_id: Some(vehicle_id),
        vehicle_type: Some(type_ref(vehicle_type_id)),
        energy_level: Some(0.8),
        current_position: Some(VehiclePosition {
            latitude: Some(latitude),
            longitude: Some(longitude),
            timestamp: None,
        }),
        ..Vehicle::default()
    }
}

pub type TravelFn =
    Box<dyn Fn(GeoPoint, GeoPoint) -> Result<TravelEstimate, DataSourceError> + Send + Sync>;

fn transport_error(endpoint: &str) -> DataSourceError {
    DataSourceError::Transport {
        endpoint: endpoint.to_string(),
        source: "connection refused".into(),
    }
}

/// Travel estimation that always fails, forcing the great-circle fallback.
pub fn failing_travel() -> TravelFn {
    Box::new(|_, _| Err(transport_error("routing/route")))
}

/// Travel estimation derived from great-circle distance at a fixed speed,
/// with a straight-line geometry.
pub fn fixed_speed_travel(speed_kmh: f64) -> TravelFn {
    Box::new(move |from, to| {
        let distance_km = haversine::distance_km(from, to);
        Ok(TravelEstimate {
            distance_km: Some(distance_km),
            duration_min: Some(distance_km / speed_kmh * 60.0),
            geometry: Some(RouteGeometry {
                kind: "LineString".to_string(),
                coordinates: vec![
                    vec![from.longitude, from.latitude],
                    vec![to.longitude, to.latitude],
                ],
            }),
        })
    })
}

/// In-memory `DecisionDataSource`. A `None` situation or plan makes the
/// corresponding fetch fail.
pub struct MockDataSource {
    pub situation: Option<IncidentSituation>,
    pub plan: Option<ResourcePlan>,
    pub vehicles: Vec<Vehicle>,
    pub travel: TravelFn,
}

impl MockDataSource {
    pub fn new(situation: IncidentSituation, plan: ResourcePlan, vehicles: Vec<Vehicle>) -> Self {
        Self {
            situation: Some(situation),
            plan: Some(plan),
            vehicles,
            travel: failing_travel(),
        }
    }

    pub fn with_travel(mut self, travel: TravelFn) -> Self {
        self.travel = travel;
        self
    }

    pub fn unreachable() -> Self {
        Self {
            situation: None,
            plan: None,
            vehicles: Vec::new(),
            travel: failing_travel(),
        }
    }
}

impl DecisionDataSource for MockDataSource {
    fn incident_situation(&self, _incident_id: Uuid) -> Result<IncidentSituation, DataSourceError> {
        self.situation
            .clone()
            .ok_or_else(|| transport_error("incidents/situation"))
    }

    fn resource_plan(&self, _incident_id: Uuid) -> Result<ResourcePlan, DataSourceError> {
        self.plan
            .clone()
            .ok_or_else(|| transport_error("incidents/resource-plan"))
    }

    fn list_vehicles(&self) -> Result<Vec<Vehicle>, DataSourceError> {
        Ok(self.vehicles.clone())
    }

    fn estimate_travel(
        &self,
        from: GeoPoint,
        to: GeoPoint,
    ) -> Result<TravelEstimate, DataSourceError> {
        (self.travel)(from, to)
    }
}
