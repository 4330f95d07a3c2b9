//! Vehicle assignment decision engine.
//!
//! One decision run fetches the incident situation and resource plan, pools
//! scored candidates per vehicle type, then allocates greedily across phases
//! in resource-plan order and groups by ascending priority. The allocation is
//! a deterministic single pass: no backtracking, no rebalancing between
//! phases.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::collections::hash_map::Entry;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::aggregate::aggregate_group;
use crate::haversine;
use crate::model::{
    ActivePhase, DecisionCriteria, DecisionResult, GeoPoint, ResourcePlan, RouteGeometry, Vehicle,
    VehicleAssignmentProposal,
};
use crate::traits::{
    DecisionDataSource, DecisionEngine, EngineError, ScoredCandidate, ScoringStrategy,
};

/// Scored vehicle candidate. Rebuilt from scratch on every decision run,
/// never persisted.
#[derive(Debug, Clone)]
struct VehicleCandidate {
    vehicle_id: Uuid,
    energy_level: Option<f64>,
    distance_km: Option<f64>,
    estimated_time_min: Option<f64>,
    route_geometry: Option<RouteGeometry>,
    score: f64,
    rationale: String,
}

/// Decision engine that proposes vehicles for an incident's active phases.
pub struct AssignmentEngine<D, S> {
    data_source: D,
    scoring: S,
    criteria: DecisionCriteria,
}

impl<D, S> AssignmentEngine<D, S>
where
    D: DecisionDataSource,
    S: ScoringStrategy,
{
    pub fn new(data_source: D, scoring: S, criteria: DecisionCriteria) -> Self {
        Self {
            data_source,
            scoring,
            criteria,
        }
    }

    /// Builds one sorted candidate pool per required vehicle type.
    ///
    /// Vehicles holding an active assignment are excluded. Travel estimates
    /// are requested only when both positions are known; an estimate failure
    /// degrades to the great-circle distance and leaves the travel time
    /// unknown.
    fn build_candidate_pools(
        &self,
        vehicles: &[Vehicle],
        required_types: &HashSet<Uuid>,
        incident_position: Option<GeoPoint>,
    ) -> HashMap<Uuid, Vec<VehicleCandidate>> {
        let mut pools: HashMap<Uuid, Vec<VehicleCandidate>> = HashMap::new();
        if required_types.is_empty() {
            return pools;
        }

        for vehicle in vehicles {
            let Some(vehicle_id) = vehicle.vehicle_id else {
                continue;
            };
            let Some(vehicle_type_id) = vehicle
                .vehicle_type
                .as_ref()
                .map(|vehicle_type| vehicle_type.vehicle_type_id)
            else {
                continue;
            };
            if !required_types.contains(&vehicle_type_id) {
                continue;
            }
            if vehicle.active_assignment.is_some() {
                continue;
            }

            let vehicle_position = vehicle.resolved_position();
            let mut distance_km = None;
            let mut estimated_time_min = None;
            let mut route_geometry = None;
            if let (Some(incident), Some(position)) = (incident_position, vehicle_position) {
                match self.data_source.estimate_travel(position, incident) {
                    Ok(estimate) => {
                        distance_km = estimate.distance_km;
                        estimated_time_min = estimate.duration_min;
                        route_geometry = estimate.geometry;
                    }
                    Err(err) => {
                        warn!(
                            vehicle = %vehicle_id,
                            error = %err,
                            "travel estimate failed, using great-circle fallback"
                        );
                    }
                }
                if distance_km.is_none() {
                    distance_km = Some(haversine::distance_km(position, incident));
                }
            }

            if !self.matches_criteria(vehicle, distance_km) {
                continue;
            }

            let ScoredCandidate { score, rationale } =
                self.scoring
                    .score(vehicle, distance_km, estimated_time_min);
            pools
                .entry(vehicle_type_id)
                .or_default()
                .push(VehicleCandidate {
                    vehicle_id,
                    energy_level: vehicle.energy_level,
                    distance_km,
                    estimated_time_min,
                    route_geometry,
                    score,
                    rationale,
                });
        }

        for pool in pools.values_mut() {
            pool.sort_by(candidate_ordering);
        }

        pools
    }

    fn matches_criteria(&self, vehicle: &Vehicle, distance_km: Option<f64>) -> bool {
        if let Some(min_energy) = self.criteria.min_energy_level {
            if vehicle.energy_level.unwrap_or(0.0) < min_energy {
                return false;
            }
        }
        if let Some(max_distance) = self.criteria.max_distance_km {
            match distance_km {
                None => return false,
                Some(distance) if distance > max_distance => return false,
                Some(_) => {}
            }
        }
        true
    }
}

impl<D, S> DecisionEngine for AssignmentEngine<D, S>
where
    D: DecisionDataSource,
    S: ScoringStrategy,
{
    fn propose_assignments(&self, incident_id: Uuid) -> Result<DecisionResult, EngineError> {
        let situation = self.data_source.incident_situation(incident_id)?;
        let plan = self.data_source.resource_plan(incident_id)?;

        let incident_position = situation
            .incident
            .as_ref()
            .and_then(|incident| incident.position());
        if incident_position.is_none() {
            warn!(
                incident = %incident_id,
                "incident has no usable coordinates, distance metrics unavailable"
            );
        }

        let required_types = referenced_vehicle_types(&plan);
        if required_types.is_empty() {
            debug!(incident = %incident_id, "resource plan references no vehicle types");
            return Ok(DecisionResult::default());
        }

        let selected_phases = select_active_phases(&situation.phases_active);
        let vehicles = self.data_source.list_vehicles()?;
        let pools = self.build_candidate_pools(&vehicles, &required_types, incident_position);
        let mut quota = availability_quota(&plan);

        let mut allocated: HashSet<Uuid> = HashSet::new();
        let mut proposals: Vec<VehicleAssignmentProposal> = Vec::new();
        let mut missing: BTreeMap<Uuid, u32> = BTreeMap::new();

        for phase_requirement in &plan.phase_requirements {
            let Some(phase_type_id) = phase_requirement
                .phase_type
                .as_ref()
                .map(|phase_type| phase_type.phase_type_id)
            else {
                continue;
            };
            let Some(phase) = selected_phases.get(&phase_type_id) else {
                debug!(
                    phase_type = %phase_type_id,
                    "no active phase instance for phase type, skipping"
                );
                continue;
            };
            if phase_requirement.groups.is_empty() {
                warn!(
                    phase_type = %phase_type_id,
                    incident_phase = %phase.incident_phase_id,
                    "phase requirement has no groups, check resource plan data"
                );
                continue;
            }

            let mut groups: Vec<_> = phase_requirement.groups.iter().collect();
            groups.sort_by_key(|group| group.priority.map(i64::from).unwrap_or(i64::MAX));

            for group in groups {
                for (vehicle_type_id, needed) in aggregate_group(group) {
                    let askable = match quota.get(&vehicle_type_id) {
                        Some(remaining) => needed.min(*remaining),
                        None => needed,
                    };
                    let pulled = pull_candidates(
                        pools.get(&vehicle_type_id),
                        &mut allocated,
                        askable,
                        phase.incident_phase_id,
                        &mut proposals,
                    );
                    if let Some(remaining) = quota.get_mut(&vehicle_type_id) {
                        *remaining -= pulled;
                    }
                    if pulled < needed {
                        *missing.entry(vehicle_type_id).or_insert(0) += needed - pulled;
                    }
                }
            }
        }

        debug!(
            incident = %incident_id,
            proposals = proposals.len(),
            missing_types = missing.len(),
            "decision run completed"
        );

        Ok(DecisionResult {
            proposals,
            missing_by_vehicle_type: missing,
        })
    }
}

/// Picks the active phase per phase type: highest priority wins, first seen
/// wins ties.
fn select_active_phases(phases: &[ActivePhase]) -> HashMap<Uuid, &ActivePhase> {
    let mut selected: HashMap<Uuid, &ActivePhase> = HashMap::new();
    for phase in phases {
        match selected.entry(phase.phase_type_id) {
            Entry::Vacant(entry) => {
                entry.insert(phase);
            }
            Entry::Occupied(mut entry) => {
                let current = entry.get().priority.unwrap_or(i32::MIN);
                let candidate = phase.priority.unwrap_or(i32::MIN);
                if candidate > current {
                    entry.insert(phase);
                }
            }
        }
    }
    selected
}

/// Every vehicle type referenced anywhere in the plan's requirement groups.
fn referenced_vehicle_types(plan: &ResourcePlan) -> HashSet<Uuid> {
    let mut types = HashSet::new();
    for phase_requirement in &plan.phase_requirements {
        for group in &phase_requirement.groups {
            for requirement in &group.requirements {
                if let Some(vehicle_type) = &requirement.vehicle_type {
                    types.insert(vehicle_type.vehicle_type_id);
                }
            }
        }
    }
    types
}

/// Remaining-quota signal from the plan's availability table. Types without
/// an entry are uncapped.
fn availability_quota(plan: &ResourcePlan) -> HashMap<Uuid, u32> {
    let mut quota = HashMap::new();
    for availability in &plan.availability {
        let Some(vehicle_type) = &availability.vehicle_type else {
            continue;
        };
        let Some(available) = availability.available else {
            continue;
        };
        quota.insert(vehicle_type.vehicle_type_id, available.max(0) as u32);
    }
    quota
}

/// Greedily pulls up to `needed` unallocated candidates off a sorted pool,
/// emitting one proposal per pull. Returns how many were pulled.
fn pull_candidates(
    pool: Option<&Vec<VehicleCandidate>>,
    allocated: &mut HashSet<Uuid>,
    needed: u32,
    incident_phase_id: Uuid,
    proposals: &mut Vec<VehicleAssignmentProposal>,
) -> u32 {
    let Some(pool) = pool else {
        return 0;
    };
    if needed == 0 {
        return 0;
    }

    let mut pulled = 0u32;
    for candidate in pool {
        if allocated.contains(&candidate.vehicle_id) {
            continue;
        }
        allocated.insert(candidate.vehicle_id);
        proposals.push(VehicleAssignmentProposal {
            incident_phase_id,
            vehicle_id: candidate.vehicle_id,
            distance_km: candidate.distance_km,
            estimated_time_min: candidate.estimated_time_min,
            route_geometry: candidate.route_geometry.clone(),
            energy_level: candidate.energy_level,
            score: candidate.score,
            rationale: candidate.rationale.clone(),
        });
        pulled += 1;
        if pulled >= needed {
            break;
        }
    }
    pulled
}

/// Canonical candidate ordering: score descending, then estimated time
/// ascending, then distance ascending. Absent time/distance sorts last.
fn candidate_ordering(a: &VehicleCandidate, b: &VehicleCandidate) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| {
        a.estimated_time_min
            .unwrap_or(f64::INFINITY)
            .total_cmp(&b.estimated_time_min.unwrap_or(f64::INFINITY))
            .then_with(|| {
                a.distance_km
                    .unwrap_or(f64::INFINITY)
                    .total_cmp(&b.distance_km.unwrap_or(f64::INFINITY))
            })
    })
}
