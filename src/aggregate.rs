//! Requirement aggregation: expands one requirement group into concrete
//! per-vehicle-type counts.

use std::collections::HashMap;

use uuid::Uuid;

use crate::model::{Requirement, RequirementGroup};

/// Expands a requirement group into `(vehicle_type_id, count)` pairs in
/// first-seen requirement order.
///
/// Each requirement contributes its `min_quantity` floor (negative or absent
/// counts as zero). The group total is then raised to `min_total` and capped
/// at `max_total` when those bounds are set; any units above the floor sum
/// are handed out one at a time, round-robin over the requirements sorted by
/// ascending preference rank (absent rank sorts last), wrapping around until
/// none remain. A requirement without a vehicle-type reference still consumes
/// its rotation slot; the unit it would have received is dropped.
pub fn aggregate_group(group: &RequirementGroup) -> Vec<(Uuid, u32)> {
    let mut counts: Vec<(Uuid, u32)> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    if group.requirements.is_empty() {
        return counts;
    }

    let mut bump = |counts: &mut Vec<(Uuid, u32)>, vehicle_type_id: Uuid, amount: u32| {
        let slot = *index.entry(vehicle_type_id).or_insert_with(|| {
            counts.push((vehicle_type_id, 0));
            counts.len() - 1
        });
        counts[slot].1 += amount;
    };

    let mut group_total: u32 = 0;
    for requirement in &group.requirements {
        let floor = floor_quantity(requirement);
        group_total += floor;
        if let Some(vehicle_type) = &requirement.vehicle_type {
            bump(&mut counts, vehicle_type.vehicle_type_id, floor);
        }
    }

    let mut target_total = group_total;
    if let Some(min_total) = group.min_total {
        target_total = target_total.max(min_total.max(0) as u32);
    }
    if let Some(max_total) = group.max_total {
        target_total = target_total.min(max_total.max(0) as u32);
    }

    if target_total > group_total {
        let mut rotation: Vec<&Requirement> = group.requirements.iter().collect();
        rotation.sort_by_key(|requirement| {
            requirement
                .preference_rank
                .map(i64::from)
                .unwrap_or(i64::MAX)
        });

        let mut remaining = target_total - group_total;
        let mut slot = 0usize;
        while remaining > 0 {
            let requirement = rotation[slot % rotation.len()];
            if let Some(vehicle_type) = &requirement.vehicle_type {
                bump(&mut counts, vehicle_type.vehicle_type_id, 1);
            }
            remaining -= 1;
            slot += 1;
        }
    }

    counts.retain(|(_, count)| *count > 0);
    counts
}

fn floor_quantity(requirement: &Requirement) -> u32 {
    requirement.min_quantity.unwrap_or(0).max(0) as u32
}
