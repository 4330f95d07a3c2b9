//! Vehicle scoring based on distance and time to the incident plus energy
//! level.

use crate::model::Vehicle;
use crate::traits::{ScoredCandidate, ScoringStrategy};

const DISTANCE_WEIGHT: f64 = 0.4;
const TIME_WEIGHT: f64 = 0.4;
const ENERGY_WEIGHT: f64 = 0.2;

/// Weighted-average scoring over distance, travel time and energy level.
///
/// Distance and time contribute inverse-proportional terms when present;
/// a weight only enters the normalizing denominator when its metric is
/// available, so missing data narrows the average instead of dragging the
/// score down. Energy is always weighed, clamped to `[0, 1]`, absent
/// counting as empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceEnergyScoring;

impl ScoringStrategy for DistanceEnergyScoring {
    fn score(
        &self,
        vehicle: &Vehicle,
        distance_km: Option<f64>,
        estimated_time_min: Option<f64>,
    ) -> ScoredCandidate {
        let distance_score = invert_positive(distance_km);
        let time_score = invert_positive(estimated_time_min);
        let energy_score = vehicle.energy_level.map(clamp_unit).unwrap_or(0.0);

        let mut weight_sum = ENERGY_WEIGHT;
        let mut weighted_distance = 0.0;
        let mut weighted_time = 0.0;
        if distance_km.is_some() {
            weight_sum += DISTANCE_WEIGHT;
            weighted_distance = distance_score * DISTANCE_WEIGHT;
        }
        if estimated_time_min.is_some() {
            weight_sum += TIME_WEIGHT;
            weighted_time = time_score * TIME_WEIGHT;
        }

        if weight_sum <= 0.0 {
            return ScoredCandidate {
                score: 0.0,
                rationale: "no metrics available for scoring".to_string(),
            };
        }

        let score = (weighted_distance + weighted_time + energy_score * ENERGY_WEIGHT) / weight_sum;
        let rationale = format!(
            "distance_km={}, estimated_time_min={}, energy_level={}",
            format_metric(distance_km),
            format_metric(estimated_time_min),
            format_metric(vehicle.energy_level),
        );

        ScoredCandidate { score, rationale }
    }
}

fn invert_positive(value: Option<f64>) -> f64 {
    match value {
        None => 0.0,
        Some(value) => 1.0 / (1.0 + value.max(0.0)),
    }
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn format_metric(value: Option<f64>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "none".to_string(),
    }
}
