//! Arc elasticity and the reducers that turn engine output into labelled
//! PED and XED results.
//!
//! An undefined elasticity is `None`. Infinite values are real outcomes of
//! the arc formula when price holds still and quantity moves.

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::types::{PedPoint, PedResult, XedResult, XedSample};

const UNIT_ELASTIC_TOLERANCE: f64 = 1e-9;

/// Midpoint (arc) elasticity of quantity with respect to price.
///
/// - zero average quantity or price → `None`
/// - constant price, constant quantity → `0.0`
/// - constant price, moving quantity → `±inf` in the direction of quantity
pub fn arc_elasticity(q1: f64, q2: f64, p1: f64, p2: f64) -> Option<f64> {
    let avg_q = (q1 + q2) / 2.0;
    let avg_p = (p1 + p2) / 2.0;

    if avg_q == 0.0 || avg_p == 0.0 {
        return None;
    }

    if p1 == p2 {
        return Some(if q1 == q2 {
            0.0
        } else if q2 > q1 {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        });
    }

    let pct_q = (q2 - q1) / avg_q;
    let pct_p = (p2 - p1) / avg_p;
    Some(pct_q / pct_p)
}

// === LABELS ===

/// How own-price demand responds, by magnitude of PED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub enum DemandResponse {
    Undefined,
    PerfectlyInelastic,
    Inelastic,
    UnitElastic,
    Elastic,
    PerfectlyElastic,
}

impl DemandResponse {
    pub fn classify(ped: Option<f64>) -> Self {
        let Some(value) = ped else {
            return Self::Undefined;
        };
        let magnitude = value.abs();
        if magnitude.is_infinite() {
            Self::PerfectlyElastic
        } else if magnitude == 0.0 {
            Self::PerfectlyInelastic
        } else if (magnitude - 1.0).abs() <= UNIT_ELASTIC_TOLERANCE {
            Self::UnitElastic
        } else if magnitude > 1.0 {
            Self::Elastic
        } else {
            Self::Inelastic
        }
    }
}

/// Relationship between two items implied by the sign of XED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub enum CrossRelation {
    Undefined,
    Substitutes,
    Complements,
    Independent,
}

impl CrossRelation {
    pub fn classify(xed: Option<f64>) -> Self {
        match xed {
            None => Self::Undefined,
            Some(v) if v > 0.0 => Self::Substitutes,
            Some(v) if v < 0.0 => Self::Complements,
            Some(_) => Self::Independent,
        }
    }
}

// === REDUCERS ===

/// Index of the baseline point: the first explicitly flagged one, else the
/// first zero-change point.
fn baseline_index(points: &[PedPoint]) -> Option<usize> {
    points
        .iter()
        .position(|p| p.is_baseline == Some(true))
        .or_else(|| points.iter().position(|p| p.percentage_change == 0.0))
}

/// PED of every non-baseline point against the baseline, in input order.
///
/// Empty when fewer than two points are given or no baseline can be found.
pub fn ped_from_sweep(points: &[PedPoint]) -> Vec<PedResult> {
    if points.len() < 2 {
        return Vec::new();
    }
    let Some(base_idx) = baseline_index(points) else {
        return Vec::new();
    };
    let baseline = &points[base_idx];

    points
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != base_idx)
        .map(|(_, point)| {
            let ped_value = arc_elasticity(
                baseline.demand as f64,
                point.demand as f64,
                baseline.price,
                point.price,
            );
            PedResult {
                percentage_change_price: point.percentage_change,
                original_price: baseline.price,
                new_price: point.price,
                original_demand: baseline.demand,
                new_demand: point.demand,
                ped_value,
                label: DemandResponse::classify(ped_value),
            }
        })
        .collect()
}

/// XED for a baseline/scenario pair. `None` when any field is missing.
pub fn xed_from_pair(sample: &XedSample) -> Option<XedResult> {
    let q_target_base = sample.q_target_base?;
    let q_target_scenario = sample.q_target_scenario?;
    let p_affecting_base = sample.p_affecting_base?;
    let p_affecting_scenario = sample.p_affecting_scenario?;

    let xed_value = arc_elasticity(
        q_target_base as f64,
        q_target_scenario as f64,
        p_affecting_base,
        p_affecting_scenario,
    );

    Some(XedResult {
        target_item_id: sample.target_item_id.clone()?,
        target_item_name: sample.target_item_name.clone()?,
        affecting_item_id: sample.affecting_item_id.clone()?,
        affecting_item_name: sample.affecting_item_name.clone()?,
        q_target_base,
        q_target_scenario,
        p_affecting_base,
        p_affecting_scenario,
        percentage_change_p_affecting: sample.percentage_change_p_affecting?,
        xed_value,
        label: CrossRelation::classify(xed_value),
    })
}
