use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::elasticity::{CrossRelation, DemandResponse};

// === CORE TYPES ===

pub type ItemId = String;
pub type Price = f64;
pub type Demand = u64;

// ============================================================================
// Menu - What customers choose from
// ============================================================================

/// One priced entry on a menu. Ids are unique within a menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct MenuItem {
    pub id: ItemId,
    pub name: String,
    pub price: Price,
}

impl MenuItem {
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>, price: Price) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
        }
    }
}

// ============================================================================
// Step outputs
// ============================================================================

/// A single purchase made by one agent during one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct ChoiceRecord {
    pub agent_id: String,
    pub chosen_item_id: ItemId,
    pub chosen_item_name: String,
    pub price_paid: Price,
}

/// Step totals plus per-item demand and revenue keyed by item name.
///
/// Every item on the working menu at aggregation time has an entry in both
/// maps, zero when nobody bought it. Maps are ordered so rendered tables are
/// stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct AggregatedResult {
    pub total_revenue: f64,
    pub total_items_sold: Demand,
    pub demand_per_item: std::collections::BTreeMap<String, Demand>,
    pub revenue_per_item: std::collections::BTreeMap<String, f64>,
}

impl AggregatedResult {
    /// Demand for an item by name, zero when absent.
    pub fn demand_for(&self, name: &str) -> Demand {
        self.demand_per_item.get(name).copied().unwrap_or(0)
    }

    /// Revenue for an item by name, zero when absent.
    pub fn revenue_for(&self, name: &str) -> f64 {
        self.revenue_per_item.get(name).copied().unwrap_or(0.0)
    }
}

// ============================================================================
// Elasticity inputs (produced by the engine)
// ============================================================================

/// One (price, demand) observation for the item being swept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct PedPoint {
    pub price: Price,
    pub demand: Demand,
    pub percentage_change: f64,
    /// `None` when the producer did not flag baselines; the reducer then
    /// falls back to the zero-change point.
    #[serde(default)]
    pub is_baseline: Option<bool>,
}

impl PedPoint {
    pub fn baseline(price: Price, demand: Demand) -> Self {
        Self {
            price,
            demand,
            percentage_change: 0.0,
            is_baseline: Some(true),
        }
    }

    pub fn scenario(price: Price, demand: Demand, percentage_change: f64) -> Self {
        Self {
            price,
            demand,
            percentage_change,
            is_baseline: Some(false),
        }
    }
}

/// Baseline and scenario observations for a cross-price pair.
///
/// Fields are optional so partially filled samples coming from outside the
/// engine can be rejected by the reducer rather than at deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(default)]
pub struct XedSample {
    pub target_item_id: Option<ItemId>,
    pub target_item_name: Option<String>,
    pub affecting_item_id: Option<ItemId>,
    pub affecting_item_name: Option<String>,
    pub q_target_base: Option<Demand>,
    pub q_target_scenario: Option<Demand>,
    pub p_affecting_base: Option<Price>,
    pub p_affecting_scenario: Option<Price>,
    pub percentage_change_p_affecting: Option<f64>,
}

// ============================================================================
// Elasticity outputs
// ============================================================================

/// Own-price elasticity of one sweep point against the baseline.
///
/// `ped_value` is `None` when the arc formula is undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct PedResult {
    pub percentage_change_price: f64,
    pub original_price: Price,
    pub new_price: Price,
    pub original_demand: Demand,
    pub new_demand: Demand,
    pub ped_value: Option<f64>,
    pub label: DemandResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct PedReport {
    pub item_id: ItemId,
    pub item_name: String,
    pub data: Vec<PedResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct XedResult {
    pub target_item_id: ItemId,
    pub target_item_name: String,
    pub affecting_item_id: ItemId,
    pub affecting_item_name: String,
    pub q_target_base: Demand,
    pub q_target_scenario: Demand,
    pub p_affecting_base: Price,
    pub p_affecting_scenario: Price,
    pub percentage_change_p_affecting: f64,
    pub xed_value: Option<f64>,
    pub label: CrossRelation,
}
