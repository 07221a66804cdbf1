// Baseline vs. single-price-change comparison

use rand::Rng;
use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::engine::SimulationEngine;
use crate::types::{Demand, ItemId, Price};

/// Per-item row of a comparison table, in master menu order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct ComparisonRow {
    pub item_id: ItemId,
    pub name: String,
    pub original_price: Price,
    pub scenario_price: Price,
    pub baseline_demand: Demand,
    pub scenario_demand: Demand,
    pub baseline_revenue: f64,
    pub scenario_revenue: f64,
}

/// Point-change response of another item to the repriced one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(tag = "kind", content = "value")]
pub enum CrossEffect {
    Value(f64),
    /// Nothing sold at baseline, something sold in the scenario.
    NewDemand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct PriceComparison {
    pub changed_item_id: ItemId,
    pub changed_item_name: String,
    pub original_price: Price,
    pub new_price: Price,
    pub baseline_total_revenue: f64,
    pub scenario_total_revenue: f64,
    pub rows: Vec<ComparisonRow>,
    /// Keyed by item name; excludes the changed item. Empty when the price
    /// did not move or the original price was zero.
    pub cross_effects: Vec<(String, CrossEffect)>,
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Percentage change in quantity over percentage change in price, using the
/// baseline as the base (not the arc midpoint).
pub fn simple_cross_effect(q1: Demand, q2: Demand, pct_price_change: f64) -> CrossEffect {
    if q1 > 0 {
        let pct_q = (q2 as f64 - q1 as f64) / q1 as f64;
        CrossEffect::Value(round3(pct_q / pct_price_change))
    } else if q2 > 0 {
        CrossEffect::NewDemand
    } else {
        CrossEffect::Value(0.0)
    }
}

impl<R: Rng> SimulationEngine<R> {
    /// Run a baseline and a single-item price scenario and line them up.
    ///
    /// `None` when the scenario is rejected. Leaves the working menu on master.
    pub fn compare_price_change(&mut self, item_id: &str, new_price: Price) -> Option<PriceComparison> {
        let changed = self.find_master_item(item_id)?.clone();
        let max_items = self.config().max_items_per_agent;

        let baseline = self.run_baseline(max_items);
        let scenario = self.run_price_scenario_with_max_items(item_id, new_price, max_items)?;

        let rows: Vec<ComparisonRow> = self
            .master_menu()
            .iter()
            .map(|item| ComparisonRow {
                item_id: item.id.clone(),
                name: item.name.clone(),
                original_price: item.price,
                scenario_price: if item.id == changed.id {
                    new_price
                } else {
                    item.price
                },
                baseline_demand: baseline.demand_for(&item.name),
                scenario_demand: scenario.demand_for(&item.name),
                baseline_revenue: baseline.revenue_for(&item.name),
                scenario_revenue: scenario.revenue_for(&item.name),
            })
            .collect();

        let mut cross_effects = Vec::new();
        if changed.price > 0.0 && new_price != changed.price {
            let pct_price_change = (new_price - changed.price) / changed.price;
            for row in rows.iter().filter(|r| r.name != changed.name) {
                cross_effects.push((
                    row.name.clone(),
                    simple_cross_effect(row.baseline_demand, row.scenario_demand, pct_price_change),
                ));
            }
        }

        Some(PriceComparison {
            changed_item_id: changed.id,
            changed_item_name: changed.name,
            original_price: changed.price,
            new_price,
            baseline_total_revenue: baseline.total_revenue,
            scenario_total_revenue: scenario.total_revenue,
            rows,
            cross_effects,
        })
    }
}
