// Agent-based menu pricing simulation
//
// Module structure:
// - types       Menu items, choice records, aggregation and elasticity records
// - config      Population and run parameters
// - error       Construction-time validation errors
// - menu        Boundary validation, lookups, price rounding
// - agents/     Customer agents (utility + greedy basket choice)
// - engine      Master/working menus, choice steps, scenario helpers
// - elasticity  Arc elasticity, PED/XED reducers and labels
// - comparison  Baseline vs. price-change comparison tables

use serde::Serialize;
use wasm_bindgen::prelude::*;

pub mod agents;
pub mod comparison;
pub mod config;
pub mod elasticity;
pub mod engine;
pub mod error;
pub mod menu;
pub mod types;

#[cfg(feature = "instrument")]
pub use instrument;

pub use agents::CustomerAgent;
pub use comparison::{ComparisonRow, CrossEffect, PriceComparison, simple_cross_effect};
pub use config::SimulationConfig;
pub use elasticity::{CrossRelation, DemandResponse, arc_elasticity, ped_from_sweep, xed_from_pair};
pub use engine::SimulationEngine;
pub use error::ValidationError;
pub use menu::{is_reasonable_change, menu_from_json, validate_menu};
pub use types::{
    AggregatedResult, ChoiceRecord, Demand, ItemId, MenuItem, PedPoint, PedReport, PedResult,
    Price, XedResult, XedSample,
};

// ============================================================================
// WASM API - Pricing simulation
// ============================================================================

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    // json_compatible: `None` becomes null and maps become plain objects
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    Ok(value.serialize(&serializer)?)
}

#[wasm_bindgen]
pub struct PricingSimulation {
    engine: SimulationEngine,
}

#[wasm_bindgen]
impl PricingSimulation {
    /// `menu` is an array of `{id, name, price}`; `config` may be omitted.
    #[wasm_bindgen(constructor)]
    pub fn new(menu: JsValue, config: JsValue) -> Result<PricingSimulation, JsError> {
        // Better panic messages in browser console
        console_error_panic_hook::set_once();

        let menu: Vec<MenuItem> = serde_wasm_bindgen::from_value(menu)?;
        let config: SimulationConfig = if config.is_undefined() || config.is_null() {
            SimulationConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };

        Ok(Self {
            engine: SimulationEngine::from_config(&menu, &config)?,
        })
    }

    #[wasm_bindgen(js_name = masterMenu)]
    pub fn master_menu(&self) -> Result<JsValue, JsError> {
        to_js(&self.engine.master_menu())
    }

    /// Baseline vs. repriced comparison, or null when rejected.
    #[wasm_bindgen(js_name = simulatePriceChange)]
    pub fn simulate_price_change(&mut self, item_id: &str, new_price: f64) -> Result<JsValue, JsError> {
        to_js(&self.engine.compare_price_change(item_id, new_price))
    }

    /// PED report for an item, or null for unknown ids.
    #[wasm_bindgen(js_name = sweepPed)]
    pub fn sweep_ped(&mut self, item_id: &str, percentage_changes: Vec<f64>) -> Result<JsValue, JsError> {
        to_js(&self.engine.sweep_ped_report(item_id, &percentage_changes))
    }

    /// XED between two distinct items, or null when rejected.
    #[wasm_bindgen(js_name = pairXed)]
    pub fn pair_xed(
        &mut self,
        target_id: &str,
        affecting_id: &str,
        percentage_change: f64,
    ) -> Result<JsValue, JsError> {
        let result = self
            .engine
            .run_xed_pair(target_id, affecting_id, percentage_change)
            .and_then(|sample| xed_from_pair(&sample));
        to_js(&result)
    }
}
