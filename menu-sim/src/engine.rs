// Simulation engine: master/working menus, the agent population, and the
// scenario helpers built on top of a single choice step.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::agents::CustomerAgent;
use crate::config::SimulationConfig;
use crate::elasticity::ped_from_sweep;
use crate::error::ValidationError;
use crate::menu::{apply_change, find_item, validate_menu};
use crate::types::{
    AggregatedResult, ChoiceRecord, ItemId, MenuItem, PedPoint, PedReport, Price, XedSample,
};

/// Owns the canonical menu, a scratch copy for scenarios, and a fixed
/// population of agents.
///
/// Every public method returns with `working == master`; only the scenario
/// helpers mutate `working`, and they restore it before returning. Methods
/// that touch the working menu take `&mut self`, so sharing one engine
/// across threads needs an outer lock around whole calls.
#[derive(Debug, Clone)]
pub struct SimulationEngine<R: Rng = StdRng> {
    master: Vec<MenuItem>,
    working: Vec<MenuItem>,
    agents: Vec<CustomerAgent>,
    config: SimulationConfig,
    rng: R,
    steps_run: u64,
}

impl SimulationEngine<StdRng> {
    /// Build an engine from explicit population parameters, seeded with the
    /// default seed.
    pub fn new(
        menu_items: &[MenuItem],
        num_agents: usize,
        budget_range: (f64, f64),
        sensitivity_range: (f64, f64),
    ) -> Result<Self, ValidationError> {
        let config = SimulationConfig {
            num_agents,
            budget_range,
            sensitivity_range,
            ..SimulationConfig::default()
        };
        Self::from_config(menu_items, &config)
    }

    /// Build an engine whose random stream is seeded from `config.seed`.
    pub fn from_config(
        menu_items: &[MenuItem],
        config: &SimulationConfig,
    ) -> Result<Self, ValidationError> {
        Self::with_rng(menu_items, config, StdRng::seed_from_u64(config.seed))
    }
}

impl<R: Rng> SimulationEngine<R> {
    /// Build an engine drawing all randomness from `rng`.
    pub fn with_rng(
        menu_items: &[MenuItem],
        config: &SimulationConfig,
        mut rng: R,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        let master = validate_menu(menu_items)?;
        let working = master.clone();

        let all_item_ids: Vec<ItemId> = master.iter().map(|item| item.id.clone()).collect();
        let (s_min, s_max) = config.sensitivity_range;

        let agents = (0..config.num_agents)
            .map(|i| {
                let sensitivity = rng.random_range(s_min..=s_max);
                let mut agent = CustomerAgent::new(
                    format!("agent_{i:03}"),
                    None,
                    config.budget_range,
                    Some(sensitivity),
                    &mut rng,
                )?;
                agent.generate_random_preferences(&all_item_ids, &mut rng);
                Ok(agent)
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(Self {
            master,
            working,
            agents,
            config: config.clone(),
            rng,
            steps_run: 0,
        })
    }

    // === Queries ===

    pub fn master_menu(&self) -> &[MenuItem] {
        &self.master
    }

    pub fn working_menu(&self) -> &[MenuItem] {
        &self.working
    }

    pub fn agents(&self) -> &[CustomerAgent] {
        &self.agents
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Number of choice steps run so far.
    pub fn steps_run(&self) -> u64 {
        self.steps_run
    }

    pub fn find_master_item(&self, item_id: &str) -> Option<&MenuItem> {
        find_item(&self.master, item_id)
    }

    // === Working menu ===

    /// Set a price on the working menu only.
    ///
    /// Returns false without touching anything for negative or non-finite
    /// prices and for ids not on the working menu.
    pub fn update_item_price(&mut self, item_id: &str, new_price: Price) -> bool {
        if !new_price.is_finite() || new_price < 0.0 {
            return false;
        }
        match self.working.iter_mut().find(|item| item.id == item_id) {
            Some(item) => {
                item.price = new_price;
                true
            }
            None => false,
        }
    }

    /// Replace the working menu with a fresh copy of the master menu.
    pub fn reset_to_master(&mut self) {
        self.working = self.master.clone();
    }

    // === Step & aggregation ===

    /// Every agent, in population order, re-rolls its budget and chooses
    /// once from the working menu. Records are agent-major.
    pub fn run_step(&mut self, max_items_per_agent: usize) -> Vec<ChoiceRecord> {
        self.steps_run += 1;
        #[cfg(feature = "instrument")]
        let step = self.steps_run;

        let budget_range = self.config.budget_range;
        let mut records = Vec::new();

        for agent in self.agents.iter_mut() {
            agent.reroll_budget(&mut self.rng, budget_range);
            agent.choose_items(&self.working, max_items_per_agent, &mut self.rng);

            for item in &agent.chosen_items {
                #[cfg(feature = "instrument")]
                tracing::info!(
                    target: "choice",
                    step = step,
                    agent_id = agent.agent_id.as_str(),
                    item_id = item.id.as_str(),
                    price = item.price,
                );

                records.push(ChoiceRecord {
                    agent_id: agent.agent_id.clone(),
                    chosen_item_id: item.id.clone(),
                    chosen_item_name: item.name.clone(),
                    price_paid: item.price,
                });
            }
        }

        records
    }

    /// Totals and per-item demand/revenue keyed by working-menu item name.
    ///
    /// Every working item is present, zero if unchosen. Records naming items
    /// that are not on the working menu are ignored so that per-item sums
    /// always match the totals.
    pub fn aggregate(&self, choices: &[ChoiceRecord]) -> AggregatedResult {
        let mut demand_per_item: BTreeMap<String, u64> = BTreeMap::new();
        let mut revenue_per_item: BTreeMap<String, f64> = BTreeMap::new();
        for item in &self.working {
            demand_per_item.insert(item.name.clone(), 0);
            revenue_per_item.insert(item.name.clone(), 0.0);
        }

        let mut total_revenue = 0.0;
        let mut total_items_sold = 0;

        for choice in choices {
            let Some(count) = demand_per_item.get_mut(&choice.chosen_item_name) else {
                continue;
            };
            *count += 1;
            if let Some(revenue) = revenue_per_item.get_mut(&choice.chosen_item_name) {
                *revenue += choice.price_paid;
            }
            total_revenue += choice.price_paid;
            total_items_sold += 1;
        }

        AggregatedResult {
            total_revenue,
            total_items_sold,
            demand_per_item,
            revenue_per_item,
        }
    }

    // === Scenarios ===

    /// One step at master prices.
    pub fn run_baseline(&mut self, max_items_per_agent: usize) -> AggregatedResult {
        self.reset_to_master();
        let choices = self.run_step(max_items_per_agent);
        let result = self.aggregate(&choices);
        self.reset_to_master();
        result
    }

    /// reset → update → step → aggregate → reset. Fails closed.
    fn run_scenario(
        &mut self,
        item_id: &str,
        new_price: Price,
        max_items_per_agent: usize,
    ) -> Option<AggregatedResult> {
        self.reset_to_master();

        if !self.update_item_price(item_id, new_price) {
            self.reset_to_master();
            return None;
        }

        let choices = self.run_step(max_items_per_agent);
        let result = self.aggregate(&choices);
        self.reset_to_master();

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "scenario",
            step = self.steps_run,
            item_id = item_id,
            new_price = new_price,
            total_revenue = result.total_revenue,
            total_items_sold = result.total_items_sold,
        );

        Some(result)
    }

    pub fn run_price_scenario(&mut self, item_id: &str, new_price: Price) -> Option<AggregatedResult> {
        self.run_price_scenario_with_max_items(item_id, new_price, self.config.max_items_per_agent)
    }

    /// One step with a single item repriced. `None` for unknown items or
    /// invalid prices.
    pub fn run_price_scenario_with_max_items(
        &mut self,
        item_id: &str,
        new_price: Price,
        max_items_per_agent: usize,
    ) -> Option<AggregatedResult> {
        self.run_scenario(item_id, new_price, max_items_per_agent)
    }

    pub fn run_ped_sweep(&mut self, item_id: &str, percentage_changes: &[f64]) -> Option<Vec<PedPoint>> {
        self.run_ped_sweep_with_max_items(item_id, percentage_changes, self.config.max_items_per_agent)
    }

    /// Baseline point first, then one point per non-zero change, in the
    /// order given. Changes that would make the price negative are skipped.
    pub fn run_ped_sweep_with_max_items(
        &mut self,
        item_id: &str,
        percentage_changes: &[f64],
        max_items_per_agent: usize,
    ) -> Option<Vec<PedPoint>> {
        let base_item = self.find_master_item(item_id)?.clone();

        let baseline = self.run_baseline(max_items_per_agent);
        let mut points = vec![PedPoint::baseline(
            base_item.price,
            baseline.demand_for(&base_item.name),
        )];

        for &change in percentage_changes {
            if change == 0.0 {
                continue;
            }

            let new_price = apply_change(base_item.price, change);
            if new_price < 0.0 {
                #[cfg(feature = "instrument")]
                tracing::warn!(
                    item_id = item_id,
                    percentage_change = change,
                    new_price = new_price,
                    "skipping sweep point with negative price"
                );
                continue;
            }

            let Some(result) = self.run_scenario(item_id, new_price, max_items_per_agent) else {
                #[cfg(feature = "instrument")]
                tracing::warn!(
                    item_id = item_id,
                    new_price = new_price,
                    "price update rejected during sweep"
                );
                continue;
            };

            points.push(PedPoint::scenario(
                new_price,
                result.demand_for(&base_item.name),
                change,
            ));
        }

        self.reset_to_master();

        #[cfg(feature = "instrument")]
        for point in &points {
            tracing::info!(
                target: "ped_point",
                item_id = item_id,
                price = point.price,
                demand = point.demand,
                percentage_change = point.percentage_change,
                is_baseline = point.is_baseline == Some(true),
            );
        }

        Some(points)
    }

    /// Sweep plus reduction, labelled with the item's name.
    pub fn sweep_ped_report(&mut self, item_id: &str, percentage_changes: &[f64]) -> Option<PedReport> {
        let item_name = self.find_master_item(item_id)?.name.clone();
        let points = self.run_ped_sweep(item_id, percentage_changes)?;
        Some(PedReport {
            item_id: item_id.to_string(),
            item_name,
            data: ped_from_sweep(&points),
        })
    }

    pub fn run_xed_pair(
        &mut self,
        target_id: &str,
        affecting_id: &str,
        affecting_percentage_change: f64,
    ) -> Option<XedSample> {
        self.run_xed_pair_with_max_items(
            target_id,
            affecting_id,
            affecting_percentage_change,
            self.config.max_items_per_agent,
        )
    }

    /// Demand for `target_id` at master prices and with `affecting_id`
    /// repriced. `None` for unknown ids, identical ids, or a negative
    /// derived price.
    pub fn run_xed_pair_with_max_items(
        &mut self,
        target_id: &str,
        affecting_id: &str,
        affecting_percentage_change: f64,
        max_items_per_agent: usize,
    ) -> Option<XedSample> {
        let target = self.find_master_item(target_id)?.clone();
        let affecting = self.find_master_item(affecting_id)?.clone();
        if target.id == affecting.id {
            return None;
        }

        let baseline = self.run_baseline(max_items_per_agent);
        let q_target_base = baseline.demand_for(&target.name);

        let p_affecting_scenario = apply_change(affecting.price, affecting_percentage_change);
        if p_affecting_scenario < 0.0 {
            #[cfg(feature = "instrument")]
            tracing::warn!(
                affecting_id = affecting_id,
                new_price = p_affecting_scenario,
                "cross-price scenario has a negative price"
            );
            return None;
        }

        let scenario = self.run_scenario(affecting_id, p_affecting_scenario, max_items_per_agent)?;
        let q_target_scenario = scenario.demand_for(&target.name);

        Some(XedSample {
            target_item_id: Some(target.id),
            target_item_name: Some(target.name),
            affecting_item_id: Some(affecting.id),
            affecting_item_name: Some(affecting.name),
            q_target_base: Some(q_target_base),
            q_target_scenario: Some(q_target_scenario),
            p_affecting_base: Some(affecting.price),
            p_affecting_scenario: Some(p_affecting_scenario),
            percentage_change_p_affecting: Some(affecting_percentage_change),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_menu() -> Vec<MenuItem> {
        vec![
            MenuItem::new("burger", "Classic Burger", 10.0),
            MenuItem::new("pizza", "Pepperoni Pizza", 12.0),
            MenuItem::new("salad", "Caesar Salad", 8.0),
        ]
    }

    fn engine(num_agents: usize) -> SimulationEngine {
        let config = SimulationConfig::default()
            .with_agents(num_agents)
            .with_seed(123);
        SimulationEngine::from_config(&sample_menu(), &config).unwrap()
    }

    fn record(name: &str, price: f64) -> ChoiceRecord {
        ChoiceRecord {
            agent_id: "agent_000".to_string(),
            chosen_item_id: name.to_lowercase(),
            chosen_item_name: name.to_string(),
            price_paid: price,
        }
    }

    #[test]
    fn construction_creates_indexed_agents_with_full_preferences() {
        let engine = engine(10);
        assert_eq!(engine.agents().len(), 10);
        assert_eq!(engine.agents()[0].agent_id, "agent_000");
        assert_eq!(engine.agents()[9].agent_id, "agent_009");
        for agent in engine.agents() {
            assert_eq!(agent.preferences.len(), 3);
            assert!((0.2..=0.8).contains(&agent.price_sensitivity));
        }
        assert_eq!(engine.master_menu(), engine.working_menu());
        assert_eq!(engine.working_menu()[0].price, 10.0);
    }

    #[test]
    fn construction_rejects_bad_menu() {
        let mut menu = sample_menu();
        menu[1].price = -3.0;
        let err = SimulationEngine::new(&menu, 10, (20.0, 100.0), (0.2, 0.8)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPrice { index: 1, .. }));
    }

    #[test]
    fn construction_copies_input() {
        let mut menu = sample_menu();
        let engine = SimulationEngine::new(&menu, 5, (20.0, 100.0), (0.2, 0.8)).unwrap();
        menu[0].price = 99.0;
        assert_eq!(engine.master_menu()[0].price, 10.0);
    }

    #[test]
    fn same_seed_same_population() {
        let a = engine(20);
        let b = engine(20);
        for (x, y) in a.agents().iter().zip(b.agents()) {
            assert_eq!(x.budget, y.budget);
            assert_eq!(x.price_sensitivity, y.price_sensitivity);
            assert_eq!(x.preferences, y.preferences);
        }
    }

    #[test]
    fn update_price_touches_working_only() {
        let mut engine = engine(5);
        assert!(engine.update_item_price("burger", 11.0));
        assert_eq!(engine.working_menu()[0].price, 11.0);
        assert_eq!(engine.master_menu()[0].price, 10.0);

        assert!(!engine.update_item_price("nonexistent", 15.0));
        assert!(!engine.update_item_price("burger", -5.0));
        assert!(!engine.update_item_price("burger", f64::NAN));
        assert_eq!(engine.working_menu()[0].price, 11.0);

        engine.reset_to_master();
        assert_eq!(engine.working_menu(), engine.master_menu());
    }

    #[test]
    fn step_records_are_bounded_and_agent_major() {
        let mut engine = engine(10);
        let choices = engine.run_step(1);
        assert!(choices.len() <= 10);

        let choices = engine.run_step(3);
        let order: Vec<&str> = choices.iter().map(|c| c.agent_id.as_str()).collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted, "records must be grouped by agent in population order");
        assert_eq!(engine.steps_run(), 2);
    }

    #[test]
    fn budgets_are_rerolled_each_step() {
        let mut engine = engine(10);
        let before: Vec<f64> = engine.agents().iter().map(|a| a.budget).collect();
        engine.run_step(3);
        let after: Vec<f64> = engine.agents().iter().map(|a| a.budget).collect();
        assert_ne!(before, after);
        for agent in engine.agents() {
            assert!(agent.spent() <= agent.budget + 1e-9);
        }
    }

    #[test]
    fn aggregate_empty_covers_every_item() {
        let engine = engine(3);
        let result = engine.aggregate(&[]);
        assert_eq!(result.total_items_sold, 0);
        assert_eq!(result.total_revenue, 0.0);
        assert_eq!(result.demand_per_item.len(), 3);
        assert_eq!(result.revenue_per_item.len(), 3);
        assert_eq!(result.demand_for("Caesar Salad"), 0);
    }

    #[test]
    fn aggregate_counts_and_sums() {
        let engine = engine(3);
        let choices = vec![
            record("Classic Burger", 10.0),
            record("Classic Burger", 10.0),
            record("Caesar Salad", 8.0),
            record("Mystery Dish", 99.0),
        ];
        let result = engine.aggregate(&choices);

        assert_eq!(result.demand_for("Classic Burger"), 2);
        assert_eq!(result.revenue_for("Classic Burger"), 20.0);
        assert_eq!(result.demand_for("Pepperoni Pizza"), 0);
        assert_eq!(result.total_items_sold, 3);
        assert_eq!(result.total_revenue, 28.0);
        assert!(!result.demand_per_item.contains_key("Mystery Dish"));
    }

    #[test]
    fn price_scenario_restores_menu() {
        let mut engine = engine(30);
        let result = engine.run_price_scenario("burger", 15.0).unwrap();
        assert_eq!(result.demand_per_item.len(), 3);
        assert_eq!(engine.working_menu(), engine.master_menu());

        assert!(engine.run_price_scenario("nonexistent", 10.0).is_none());
        assert!(engine.run_price_scenario("burger", -5.0).is_none());
        assert_eq!(engine.working_menu(), engine.master_menu());
    }

    #[test]
    fn ped_sweep_shape() {
        let mut engine = engine(10);
        let points = engine.run_ped_sweep("burger", &[-0.1, 0.0, 0.1]).unwrap();

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].is_baseline, Some(true));
        assert_eq!(points[0].price, 10.0);
        assert_eq!(points[1].price, 9.0);
        assert_eq!(points[2].price, 11.0);
        assert_eq!(points[2].percentage_change, 0.1);
        assert_eq!(engine.working_menu(), engine.master_menu());
    }

    #[test]
    fn ped_sweep_skips_negative_prices() {
        let mut engine = engine(10);
        let points = engine.run_ped_sweep("salad", &[-1.1]).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].is_baseline, Some(true));

        assert!(engine.run_ped_sweep("nonexistent", &[0.1]).is_none());
    }

    #[test]
    fn ped_report_labels_item() {
        let mut engine = engine(50);
        let report = engine.sweep_ped_report("pizza", &[-0.2, 0.2]).unwrap();
        assert_eq!(report.item_name, "Pepperoni Pizza");
        assert_eq!(report.data.len(), 2);
        assert!(report.data.iter().all(|r| r.original_price == 12.0));
        assert!(engine.sweep_ped_report("nope", &[0.1]).is_none());
    }

    #[test]
    fn xed_pair_collects_both_runs() {
        let mut engine = engine(10);
        let sample = engine.run_xed_pair("pizza", "burger", 0.2).unwrap();

        assert_eq!(sample.target_item_id.as_deref(), Some("pizza"));
        assert_eq!(sample.affecting_item_id.as_deref(), Some("burger"));
        assert_eq!(sample.p_affecting_base, Some(10.0));
        assert_eq!(sample.p_affecting_scenario, Some(12.0));
        assert!(sample.q_target_base.is_some());
        assert!(sample.q_target_scenario.is_some());
        assert_eq!(engine.working_menu(), engine.master_menu());
    }

    #[test]
    fn xed_pair_rejections() {
        let mut engine = engine(10);
        assert!(engine.run_xed_pair("nonexistent", "burger", 0.2).is_none());
        assert!(engine.run_xed_pair("pizza", "nonexistent", 0.2).is_none());
        assert!(engine.run_xed_pair("pizza", "pizza", 0.2).is_none());
        assert!(engine.run_xed_pair("pizza", "burger", -1.5).is_none());
        assert_eq!(engine.working_menu(), engine.master_menu());
    }
}
