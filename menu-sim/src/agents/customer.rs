use std::collections::HashMap;

use rand::Rng;

use crate::config::check_range;
use crate::error::ValidationError;
use crate::types::{ItemId, MenuItem, Price};

// === CONSTANTS ===

/// Sensitivity range used when an agent is created without one.
pub const DEFAULT_SENSITIVITY_RANGE: (f64, f64) = (0.2, 0.8);
/// Scores handed out by [`CustomerAgent::generate_random_preferences`].
pub const PREFERENCE_RANGE: (f64, f64) = (0.1, 1.0);
/// Neutral-low scores for items first seen while choosing.
pub const UNSEEN_PREFERENCE_RANGE: (f64, f64) = (0.05, 0.5);
/// Offset added to preference in the price exponent.
pub const DEFAULT_EXPONENT_BASE: f64 = 0.5;

fn sample<R: Rng>(rng: &mut R, (min, max): (f64, f64)) -> f64 {
    rng.random_range(min..=max)
}

// === CUSTOMER AGENT ===

/// A synthetic shopper with a per-step budget and per-item preferences.
///
/// Preferences only ever grow: items the agent has never seen get a score
/// the first time they appear on a menu it chooses from.
#[derive(Debug, Clone)]
pub struct CustomerAgent {
    pub agent_id: String,
    pub budget: f64,
    /// In (0, 1). Higher means price depresses utility more.
    pub price_sensitivity: f64,
    /// item id -> preference score in (0, 1]
    pub preferences: HashMap<ItemId, f64>,
    /// Items picked during the most recent choice.
    pub chosen_items: Vec<MenuItem>,
}

impl CustomerAgent {
    /// Create an agent. Preferences start empty unless supplied; a missing
    /// sensitivity is drawn from [`DEFAULT_SENSITIVITY_RANGE`].
    ///
    /// Fails when `budget_range` is not a finite, ordered range of positive
    /// budgets.
    pub fn new<R: Rng>(
        agent_id: impl Into<String>,
        preferences: Option<HashMap<ItemId, f64>>,
        budget_range: (f64, f64),
        price_sensitivity: Option<f64>,
        rng: &mut R,
    ) -> Result<Self, ValidationError> {
        let (b_min, b_max) = check_range("budget_range", budget_range)?;
        if b_min <= 0.0 {
            return Err(ValidationError::RangeOutOfBounds {
                field: "budget_range",
                min: b_min,
                max: b_max,
            });
        }

        let budget = sample(rng, budget_range);
        let price_sensitivity =
            price_sensitivity.unwrap_or_else(|| sample(rng, DEFAULT_SENSITIVITY_RANGE));

        Ok(Self {
            agent_id: agent_id.into(),
            budget,
            price_sensitivity,
            preferences: preferences.unwrap_or_default(),
            chosen_items: Vec::new(),
        })
    }

    /// Re-roll the budget for a new step. `budget_range` must already be
    /// validated.
    pub(crate) fn reroll_budget<R: Rng>(&mut self, rng: &mut R, budget_range: (f64, f64)) {
        self.budget = sample(rng, budget_range);
    }

    /// Assign a uniform score to every id, but only when the agent has no
    /// preferences at all. Any pre-seeded entry blocks the whole fill.
    pub fn generate_random_preferences<R: Rng>(&mut self, all_item_ids: &[ItemId], rng: &mut R) {
        if !self.preferences.is_empty() {
            return;
        }
        for item_id in all_item_ids {
            self.preferences
                .insert(item_id.clone(), sample(rng, PREFERENCE_RANGE));
        }
    }

    pub fn compute_utility(&self, item: &MenuItem) -> f64 {
        self.compute_utility_with_base(item, DEFAULT_EXPONENT_BASE)
    }

    /// `preference / price^(sensitivity * (base + preference))`.
    ///
    /// Zero without a preference entry. Free items are worth their raw
    /// preference.
    pub fn compute_utility_with_base(&self, item: &MenuItem, exponent_base: f64) -> f64 {
        let preference = match self.preferences.get(&item.id) {
            Some(&p) if p != 0.0 => p,
            _ => return 0.0,
        };

        if item.price <= 0.0 {
            return preference;
        }

        let exponent = self.price_sensitivity * (exponent_base + preference);
        preference / item.price.powf(exponent)
    }

    /// Greedily pick up to `max_items` items by descending utility.
    ///
    /// Candidates are filtered once against the full budget. Items that stop
    /// being affordable after earlier picks are skipped, not re-ranked, and the
    /// loop ends as soon as the budget is spent.
    pub fn choose_items<R: Rng>(
        &mut self,
        menu: &[MenuItem],
        max_items: usize,
        rng: &mut R,
    ) -> &[MenuItem] {
        self.chosen_items.clear();
        if menu.is_empty() {
            return &self.chosen_items;
        }

        for item in menu {
            if !self.preferences.contains_key(&item.id) {
                let score = sample(rng, UNSEEN_PREFERENCE_RANGE);
                self.preferences.insert(item.id.clone(), score);
            }
        }

        let mut remaining_budget = self.budget;

        let mut candidates: Vec<(&MenuItem, f64)> = menu
            .iter()
            .filter(|item| item.price <= remaining_budget)
            .map(|item| (item, self.compute_utility(item)))
            .filter(|(_, utility)| *utility > 0.0)
            .collect();

        // Stable: equal utilities keep menu order.
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut picks: Vec<MenuItem> = Vec::with_capacity(max_items.min(candidates.len()));
        for (item, _) in candidates {
            let price: Price = item.price;
            if picks.len() < max_items && price <= remaining_budget {
                picks.push(item.clone());
                remaining_budget -= price;
            }
            if picks.len() >= max_items || remaining_budget <= 0.0 {
                break;
            }
        }

        self.chosen_items = picks;
        &self.chosen_items
    }

    /// Total spent on the most recent choice.
    pub fn spent(&self) -> f64 {
        self.chosen_items.iter().map(|item| item.price).sum()
    }
}
