// Cart aggregation with derived advisories.
// Mood messages come from a fixed rule table keyed on (line count, total quantity).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::Result;
use crate::types::*;

/// Product id to quantity. At most one line per product, quantities always positive.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: IndexMap<ProductId, u32>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a line at quantity 1, or bump an existing one.
    pub fn add(&mut self, id: ProductId) -> u32 {
        let quantity = self.lines.entry(id).or_insert(0);
        *quantity = quantity.saturating_add(1);
        *quantity
    }

    /// Drop the line whatever its quantity. Returns whether a line existed.
    pub fn remove(&mut self, id: ProductId) -> bool {
        self.lines.shift_remove(&id).is_some()
    }

    /// Zero removes the line.
    pub fn set_quantity(&mut self, id: ProductId, quantity: u32) {
        if quantity == 0 {
            self.lines.shift_remove(&id);
        } else {
            self.lines.insert(id, quantity);
        }
    }

    pub fn quantity(&self, id: ProductId) -> Option<u32> {
        self.lines.get(&id).copied()
    }

    pub fn lines(&self) -> Vec<CartLine> {
        self.lines
            .iter()
            .map(|(&product_id, &quantity)| CartLine {
                product_id,
                quantity,
            })
            .collect()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> u32 {
        self.lines.values().fold(0u32, |acc, q| acc.saturating_add(*q))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of price times quantity over every line.
    pub fn total(&self, catalog: &Catalog) -> Result<Price> {
        let mut total = 0u64;
        for (&id, &quantity) in &self.lines {
            let product = catalog.get(id)?;
            total = total.saturating_add(product.price.times(quantity).amount());
        }
        Ok(Price::new(total))
    }

    /// Recompute the derived views. Called after every mutation.
    pub fn insights(&self, impulse_threshold: u32) -> CartInsights {
        let line_count = self.line_count();
        let total_quantity = self.total_quantity();
        let rule = MOOD_RULES
            .iter()
            .find(|rule| rule.matches(line_count, total_quantity))
            .unwrap_or(&FALLBACK_RULE);

        let impulse_checks = self
            .lines
            .iter()
            .filter(|(_, quantity)| **quantity > impulse_threshold)
            .map(|(&product_id, &quantity)| ImpulseCheck {
                product_id,
                quantity,
                message: format!(
                    "You've added {} of this piece. Take a breath: will each one find a home?",
                    quantity
                ),
            })
            .collect();

        CartInsights {
            line_count,
            total_quantity,
            mood: rule.mood,
            message: rule.message.to_string(),
            impulse_checks,
        }
    }
}

/// Tone of the advisory shown under the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartMood {
    Empty,
    SingleFind,
    StockingUp,
    Curated,
    Abundant,
}

/// Fired when one product's quantity passes the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpulseCheck {
    pub product_id: ProductId,
    pub quantity: u32,
    pub message: String,
}

/// Derived cart views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartInsights {
    pub line_count: usize,
    pub total_quantity: u32,
    pub mood: CartMood,
    pub message: String,
    pub impulse_checks: Vec<ImpulseCheck>,
}

struct MoodRule {
    lines: (usize, usize),
    quantity: (u32, u32),
    mood: CartMood,
    message: &'static str,
}

impl MoodRule {
    fn matches(&self, line_count: usize, total_quantity: u32) -> bool {
        (self.lines.0..=self.lines.1).contains(&line_count)
            && (self.quantity.0..=self.quantity.1).contains(&total_quantity)
    }
}

// First match wins.
const MOOD_RULES: &[MoodRule] = &[
    MoodRule {
        lines: (0, 0),
        quantity: (0, 0),
        mood: CartMood::Empty,
        message: "Your cart is empty. Discover something handmade today.",
    },
    MoodRule {
        lines: (1, 1),
        quantity: (1, 1),
        mood: CartMood::SingleFind,
        message: "A lovely single find. Every piece carries hours of an artisan's care.",
    },
    MoodRule {
        lines: (1, 1),
        quantity: (2, u32::MAX),
        mood: CartMood::StockingUp,
        message: "Stocking up on a favourite? Handmade gifts travel well in pairs.",
    },
    MoodRule {
        lines: (2, 3),
        quantity: (2, 7),
        mood: CartMood::Curated,
        message: "Your picks tell a story. These pieces pair beautifully together.",
    },
];

const FALLBACK_RULE: MoodRule = MoodRule {
    lines: (0, usize::MAX),
    quantity: (0, u32::MAX),
    mood: CartMood::Abundant,
    message: "What a haul! Your support keeps whole villages of makers busy.",
};
