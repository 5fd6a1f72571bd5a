// Strong typing over strings. Newtypes for product ids, prices, and tickets.
// Configuration passed from JS lives here too, with serde defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable product identifier. Newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(u32);

impl ProductId {
    pub fn new(id: u32) -> Self {
        ProductId(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Price in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Price(u64);

impl Price {
    pub fn new(amount: u64) -> Self {
        Price(amount)
    }

    pub fn amount(&self) -> u64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }

    /// Price multiplied by a quantity, saturating.
    pub fn times(&self, quantity: u32) -> Price {
        Price(self.0.saturating_mul(quantity as u64))
    }
}

/// Correlates a host effect with the command that completes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Ticket(u64);

impl Ticket {
    pub fn new(id: u64) -> Self {
        Ticket(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Ticket {
        Ticket(self.0 + 1)
    }
}

/// A catalog entry. Immutable after catalog load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub price: Price,
    pub seller: String,
    /// Popularity score, only used as an evaluator input and for sorting.
    #[serde(default)]
    pub popularity: u32,
    pub image: String,
}

/// One cart line. Quantity is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A label and its vote count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendEntry {
    pub label: String,
    pub votes: u64,
}

/// Catalog ordering requested by the sort control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SortMode {
    /// Most popular first.
    #[default]
    Popular,
    /// Cheapest first.
    PriceAsc,
    /// Highest id first.
    New,
}

/// UI surfaces whose visibility the engine tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Panel {
    Negotiation,
    Chat,
    Dream,
    Camera,
    SidePanel,
    Trends,
}

/// Who wrote a chat line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatAuthor {
    You,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub author: ChatAuthor,
    pub text: String,
}

/// A generated product idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DreamSuggestion {
    pub title: String,
    pub description: String,
    pub estimated_price: Price,
}

/// Pixel size of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Storefront configuration passed from JS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorefrontConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    /// A single line above this quantity triggers the impulse check.
    #[serde(default = "default_impulse_threshold")]
    pub impulse_threshold: u32,
    /// Fake "thinking" latency before a chat answer lands.
    #[serde(default = "default_chat_delay")]
    pub chat_delay_ms: u32,
    /// Fake latency before dream suggestions land.
    #[serde(default = "default_dream_delay")]
    pub dream_delay_ms: u32,
    #[serde(default)]
    pub overlay: OverlaySettings,
    #[serde(default = "default_catalog")]
    pub catalog: Vec<Product>,
    #[serde(default = "default_trend_seeds")]
    pub trend_seeds: Vec<TrendEntry>,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        StorefrontConfig {
            currency: default_currency(),
            impulse_threshold: default_impulse_threshold(),
            chat_delay_ms: default_chat_delay(),
            dream_delay_ms: default_dream_delay(),
            overlay: OverlaySettings::default(),
            catalog: default_catalog(),
            trend_seeds: default_trend_seeds(),
        }
    }
}

/// Overlay manipulation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlaySettings {
    /// Initial left/top offset and width, as a fraction of the display size.
    #[serde(default = "default_initial_fraction")]
    pub initial_fraction: f64,
    /// Width floor in display pixels.
    #[serde(default = "default_min_width")]
    pub min_width: f64,
    /// Width change per wheel tick in display pixels.
    #[serde(default = "default_wheel_step")]
    pub wheel_step: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        OverlaySettings {
            initial_fraction: default_initial_fraction(),
            min_width: default_min_width(),
            wheel_step: default_wheel_step(),
            opacity: default_opacity(),
        }
    }
}

fn default_currency() -> String {
    "₹".to_string()
}

fn default_impulse_threshold() -> u32 {
    3
}

fn default_chat_delay() -> u32 {
    700
}

fn default_dream_delay() -> u32 {
    900
}

fn default_initial_fraction() -> f64 {
    0.3
}

fn default_min_width() -> f64 {
    40.0
}

fn default_wheel_step() -> f64 {
    10.0
}

fn default_opacity() -> f32 {
    0.95
}

fn default_catalog() -> Vec<Product> {
    vec![
        Product {
            id: ProductId(1),
            title: "Handcrafted Mango Wood Lamp".to_string(),
            price: Price(2499),
            seller: "Ravi Crafts".to_string(),
            popularity: 5,
            image: "https://images.unsplash.com/photo-1578894381034-4f1a6403b9b8?auto=format&fit=crop&w=800&q=60".to_string(),
        },
        Product {
            id: ProductId(2),
            title: "Warli Painted Cushion".to_string(),
            price: Price(799),
            seller: "Asha Handloom".to_string(),
            popularity: 12,
            image: "https://images.unsplash.com/photo-1582719478173-1b7b4af8f1a1?auto=format&fit=crop&w=800&q=60".to_string(),
        },
        Product {
            id: ProductId(3),
            title: "Recycled Glass Mango Bowl".to_string(),
            price: Price(1199),
            seller: "GreenGlass".to_string(),
            popularity: 8,
            image: "https://images.unsplash.com/photo-1544025162-d76694265947?auto=format&fit=crop&w=800&q=60".to_string(),
        },
    ]
}

fn default_trend_seeds() -> Vec<TrendEntry> {
    [
        ("Warli Painted Cushion", 12),
        ("Mango Wood Lamp", 5),
        ("Recycled Glass", 8),
    ]
    .into_iter()
    .map(|(label, votes)| TrendEntry {
        label: label.to_string(),
        votes,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: StorefrontConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.currency, "₹");
        assert_eq!(config.impulse_threshold, 3);
        assert_eq!(config.catalog.len(), 3);
        assert_eq!(config.trend_seeds[0].label, "Warli Painted Cushion");
        assert_eq!(config.overlay.min_width, 40.0);
    }

    #[test]
    fn sort_mode_uses_control_values() {
        let mode: SortMode = serde_json::from_str("\"price-asc\"").unwrap();
        assert_eq!(mode, SortMode::PriceAsc);
        let mode: SortMode = serde_json::from_str("\"new\"").unwrap();
        assert_eq!(mode, SortMode::New);
    }

    #[test]
    fn price_times_saturates() {
        assert_eq!(Price::new(799).times(3), Price::new(2397));
        assert_eq!(Price::new(u64::MAX).times(2), Price::new(u64::MAX));
    }
}
