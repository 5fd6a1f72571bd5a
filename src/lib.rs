// bazaar_core: artisan storefront Rust/WASM engine.
// Offer evaluation, cart curation, trend votes, mock assistant, and camera overlay live here;
// JS forwards DOM events as commands and performs the platform effects it is handed back.

mod assistant;
mod backend;
mod camera;
mod cart;
mod catalog;
mod controller;
mod error;
mod offer;
mod overlay;
mod trends;
mod types;

use wasm_bindgen::prelude::*;

pub use assistant::{chat_answer, dream_suggestions};
pub use backend::{Backend, LocalBackend, RequestKind};
pub use camera::{CameraSession, CameraStatus, Grant};
pub use cart::{Cart, CartInsights, CartMood, ImpulseCheck};
pub use catalog::{render_cards, Catalog, CatalogFilter, ProductCard};
pub use controller::{Command, Controller, Dispatch, DreamSlot, Effect, OverlayOption, UiUpdate};
pub use error::{Severity, StorefrontError};
pub use offer::{acceptable_price, demand_factor, evaluate, parse_offer, Decision, RejectReason};
pub use overlay::{compose, png_data_url, NormalizedRect, OverlayManipulator, OverlayState};
pub use trends::TrendLedger;
pub use types::*;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Storefront interface exposed to JavaScript.
/// One JSON command in, one JSON dispatch out, per UI event.
#[wasm_bindgen]
pub struct Storefront {
    controller: Controller,
}

#[wasm_bindgen]
impl Storefront {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<Storefront, JsValue> {
        let config: StorefrontConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?;

        let controller = Controller::new(config).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(Storefront { controller })
    }

    /// Apply a command and return `{ updates, effects }` as JSON.
    /// Recoverable failures come back as `Notice` updates, not as errors.
    pub fn dispatch(&mut self, command_json: &str) -> Result<String, JsValue> {
        let command: Command = serde_json::from_str(command_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid command: {}", e)))?;

        let dispatch = self.controller.dispatch(command);

        serde_json::to_string(&dispatch)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Product grid for the current search and sort as an HTML fragment.
    pub fn products_html(&self) -> String {
        self.controller
            .cards()
            .iter()
            .map(ProductCard::to_html)
            .collect()
    }

    /// Composite the current video frame with the overlay image and return a PNG data URL.
    /// Pixel buffers are tightly packed RGBA. An empty overlay buffer snapshots the frame alone.
    pub fn snapshot(
        &self,
        frame_width: u32,
        frame_height: u32,
        frame_pixels: Vec<u8>,
        overlay_width: u32,
        overlay_height: u32,
        overlay_pixels: Vec<u8>,
    ) -> Result<String, JsValue> {
        let to_js = |e: StorefrontError| JsValue::from_str(&e.to_string());

        let frame = overlay::rgba_from_raw(frame_width, frame_height, frame_pixels).map_err(to_js)?;
        let overlay_image = if overlay_pixels.is_empty() {
            None
        } else {
            Some(overlay::rgba_from_raw(overlay_width, overlay_height, overlay_pixels).map_err(to_js)?)
        };

        let composite = self
            .controller
            .snapshot(&frame, overlay_image.as_ref())
            .map_err(to_js)?;
        png_data_url(&composite).map_err(to_js)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storefront_creation_works() {
        let storefront = Storefront::new("{}");
        assert!(storefront.is_ok());
    }

    #[test]
    fn dispatch_returns_json() {
        let mut storefront = Storefront::new(r#"{"currency":"$"}"#).unwrap();
        let out = storefront
            .dispatch(r#"{"type":"Sort","mode":"price-asc"}"#)
            .unwrap();
        let dispatch: Dispatch = serde_json::from_str(&out).unwrap();
        match &dispatch.updates[0] {
            UiUpdate::Products { cards } => assert_eq!(cards[0].price_label, "$799"),
            other => panic!("unexpected update {other:?}"),
        }
        assert!(storefront.products_html().starts_with("<article class=\"product-card\">"));
    }

    // Error paths build a JsValue, which only exists on wasm32; see tests/web.rs.
}
