// Command dispatcher and application state.
// UI events arrive as typed commands; the controller mutates state only through named
// operations and answers with view updates plus effects the host must perform.

use std::collections::{HashMap, HashSet};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::assistant::{self, CHAT_UNAVAILABLE, DREAM_UNAVAILABLE, GENERATING, THINKING};
use crate::backend::{self, Backend, LocalBackend, RequestKind};
use crate::camera::{CameraSession, CameraStatus, Grant};
use crate::cart::{Cart, CartInsights};
use crate::catalog::{format_price, render_cards, Catalog, CatalogFilter, ProductCard};
use crate::error::{Result, Severity, StorefrontError};
use crate::offer::{self, Decision};
use crate::overlay::{self, OverlayState};
use crate::trends::TrendLedger;
use crate::types::*;

/// Typed UI command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Re-emit the full view.
    Refresh,
    Search {
        query: String,
    },
    Sort {
        mode: SortMode,
    },
    /// `None` opens the first catalog product.
    OpenNegotiation {
        #[serde(default)]
        product_id: Option<ProductId>,
    },
    /// Raw text from the offer box.
    SubmitOffer {
        offer: String,
    },
    AddToCart {
        product_id: ProductId,
    },
    RemoveFromCart {
        product_id: ProductId,
    },
    SetQuantity {
        product_id: ProductId,
        quantity: u32,
    },
    ShowTrends,
    Vote {
        label: String,
    },
    AskChat {
        prompt: String,
    },
    DreamGenerate {
        text: String,
    },
    OpenPanel {
        panel: Panel,
    },
    ClosePanel {
        panel: Panel,
    },
    OpenCamera {
        #[serde(default)]
        product_id: Option<ProductId>,
        #[serde(default)]
        aspect: Option<f64>,
    },
    CameraGranted {
        ticket: Ticket,
        frame: Size,
        display: Size,
    },
    CameraDenied {
        ticket: Ticket,
        message: String,
    },
    CameraResized {
        display: Size,
    },
    CloseCamera,
    SelectOverlay {
        product_id: ProductId,
        #[serde(default)]
        aspect: Option<f64>,
    },
    PointerDown {
        pointer_id: i32,
        x: f64,
        y: f64,
    },
    PointerMove {
        pointer_id: i32,
        x: f64,
        y: f64,
    },
    PointerUp {
        pointer_id: i32,
    },
    Wheel {
        delta_y: f64,
    },
    TimerFired {
        ticket: Ticket,
    },
    /// Escape key: close every modal and drawer.
    Escape,
    /// Navigation away. Releases everything held.
    Shutdown,
}

/// What the host should repaint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UiUpdate {
    Products {
        cards: Vec<ProductCard>,
    },
    PanelVisibility {
        panel: Panel,
        open: bool,
    },
    NegotiationOpened {
        product_id: ProductId,
        title: String,
        list_price: String,
        tip: String,
    },
    SellerMessage {
        decision: Decision,
        text: String,
    },
    Cart {
        lines: Vec<CartLine>,
        total: String,
        insights: CartInsights,
    },
    Trends {
        entries: Vec<TrendEntry>,
    },
    ChatLog {
        messages: Vec<ChatMessage>,
    },
    DreamResults {
        slot: DreamSlot,
    },
    Camera {
        status: CameraStatus,
    },
    OverlayOptions {
        options: Vec<OverlayOption>,
        selected: Option<ProductId>,
    },
    Overlay {
        overlay: Option<OverlayState>,
    },
    Notice {
        severity: Severity,
        panel: Option<Panel>,
        message: String,
    },
}

/// Platform work the host performs on the engine's behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Effect {
    /// Ask for a rear-facing camera stream; answer with `CameraGranted` or `CameraDenied`.
    RequestCamera { ticket: Ticket, facing_mode: String },
    /// Stop every track of the held stream and detach it from the preview.
    ReleaseCamera,
    /// Fire `TimerFired { ticket }` after the delay. Not cancellable.
    Schedule { ticket: Ticket, delay_ms: u32 },
}

/// One entry of the overlay product picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayOption {
    pub product_id: ProductId,
    pub title: String,
    pub image: String,
}

/// Contents of the dream results area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state")]
pub enum DreamSlot {
    #[default]
    Empty,
    Generating {
        message: String,
    },
    Ready {
        suggestions: Vec<DreamSuggestion>,
    },
    /// The suggestion request failed; the user can ask again.
    Failed {
        message: String,
    },
}

/// Result of one dispatch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dispatch {
    pub updates: Vec<UiUpdate>,
    pub effects: Vec<Effect>,
}

impl Dispatch {
    fn update(&mut self, update: UiUpdate) {
        self.updates.push(update);
    }

    fn effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }
}

/// Work waiting on a scheduled timer.
#[derive(Debug, Clone, PartialEq)]
enum Deferred {
    ChatReply { prompt: String },
    DreamResults { text: String },
}

/// Application state. Only the controller mutates it.
#[derive(Debug)]
struct AppState {
    catalog: Catalog,
    filter: CatalogFilter,
    cart: Cart,
    negotiating: Option<ProductId>,
    panels: HashSet<Panel>,
    chat_log: Vec<ChatMessage>,
    dream: DreamSlot,
    pending: HashMap<Ticket, Deferred>,
    last_ticket: Ticket,
    camera: CameraSession,
}

/// Storefront controller. Generic over the backend so tests and hosts can swap transports.
pub struct Controller<B: Backend = LocalBackend> {
    config: StorefrontConfig,
    state: AppState,
    backend: B,
}

impl Controller<LocalBackend> {
    /// Build a controller with the in-process backend.
    pub fn new(config: StorefrontConfig) -> Result<Self> {
        let catalog = Catalog::new(config.catalog.clone())?;
        let ledger = TrendLedger::seeded(&config.trend_seeds);
        let backend = LocalBackend::new(catalog, ledger);
        Controller::with_backend(config, backend)
    }
}

impl<B: Backend> Controller<B> {
    pub fn with_backend(config: StorefrontConfig, backend: B) -> Result<Self> {
        validate_config(&config)?;
        let catalog = Catalog::new(config.catalog.clone())?;
        let state = AppState {
            catalog,
            filter: CatalogFilter::default(),
            cart: Cart::new(),
            negotiating: None,
            panels: HashSet::new(),
            chat_log: Vec::new(),
            dream: DreamSlot::Empty,
            pending: HashMap::new(),
            last_ticket: Ticket::default(),
            camera: CameraSession::new(config.overlay),
        };
        Ok(Controller {
            config,
            state,
            backend,
        })
    }

    pub fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.state.catalog
    }

    pub fn cart(&self) -> &Cart {
        &self.state.cart
    }

    pub fn is_open(&self, panel: Panel) -> bool {
        self.state.panels.contains(&panel)
    }

    pub fn camera(&self) -> &CameraSession {
        &self.state.camera
    }

    /// Cards for the current search and sort.
    pub fn cards(&self) -> Vec<ProductCard> {
        render_cards(&self.state.catalog, &self.state.filter, &self.config.currency)
    }

    /// Apply one command. Recoverable errors become a notice and leave state untouched.
    pub fn dispatch(&mut self, command: Command) -> Dispatch {
        tracing::debug!(?command, "dispatch");
        let mut out = Dispatch::default();
        let panel = notice_panel(&command);
        if let Err(err) = self.apply(command, &mut out) {
            tracing::warn!(error = %err, "command failed");
            out = Dispatch::default();
            out.update(notice(&err, panel));
        }
        out
    }

    /// Compose the snapshot from the current frame and overlay image.
    pub fn snapshot(&self, frame: &RgbaImage, overlay_image: Option<&RgbaImage>) -> Result<RgbaImage> {
        let camera = &self.state.camera;
        let display = camera.display().ok_or_else(|| {
            StorefrontError::ResourceUnavailable("Camera is not running".to_string())
        })?;
        match (camera.overlay(), overlay_image) {
            (Some(manipulator), Some(image)) => overlay::compose(
                frame,
                display,
                manipulator.state(),
                image,
                self.config.overlay.opacity,
            ),
            _ => Ok(frame.clone()),
        }
    }

    fn apply(&mut self, command: Command, out: &mut Dispatch) -> Result<()> {
        match command {
            Command::Refresh => {
                out.update(self.products_update());
                out.update(self.cart_update()?);
                out.update(UiUpdate::ChatLog {
                    messages: self.state.chat_log.clone(),
                });
            }
            Command::Search { query } => {
                self.state.filter.query = query;
                out.update(self.products_update());
            }
            Command::Sort { mode } => {
                self.state.filter.sort = Some(mode);
                out.update(self.products_update());
            }
            Command::OpenNegotiation { product_id } => self.open_negotiation(product_id, out)?,
            Command::SubmitOffer { offer } => self.submit_offer(&offer, out)?,
            Command::AddToCart { product_id } => {
                self.state.catalog.get(product_id)?;
                let quantity = self.state.cart.add(product_id);
                tracing::info!(product_id = product_id.as_u32(), quantity, "added to cart");
                out.update(self.cart_update()?);
            }
            Command::RemoveFromCart { product_id } => {
                self.state.cart.remove(product_id);
                out.update(self.cart_update()?);
            }
            Command::SetQuantity {
                product_id,
                quantity,
            } => {
                self.state.catalog.get(product_id)?;
                self.state.cart.set_quantity(product_id, quantity);
                out.update(self.cart_update()?);
            }
            Command::ShowTrends => {
                self.show_panel(Panel::Trends, out);
                out.update(self.trends_update()?);
            }
            Command::Vote { label } => {
                let response: backend::TrendsResponse = backend::call(
                    &mut self.backend,
                    RequestKind::TrendVote,
                    &backend::VoteRequest { label },
                )?;
                out.update(UiUpdate::Trends {
                    entries: response.trends,
                });
            }
            Command::AskChat { prompt } => self.ask_chat(&prompt, out)?,
            Command::DreamGenerate { text } => self.generate_dream(&text, out)?,
            Command::OpenPanel { panel } => match panel {
                Panel::Negotiation => self.open_negotiation(None, out)?,
                Panel::Camera => self.open_camera(None, None, out)?,
                Panel::Trends => {
                    self.show_panel(Panel::Trends, out);
                    out.update(self.trends_update()?);
                }
                other => self.show_panel(other, out),
            },
            Command::ClosePanel { panel } => match panel {
                Panel::Camera => self.close_camera(out),
                Panel::Negotiation => {
                    self.state.negotiating = None;
                    self.hide_panel(Panel::Negotiation, out);
                }
                other => self.hide_panel(other, out),
            },
            Command::OpenCamera { product_id, aspect } => self.open_camera(product_id, aspect, out)?,
            Command::CameraGranted {
                ticket,
                frame,
                display,
            } => match self.state.camera.granted(ticket, frame, display) {
                Grant::Started(overlay) => {
                    out.update(UiUpdate::Camera {
                        status: self.state.camera.status(),
                    });
                    if overlay.is_some() {
                        out.update(UiUpdate::Overlay { overlay });
                    }
                }
                Grant::Stale => out.effect(Effect::ReleaseCamera),
            },
            Command::CameraDenied { ticket, message } => {
                if self.state.camera.denied(ticket) {
                    self.hide_panel(Panel::Camera, out);
                    out.update(UiUpdate::Camera {
                        status: CameraStatus::Off,
                    });
                    let err = StorefrontError::ResourceUnavailable(format!(
                        "Cannot access camera: {}\nThis demo works better on mobile with camera permissions enabled.",
                        message
                    ));
                    out.update(notice(&err, Some(Panel::Camera)));
                }
            }
            Command::CameraResized { display } => {
                let display = overlay::check_display(display)?;
                self.state.camera.resize_display(display);
            }
            Command::CloseCamera => self.close_camera(out),
            Command::SelectOverlay { product_id, aspect } => {
                self.state.catalog.get(product_id)?;
                let aspect = overlay::check_aspect(aspect.unwrap_or(1.0))?;
                let overlay = self.state.camera.select_overlay(product_id, aspect)?;
                if overlay.is_some() {
                    out.update(UiUpdate::Overlay { overlay });
                }
            }
            Command::PointerDown { pointer_id, x, y } => {
                if let Some(manipulator) = self.state.camera.overlay_mut() {
                    manipulator.pointer_down(pointer_id, x, y);
                }
            }
            Command::PointerMove { pointer_id, x, y } => {
                if let Some(manipulator) = self.state.camera.overlay_mut() {
                    if manipulator.pointer_move(pointer_id, x, y) {
                        out.update(UiUpdate::Overlay {
                            overlay: Some(*manipulator.state()),
                        });
                    }
                }
            }
            Command::PointerUp { pointer_id } => {
                if let Some(manipulator) = self.state.camera.overlay_mut() {
                    manipulator.pointer_up(pointer_id);
                }
            }
            Command::Wheel { delta_y } => {
                if let Some(manipulator) = self.state.camera.overlay_mut() {
                    if manipulator.wheel(delta_y) {
                        out.update(UiUpdate::Overlay {
                            overlay: Some(*manipulator.state()),
                        });
                    }
                }
            }
            Command::TimerFired { ticket } => self.timer_fired(ticket, out),
            Command::Escape => {
                let open: Vec<Panel> = self.state.panels.iter().copied().collect();
                if open.contains(&Panel::Camera) || self.state.camera.ticket().is_some() {
                    self.close_camera(out);
                }
                self.state.negotiating = None;
                for panel in open {
                    if !matches!(panel, Panel::SidePanel | Panel::Trends | Panel::Camera) {
                        self.hide_panel(panel, out);
                    }
                }
            }
            Command::Shutdown => {
                self.close_camera(out);
                self.state.pending.clear();
                tracing::info!("storefront shut down");
            }
        }
        Ok(())
    }

    fn open_negotiation(&mut self, product_id: Option<ProductId>, out: &mut Dispatch) -> Result<()> {
        let product = match product_id {
            Some(id) => self.state.catalog.get(id)?,
            None => self
                .state
                .catalog
                .first()
                .ok_or_else(|| StorefrontError::invalid_input("The catalog is empty"))?,
        };
        let update = UiUpdate::NegotiationOpened {
            product_id: product.id,
            title: product.title.clone(),
            list_price: format_price(&self.config.currency, product.price.as_f64()),
            tip: offer::negotiation_tip().to_string(),
        };
        self.state.negotiating = Some(product.id);
        self.show_panel(Panel::Negotiation, out);
        out.update(update);
        Ok(())
    }

    fn submit_offer(&mut self, text: &str, out: &mut Dispatch) -> Result<()> {
        let product_id = self
            .state
            .negotiating
            .ok_or_else(|| StorefrontError::invalid_input("Select a product first"))?;
        let amount = offer::parse_offer(text)?;
        let response: backend::NegotiateResponse = backend::call(
            &mut self.backend,
            RequestKind::Negotiate,
            &backend::NegotiateRequest {
                product_id,
                offer: amount,
            },
        )?;
        let text = response
            .decision
            .seller_message(amount, &self.config.currency);
        tracing::info!(product_id = product_id.as_u32(), amount, %text, "negotiation answered");
        out.update(UiUpdate::SellerMessage {
            decision: response.decision,
            text,
        });
        Ok(())
    }

    fn ask_chat(&mut self, prompt: &str, out: &mut Dispatch) -> Result<()> {
        let prompt = assistant::required_text(prompt, "Type a question first")?.to_string();
        self.state.chat_log.push(ChatMessage {
            author: ChatAuthor::You,
            text: prompt.clone(),
        });
        self.state.chat_log.push(ChatMessage {
            author: ChatAuthor::Bot,
            text: THINKING.to_string(),
        });
        let ticket = self.schedule(Deferred::ChatReply { prompt }, self.config.chat_delay_ms, out);
        tracing::debug!(ticket = ticket.as_u64(), "chat reply scheduled");
        out.update(UiUpdate::ChatLog {
            messages: self.state.chat_log.clone(),
        });
        Ok(())
    }

    fn generate_dream(&mut self, text: &str, out: &mut Dispatch) -> Result<()> {
        let text = assistant::required_text(text, "Describe your dream or need.")?.to_string();
        self.state.dream = DreamSlot::Generating {
            message: GENERATING.to_string(),
        };
        self.schedule(Deferred::DreamResults { text }, self.config.dream_delay_ms, out);
        out.update(UiUpdate::DreamResults {
            slot: self.state.dream.clone(),
        });
        Ok(())
    }

    /// Complete deferred work. Backend failures fill the pending slot with a failure line.
    fn timer_fired(&mut self, ticket: Ticket, out: &mut Dispatch) {
        let Some(deferred) = self.state.pending.remove(&ticket) else {
            tracing::debug!(ticket = ticket.as_u64(), "timer for nothing pending");
            return;
        };
        match deferred {
            Deferred::ChatReply { prompt } => {
                let context = backend::ChatContext {
                    products: self
                        .state
                        .catalog
                        .products()
                        .iter()
                        .map(|p| p.title.clone())
                        .collect(),
                };
                let response: Result<backend::ChatResponse> = backend::call(
                    &mut self.backend,
                    RequestKind::Chat,
                    &backend::ChatRequest { prompt, context },
                );
                let text = match response {
                    Ok(response) => response.answer,
                    Err(err) => {
                        tracing::warn!(ticket = ticket.as_u64(), error = %err, "chat reply failed");
                        out.update(notice(&err, Some(Panel::Chat)));
                        CHAT_UNAVAILABLE.to_string()
                    }
                };
                let answer = ChatMessage {
                    author: ChatAuthor::Bot,
                    text,
                };
                // The reply lands in the newest slot, even if a later question took it.
                match self.state.chat_log.last_mut() {
                    Some(last) => *last = answer,
                    None => self.state.chat_log.push(answer),
                }
                out.update(UiUpdate::ChatLog {
                    messages: self.state.chat_log.clone(),
                });
            }
            Deferred::DreamResults { text } => {
                let response: Result<backend::DreamResponse> = backend::call(
                    &mut self.backend,
                    RequestKind::DreamToProduct,
                    &backend::DreamRequest { prompt: text },
                );
                self.state.dream = match response {
                    Ok(response) => DreamSlot::Ready {
                        suggestions: response.suggestions,
                    },
                    Err(err) => {
                        tracing::warn!(ticket = ticket.as_u64(), error = %err, "dream suggestions failed");
                        out.update(notice(&err, Some(Panel::Dream)));
                        DreamSlot::Failed {
                            message: DREAM_UNAVAILABLE.to_string(),
                        }
                    }
                };
                out.update(UiUpdate::DreamResults {
                    slot: self.state.dream.clone(),
                });
            }
        }
    }

    fn open_camera(
        &mut self,
        product_id: Option<ProductId>,
        aspect: Option<f64>,
        out: &mut Dispatch,
    ) -> Result<()> {
        if let Some(id) = product_id {
            self.state.catalog.get(id)?;
        }
        let aspect = overlay::check_aspect(aspect.unwrap_or(1.0))?;
        let ticket = self.next_ticket();
        let overlay = product_id.map(|id| (id, aspect));
        if self.state.camera.request(ticket, overlay) {
            out.effect(Effect::ReleaseCamera);
        }
        out.effect(Effect::RequestCamera {
            ticket,
            facing_mode: "environment".to_string(),
        });
        self.show_panel(Panel::Camera, out);
        out.update(UiUpdate::Camera {
            status: self.state.camera.status(),
        });
        out.update(UiUpdate::OverlayOptions {
            options: self
                .state
                .catalog
                .products()
                .iter()
                .map(|p| OverlayOption {
                    product_id: p.id,
                    title: p.title.clone(),
                    image: p.image.clone(),
                })
                .collect(),
            selected: product_id,
        });
        Ok(())
    }

    fn close_camera(&mut self, out: &mut Dispatch) {
        if self.state.camera.close() {
            out.effect(Effect::ReleaseCamera);
        }
        self.hide_panel(Panel::Camera, out);
        out.update(UiUpdate::Camera {
            status: CameraStatus::Off,
        });
        out.update(UiUpdate::Overlay { overlay: None });
    }

    fn schedule(&mut self, deferred: Deferred, delay_ms: u32, out: &mut Dispatch) -> Ticket {
        let ticket = self.next_ticket();
        self.state.pending.insert(ticket, deferred);
        out.effect(Effect::Schedule { ticket, delay_ms });
        ticket
    }

    fn next_ticket(&mut self) -> Ticket {
        self.state.last_ticket = self.state.last_ticket.next();
        self.state.last_ticket
    }

    fn show_panel(&mut self, panel: Panel, out: &mut Dispatch) {
        self.state.panels.insert(panel);
        out.update(UiUpdate::PanelVisibility { panel, open: true });
    }

    fn hide_panel(&mut self, panel: Panel, out: &mut Dispatch) {
        self.state.panels.remove(&panel);
        out.update(UiUpdate::PanelVisibility { panel, open: false });
    }

    fn products_update(&self) -> UiUpdate {
        UiUpdate::Products {
            cards: self.cards(),
        }
    }

    fn cart_update(&self) -> Result<UiUpdate> {
        let total = self.state.cart.total(&self.state.catalog)?;
        Ok(UiUpdate::Cart {
            lines: self.state.cart.lines(),
            total: format_price(&self.config.currency, total.as_f64()),
            insights: self.state.cart.insights(self.config.impulse_threshold),
        })
    }

    fn trends_update(&mut self) -> Result<UiUpdate> {
        let response: backend::TrendsResponse =
            backend::call(&mut self.backend, RequestKind::TrendList, &serde_json::json!({}))?;
        Ok(UiUpdate::Trends {
            entries: response.trends,
        })
    }
}

/// Reject configurations the engine cannot run with.
pub fn validate_config(config: &StorefrontConfig) -> Result<()> {
    let overlay = &config.overlay;
    if !(overlay.initial_fraction > 0.0 && overlay.initial_fraction <= 1.0) {
        return Err(StorefrontError::InvalidConfig(
            "overlay.initial_fraction must be in (0, 1]".to_string(),
        ));
    }
    if !(overlay.min_width.is_finite() && overlay.min_width > 0.0) {
        return Err(StorefrontError::InvalidConfig(
            "overlay.min_width must be positive".to_string(),
        ));
    }
    if !(overlay.wheel_step.is_finite() && overlay.wheel_step > 0.0) {
        return Err(StorefrontError::InvalidConfig(
            "overlay.wheel_step must be positive".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&overlay.opacity) {
        return Err(StorefrontError::InvalidConfig(
            "overlay.opacity must be in [0, 1]".to_string(),
        ));
    }
    Ok(())
}

fn notice(err: &StorefrontError, panel: Option<Panel>) -> UiUpdate {
    UiUpdate::Notice {
        severity: err.severity(),
        panel,
        message: err.to_string(),
    }
}

/// Which surface an error from this command belongs to.
fn notice_panel(command: &Command) -> Option<Panel> {
    match command {
        Command::OpenNegotiation { .. } | Command::SubmitOffer { .. } => Some(Panel::Negotiation),
        Command::AskChat { .. } => Some(Panel::Chat),
        Command::DreamGenerate { .. } => Some(Panel::Dream),
        Command::Vote { .. } | Command::ShowTrends => Some(Panel::Trends),
        Command::OpenCamera { .. }
        | Command::SelectOverlay { .. }
        | Command::CameraGranted { .. }
        | Command::CameraDenied { .. }
        | Command::CameraResized { .. } => Some(Panel::Camera),
        Command::AddToCart { .. }
        | Command::RemoveFromCart { .. }
        | Command::SetQuantity { .. } => Some(Panel::SidePanel),
        _ => None,
    }
}
