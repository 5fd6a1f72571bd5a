// Camera session lifecycle for the virtual room overlay.
// Acquisition is asynchronous on the host: a request carries a ticket and the host answers
// with a grant or denial for that ticket. A held stream must be released on every exit path.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorefrontError};
use crate::overlay::{OverlayManipulator, OverlayState};
use crate::types::*;

/// Where the camera session stands.
#[derive(Debug, Clone, PartialEq)]
enum SessionState {
    Closed,
    Acquiring {
        ticket: Ticket,
    },
    Live {
        ticket: Ticket,
        frame: Size,
        display: Size,
        overlay: Option<OverlayManipulator>,
    },
}

/// Host-facing status, sent with view updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum CameraStatus {
    Off,
    Requesting { ticket: Ticket },
    Live { frame: Size },
}

/// Outcome of a grant from the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Grant {
    /// The session is live; carries the initial overlay if one was chosen.
    Started(Option<OverlayState>),
    /// Nobody is waiting for this stream any more. The host must stop it.
    Stale,
}

/// Overlay choice made before the stream arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingOverlay {
    product_id: ProductId,
    aspect: f64,
}

/// One camera session at a time.
#[derive(Debug, Clone)]
pub struct CameraSession {
    state: SessionState,
    pending_overlay: Option<PendingOverlay>,
    settings: OverlaySettings,
}

impl CameraSession {
    pub fn new(settings: OverlaySettings) -> Self {
        CameraSession {
            state: SessionState::Closed,
            pending_overlay: None,
            settings,
        }
    }

    pub fn status(&self) -> CameraStatus {
        match &self.state {
            SessionState::Closed => CameraStatus::Off,
            SessionState::Acquiring { ticket } => CameraStatus::Requesting { ticket: *ticket },
            SessionState::Live { frame, .. } => CameraStatus::Live { frame: *frame },
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, SessionState::Live { .. })
    }

    /// Begin acquiring a stream. Returns true when a live stream was dropped
    /// and must be released by the host.
    pub fn request(&mut self, ticket: Ticket, overlay: Option<(ProductId, f64)>) -> bool {
        let released = self.close();
        self.pending_overlay = overlay.map(|(product_id, aspect)| PendingOverlay {
            product_id,
            aspect,
        });
        self.state = SessionState::Acquiring { ticket };
        tracing::info!(ticket = ticket.as_u64(), "camera requested");
        released
    }

    /// The host obtained a stream for `ticket`.
    pub fn granted(&mut self, ticket: Ticket, frame: Size, display: Size) -> Grant {
        match self.state {
            SessionState::Acquiring { ticket: pending } if pending == ticket => {}
            _ => {
                tracing::warn!(ticket = ticket.as_u64(), "stale camera grant, releasing");
                return Grant::Stale;
            }
        }

        let overlay = self.pending_overlay.take().map(|pending| {
            OverlayManipulator::new(
                OverlayState::start(pending.product_id, display, pending.aspect, &self.settings),
                self.settings,
            )
        });
        let initial = overlay.as_ref().map(|m| *m.state());
        self.state = SessionState::Live {
            ticket,
            frame,
            display,
            overlay,
        };
        tracing::info!(ticket = ticket.as_u64(), frame_w = frame.width, frame_h = frame.height, "camera live");
        Grant::Started(initial)
    }

    /// The host could not get a stream. Returns true when the denial matched
    /// the pending request, in which case the session is closed again.
    pub fn denied(&mut self, ticket: Ticket) -> bool {
        match self.state {
            SessionState::Acquiring { ticket: pending } if pending == ticket => {
                self.state = SessionState::Closed;
                self.pending_overlay = None;
                tracing::warn!(ticket = ticket.as_u64(), "camera denied");
                true
            }
            _ => false,
        }
    }

    /// End the session. Returns true when a stream was held and must be released.
    /// A request still in flight becomes stale; its grant is released on arrival.
    pub fn close(&mut self) -> bool {
        let held = self.is_live();
        if !matches!(self.state, SessionState::Closed) {
            tracing::info!(held, "camera session closed");
        }
        self.state = SessionState::Closed;
        self.pending_overlay = None;
        held
    }

    /// Swap the overlay product. Resets the rectangle.
    pub fn select_overlay(&mut self, product_id: ProductId, aspect: f64) -> Result<Option<OverlayState>> {
        match &mut self.state {
            SessionState::Closed => Err(StorefrontError::invalid_input("Open the camera first")),
            SessionState::Acquiring { .. } => {
                self.pending_overlay = Some(PendingOverlay { product_id, aspect });
                Ok(None)
            }
            SessionState::Live {
                display, overlay, ..
            } => {
                let state = OverlayState::start(product_id, *display, aspect, &self.settings);
                *overlay = Some(OverlayManipulator::new(state, self.settings));
                Ok(Some(state))
            }
        }
    }

    /// The preview element changed size.
    pub fn resize_display(&mut self, size: Size) {
        if let SessionState::Live { display, .. } = &mut self.state {
            *display = size;
        }
    }

    pub fn display(&self) -> Option<Size> {
        match &self.state {
            SessionState::Live { display, .. } => Some(*display),
            _ => None,
        }
    }

    pub fn overlay(&self) -> Option<&OverlayManipulator> {
        match &self.state {
            SessionState::Live { overlay, .. } => overlay.as_ref(),
            _ => None,
        }
    }

    pub fn overlay_mut(&mut self) -> Option<&mut OverlayManipulator> {
        match &mut self.state {
            SessionState::Live { overlay, .. } => overlay.as_mut(),
            _ => None,
        }
    }

    pub fn ticket(&self) -> Option<Ticket> {
        match &self.state {
            SessionState::Closed => None,
            SessionState::Acquiring { ticket } | SessionState::Live { ticket, .. } => Some(*ticket),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CameraSession {
        CameraSession::new(OverlaySettings::default())
    }

    const FRAME: Size = Size {
        width: 1280.0,
        height: 720.0,
    };
    const DISPLAY: Size = Size {
        width: 640.0,
        height: 360.0,
    };

    #[test]
    fn grant_starts_pending_overlay() {
        let mut camera = session();
        assert!(!camera.request(Ticket::new(1), Some((ProductId::new(2), 1.0))));
        assert_eq!(camera.status(), CameraStatus::Requesting { ticket: Ticket::new(1) });

        match camera.granted(Ticket::new(1), FRAME, DISPLAY) {
            Grant::Started(Some(state)) => {
                assert_eq!(state.product_id, ProductId::new(2));
                assert_eq!(state.x, 192.0);
                assert_eq!(state.y, 108.0);
            }
            other => panic!("unexpected grant: {other:?}"),
        }
        assert!(camera.is_live());
    }

    #[test]
    fn denial_restores_closed_state() {
        let mut camera = session();
        camera.request(Ticket::new(1), None);
        assert!(!camera.denied(Ticket::new(7)), "unrelated ticket ignored");
        assert!(camera.denied(Ticket::new(1)));
        assert_eq!(camera.status(), CameraStatus::Off);
    }

    #[test]
    fn grant_after_close_is_stale() {
        let mut camera = session();
        camera.request(Ticket::new(1), None);
        assert!(!camera.close(), "nothing held yet");
        assert_eq!(camera.granted(Ticket::new(1), FRAME, DISPLAY), Grant::Stale);
        assert!(!camera.is_live());
    }

    #[test]
    fn reopening_releases_live_stream() {
        let mut camera = session();
        camera.request(Ticket::new(1), None);
        camera.granted(Ticket::new(1), FRAME, DISPLAY);
        assert!(camera.request(Ticket::new(2), None));
        // The old ticket can no longer complete.
        assert_eq!(camera.granted(Ticket::new(1), FRAME, DISPLAY), Grant::Stale);
    }

    #[test]
    fn close_reports_held_stream() {
        let mut camera = session();
        camera.request(Ticket::new(1), None);
        camera.granted(Ticket::new(1), FRAME, DISPLAY);
        assert!(camera.close());
        assert!(!camera.close());
    }

    #[test]
    fn overlay_selection() {
        let mut camera = session();
        assert!(camera.select_overlay(ProductId::new(1), 1.0).is_err());

        camera.request(Ticket::new(1), None);
        assert_eq!(camera.select_overlay(ProductId::new(3), 0.5).unwrap(), None);
        camera.granted(Ticket::new(1), FRAME, DISPLAY);
        assert_eq!(camera.overlay().unwrap().state().product_id, ProductId::new(3));

        let state = camera.select_overlay(ProductId::new(1), 2.0).unwrap().unwrap();
        assert_eq!(state.product_id, ProductId::new(1));
        assert_eq!(state.height(), state.width * 2.0);
    }
}
