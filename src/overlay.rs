// Floating product overlay: direct manipulation and snapshot compositing.
// Positions are display pixels relative to the video element; compositing maps them
// onto the frame's native resolution through normalized fractions.

use std::io::Cursor;

use base64::Engine as _;
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StorefrontError};
use crate::types::*;

/// Overlay rectangle in display pixels. Height follows the source image aspect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayState {
    pub product_id: ProductId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    /// Height divided by width of the source image.
    pub aspect: f64,
}

impl OverlayState {
    /// Fresh rectangle for a new overlay session.
    pub fn start(
        product_id: ProductId,
        display: Size,
        aspect: f64,
        settings: &OverlaySettings,
    ) -> Self {
        let fraction = settings.initial_fraction;
        OverlayState {
            product_id,
            x: display.width * fraction,
            y: display.height * fraction,
            width: (display.width * fraction).max(settings.min_width),
            aspect: if aspect.is_finite() && aspect > 0.0 {
                aspect
            } else {
                1.0
            },
        }
    }

    pub fn height(&self) -> f64 {
        self.width * self.aspect
    }

    /// Rectangle as fractions of the displayed video size.
    pub fn normalized(&self, display: Size) -> Result<NormalizedRect> {
        if display.is_empty() {
            return Err(StorefrontError::ResourceUnavailable(
                "camera preview has no size yet".to_string(),
            ));
        }
        Ok(NormalizedRect {
            x: self.x / display.width,
            y: self.y / display.height,
            width: self.width / display.width,
            height: self.height() / display.height,
        })
    }
}

/// Rectangle in 0-1 units of some surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DragSession {
    pointer_id: i32,
    start_x: f64,
    start_y: f64,
    origin_x: f64,
    origin_y: f64,
}

/// Pointer capture and wheel scaling for one overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayManipulator {
    state: OverlayState,
    settings: OverlaySettings,
    drag: Option<DragSession>,
}

impl OverlayManipulator {
    pub fn new(state: OverlayState, settings: OverlaySettings) -> Self {
        OverlayManipulator {
            state,
            settings,
            drag: None,
        }
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Capture the pointer and remember where the drag began.
    pub fn pointer_down(&mut self, pointer_id: i32, client_x: f64, client_y: f64) {
        self.drag = Some(DragSession {
            pointer_id,
            start_x: client_x,
            start_y: client_y,
            origin_x: self.state.x,
            origin_y: self.state.y,
        });
    }

    /// Translate by the movement since pointer down. Returns whether the overlay moved.
    pub fn pointer_move(&mut self, pointer_id: i32, client_x: f64, client_y: f64) -> bool {
        match self.drag {
            Some(drag) if drag.pointer_id == pointer_id => {
                self.state.x = drag.origin_x + (client_x - drag.start_x);
                self.state.y = drag.origin_y + (client_y - drag.start_y);
                true
            }
            _ => false,
        }
    }

    pub fn pointer_up(&mut self, pointer_id: i32) {
        if matches!(self.drag, Some(drag) if drag.pointer_id == pointer_id) {
            self.drag = None;
        }
    }

    /// One wheel tick: scrolling down shrinks, up grows. Width never drops below the floor.
    pub fn wheel(&mut self, delta_y: f64) -> bool {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return false;
        }
        let step = if delta_y > 0.0 {
            -self.settings.wheel_step
        } else {
            self.settings.wheel_step
        };
        let next = (self.state.width + step).max(self.settings.min_width);
        let changed = next != self.state.width;
        self.state.width = next;
        changed
    }
}

/// Build an RGBA image from a raw host buffer.
pub fn rgba_from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<RgbaImage> {
    if width == 0 || height == 0 {
        return Err(StorefrontError::ResourceUnavailable(
            "video frame is empty".to_string(),
        ));
    }
    RgbaImage::from_raw(width, height, pixels).ok_or_else(|| {
        StorefrontError::Image(format!(
            "pixel buffer does not match {}x{} RGBA",
            width, height
        ))
    })
}

/// Largest height-to-width ratio accepted for an overlay image.
pub const MAX_ASPECT: f64 = 100.0;

/// Check a host-reported image aspect (height / width).
pub fn check_aspect(aspect: f64) -> Result<f64> {
    if aspect.is_finite() && aspect >= 1.0 / MAX_ASPECT && aspect <= MAX_ASPECT {
        Ok(aspect)
    } else {
        Err(StorefrontError::invalid_input(format!(
            "Overlay image aspect {} is out of range",
            aspect
        )))
    }
}

/// Check a host-reported preview size.
pub fn check_display(display: Size) -> Result<Size> {
    if display.width.is_finite() && display.height.is_finite() && !display.is_empty() {
        Ok(display)
    } else {
        Err(StorefrontError::ResourceUnavailable(format!(
            "camera preview size {}x{} is unusable",
            display.width, display.height
        )))
    }
}

/// Draw the overlay image onto a copy of the frame.
///
/// The overlay rectangle is normalized against the displayed video size and then
/// scaled to the frame's native pixels, so the snapshot matches what the user saw
/// regardless of how the preview was letterboxed or resized. Only the part that
/// lands inside the frame is resampled.
pub fn compose(
    frame: &RgbaImage,
    display: Size,
    overlay: &OverlayState,
    overlay_image: &RgbaImage,
    opacity: f32,
) -> Result<RgbaImage> {
    let rect = overlay.normalized(display)?;
    let (frame_w, frame_h) = frame.dimensions();
    let (frame_wf, frame_hf) = (frame_w as f64, frame_h as f64);

    let dest_x = (rect.x * frame_wf).round();
    let dest_y = (rect.y * frame_hf).round();
    let dest_w = (rect.width * frame_wf).round();
    let dest_h = (rect.height * frame_hf).round();
    if ![dest_x, dest_y, dest_w, dest_h].iter().all(|v| v.is_finite()) {
        return Err(StorefrontError::invalid_input(
            "Overlay position is out of range",
        ));
    }

    let mut composite = frame.clone();
    if dest_w < 1.0 || dest_h < 1.0 || overlay_image.width() == 0 || overlay_image.height() == 0 {
        tracing::warn!(dest_w, dest_h, "overlay too small to draw, snapshot has frame only");
        return Ok(composite);
    }

    // Visible part of the destination, in frame pixels.
    let left = dest_x.max(0.0);
    let top = dest_y.max(0.0);
    let right = (dest_x + dest_w).min(frame_wf);
    let bottom = (dest_y + dest_h).min(frame_hf);
    if right <= left || bottom <= top {
        tracing::debug!(dest_x, dest_y, dest_w, dest_h, "overlay outside the frame");
        return Ok(composite);
    }
    let (visible_w, visible_h) = ((right - left) as u32, (bottom - top) as u32);

    let mut patch = if dest_w <= frame_wf && dest_h <= frame_hf {
        let scaled = imageops::resize(
            overlay_image,
            dest_w as u32,
            dest_h as u32,
            FilterType::Triangle,
        );
        imageops::crop_imm(
            &scaled,
            (left - dest_x) as u32,
            (top - dest_y) as u32,
            visible_w,
            visible_h,
        )
        .to_image()
    } else {
        // Larger than the frame: sample each visible pixel instead of scaling the whole image.
        RgbaImage::from_fn(visible_w, visible_h, |px, py| {
            let u = ((left + px as f64 + 0.5 - dest_x) / dest_w).clamp(0.0, 1.0);
            let v = ((top + py as f64 + 0.5 - dest_y) / dest_h).clamp(0.0, 1.0);
            imageops::sample_bilinear(overlay_image, u as f32, v as f32)
                .unwrap_or(Rgba([0, 0, 0, 0]))
        })
    };

    let opacity = opacity.clamp(0.0, 1.0);
    if opacity < 1.0 {
        for pixel in patch.pixels_mut() {
            pixel.0[3] = (pixel.0[3] as f32 * opacity).round() as u8;
        }
    }

    imageops::overlay(&mut composite, &patch, left as i64, top as i64);
    tracing::debug!(
        frame_w,
        frame_h,
        dest_x,
        dest_y,
        dest_w,
        dest_h,
        visible_w,
        visible_h,
        "overlay composited"
    );
    Ok(composite)
}

/// Encode as PNG and wrap in a data URL.
pub fn png_data_url(image: &RgbaImage) -> Result<String> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:image/png;base64,{}", encoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_color(pixel: &Rgba<u8>, rgb: [u8; 3]) -> bool {
        pixel.0[..3]
            .iter()
            .zip(rgb)
            .all(|(&a, b)| (a as i16 - b as i16).abs() <= 2)
    }

    fn start(display: Size) -> OverlayState {
        OverlayState::start(ProductId::new(1), display, 1.0, &OverlaySettings::default())
    }

    #[test]
    fn session_starts_at_thirty_percent() {
        let state = start(Size::new(640.0, 480.0));
        assert_eq!(state.x, 192.0);
        assert_eq!(state.y, 144.0);
        assert_eq!(state.width, 192.0);
        assert_eq!(state.height(), 192.0);
    }

    #[test]
    fn drag_translates_by_delta() {
        let mut m = OverlayManipulator::new(start(Size::new(640.0, 480.0)), OverlaySettings::default());
        assert!(!m.pointer_move(1, 10.0, 10.0), "no capture yet");

        m.pointer_down(1, 100.0, 100.0);
        assert!(m.pointer_move(1, 130.0, 90.0));
        assert_eq!(m.state().x, 222.0);
        assert_eq!(m.state().y, 134.0);

        // Another pointer does not steal the drag.
        assert!(!m.pointer_move(2, 500.0, 500.0));

        m.pointer_up(1);
        assert!(!m.is_dragging());
        assert!(!m.pointer_move(1, 0.0, 0.0));
        assert_eq!(m.state().x, 222.0);
    }

    #[test]
    fn wheel_scales_with_floor() {
        let mut m = OverlayManipulator::new(start(Size::new(200.0, 200.0)), OverlaySettings::default());
        assert_eq!(m.state().width, 60.0);

        assert!(m.wheel(-120.0));
        assert_eq!(m.state().width, 70.0);

        for _ in 0..10 {
            m.wheel(120.0);
        }
        assert_eq!(m.state().width, 40.0);
        assert!(!m.wheel(120.0));
        assert!(!m.wheel(0.0));
    }

    #[test]
    fn normalized_requires_display() {
        let state = start(Size::new(640.0, 480.0));
        assert!(state.normalized(Size::default()).is_err());
        let rect = state.normalized(Size::new(640.0, 480.0)).unwrap();
        assert!((rect.x - 0.3).abs() < 1e-9);
        assert!((rect.height - 0.4).abs() < 1e-9);
    }

    #[test]
    fn compose_maps_display_to_native_pixels() {
        // 100x100 display over a 200x200 native frame: everything doubles.
        let frame = RgbaImage::from_pixel(200, 200, Rgba([0, 0, 0, 255]));
        let overlay_image = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let state = OverlayState {
            product_id: ProductId::new(1),
            x: 10.0,
            y: 20.0,
            width: 40.0,
            aspect: 1.0,
        };

        let out = compose(&frame, Size::new(100.0, 100.0), &state, &overlay_image, 1.0).unwrap();
        assert_eq!(out.dimensions(), (200, 200));
        assert!(is_color(out.get_pixel(25, 45), [255, 0, 0]));
        assert!(is_color(out.get_pixel(19, 45), [0, 0, 0]));
        assert!(is_color(out.get_pixel(25, 39), [0, 0, 0]));
        assert!(is_color(out.get_pixel(99, 119), [255, 0, 0]));
        assert!(is_color(out.get_pixel(101, 121), [0, 0, 0]));
        // The source frame is untouched.
        assert_eq!(frame.get_pixel(25, 45), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn compose_clips_offscreen_overlay() {
        let frame = RgbaImage::from_pixel(50, 50, Rgba([0, 0, 0, 255]));
        let overlay_image = RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255]));
        let state = OverlayState {
            product_id: ProductId::new(1),
            x: -10.0,
            y: -10.0,
            width: 20.0,
            aspect: 1.0,
        };
        let out = compose(&frame, Size::new(50.0, 50.0), &state, &overlay_image, 1.0).unwrap();
        assert!(is_color(out.get_pixel(0, 0), [0, 255, 0]));
        assert!(is_color(out.get_pixel(20, 20), [0, 0, 0]));
    }

    #[test]
    fn sub_pixel_display_only_draws_visible_part() {
        let frame = RgbaImage::from_pixel(1280, 720, Rgba([0, 0, 0, 255]));
        let overlay_image = RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255]));
        let state = OverlayState {
            product_id: ProductId::new(1),
            x: 0.0,
            y: 0.0,
            width: 40.0,
            aspect: 1.0,
        };
        // 40 display pixels over a 0.001 wide preview covers the frame many times over.
        let out = compose(&frame, Size::new(0.001, 0.001), &state, &overlay_image, 1.0).unwrap();
        assert_eq!(out.dimensions(), (1280, 720));
        assert!(is_color(out.get_pixel(0, 0), [255, 0, 0]));
        assert!(is_color(out.get_pixel(1279, 719), [255, 0, 0]));
    }

    #[test]
    fn tall_overlay_is_clipped_to_frame() {
        let frame = RgbaImage::from_pixel(1280, 720, Rgba([0, 0, 0, 255]));
        let overlay_image = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        let state = OverlayState {
            product_id: ProductId::new(1),
            x: 192.0,
            y: 108.0,
            width: 192.0,
            aspect: 1e9,
        };
        let out = compose(&frame, Size::new(640.0, 360.0), &state, &overlay_image, 1.0).unwrap();
        assert!(is_color(out.get_pixel(500, 700), [0, 0, 255]));
        assert!(is_color(out.get_pixel(100, 700), [0, 0, 0]));
        assert!(is_color(out.get_pixel(500, 100), [0, 0, 0]));
    }

    #[test]
    fn overlay_outside_frame_leaves_frame() {
        let frame = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        let overlay_image = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        let state = OverlayState {
            product_id: ProductId::new(1),
            x: 500.0,
            y: 0.0,
            width: 10.0,
            aspect: 1.0,
        };
        let out = compose(&frame, Size::new(20.0, 20.0), &state, &overlay_image, 1.0).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn host_sizes_are_checked() {
        assert_eq!(check_aspect(0.75).unwrap(), 0.75);
        assert!(matches!(check_aspect(1e9), Err(StorefrontError::InvalidInput(_))));
        assert!(check_aspect(f64::NAN).is_err());
        assert!(check_aspect(0.0).is_err());

        assert!(check_display(Size::new(640.0, 360.0)).is_ok());
        assert!(check_display(Size::new(0.001, 0.001)).is_ok());
        assert!(matches!(
            check_display(Size::new(f64::INFINITY, 360.0)),
            Err(StorefrontError::ResourceUnavailable(_))
        ));
        assert!(check_display(Size::new(-1.0, 360.0)).is_err());
    }

    #[test]
    fn opacity_blends_with_frame() {
        let frame = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let overlay_image = RgbaImage::from_pixel(10, 10, Rgba([200, 200, 200, 255]));
        let state = OverlayState {
            product_id: ProductId::new(1),
            x: 0.0,
            y: 0.0,
            width: 10.0,
            aspect: 1.0,
        };
        let out = compose(&frame, Size::new(10.0, 10.0), &state, &overlay_image, 0.5).unwrap();
        let red = out.get_pixel(5, 5).0[0];
        assert!(red > 80 && red < 120, "expected a blend, got {red}");
    }

    #[test]
    fn raw_buffer_must_match_dimensions() {
        assert!(rgba_from_raw(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            rgba_from_raw(2, 2, vec![0; 15]),
            Err(StorefrontError::Image(_))
        ));
        assert!(matches!(
            rgba_from_raw(0, 2, vec![]),
            Err(StorefrontError::ResourceUnavailable(_))
        ));
    }

    #[test]
    fn data_url_is_png() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        let url = png_data_url(&image).unwrap();
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }
}
