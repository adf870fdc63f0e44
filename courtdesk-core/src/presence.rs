//! Debounced presence detection.
//!
//! ## Algorithm
//!
//! 1. A frame counts as "present" when at least one detected face lies fully
//!    inside the detection zone and its size is within `[min_size, max_size]`.
//! 2. Presence must hold on consecutive frames for `dwell` before firing.
//! 3. After firing, nothing fires again until `cooldown` has elapsed.
//! 4. Frames observed while the camera flag is paused reset the dwell timer
//!    and never fire.
//!
//! The camera and the face classifier live outside this crate; callers feed
//! bounding boxes per frame and forward a `true` result to
//! [`KioskEngine::presence_confirmed`](crate::engine::KioskEngine::presence_confirmed).

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Axis-aligned face bounding box in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Detection zone as fractions of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionZone {
    pub x_start: f32,
    pub x_end: f32,
    pub y_start: f32,
    pub y_end: f32,
}

impl Default for DetectionZone {
    fn default() -> Self {
        Self {
            x_start: 0.3,
            x_end: 0.7,
            y_start: 0.2,
            y_end: 0.8,
        }
    }
}

impl DetectionZone {
    /// `face` lies completely inside the zone of a `frame_width` × `frame_height` frame.
    pub fn contains(&self, face: &FaceBox, frame_width: u32, frame_height: u32) -> bool {
        let px = |fraction: f32, extent: u32| (fraction * extent as f32) as u32;
        face.x >= px(self.x_start, frame_width)
            && face.x.saturating_add(face.width) <= px(self.x_end, frame_width)
            && face.y >= px(self.y_start, frame_height)
            && face.y.saturating_add(face.height) <= px(self.y_end, frame_height)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresenceConfig {
    pub zone: DetectionZone,
    /// Smallest accepted face edge in pixels. Default: 160.
    pub min_size: u32,
    /// Largest accepted face edge in pixels. Default: 250.
    pub max_size: u32,
    /// How long a face must stay in the zone. Default: 300 ms.
    #[serde(with = "millis")]
    pub dwell: Duration,
    /// Quiet period after each firing. Default: 10 s.
    #[serde(with = "millis")]
    pub cooldown: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            zone: DetectionZone::default(),
            min_size: 160,
            max_size: 250,
            dwell: Duration::from_millis(300),
            cooldown: Duration::from_secs(10),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Turns per-frame face detections into edge-triggered presence events.
#[derive(Debug, Clone)]
pub struct PresenceDebouncer {
    config: PresenceConfig,
    /// When the current uninterrupted presence began.
    present_since: Option<Instant>,
    last_fired: Option<Instant>,
}

impl PresenceDebouncer {
    pub fn new(config: PresenceConfig) -> Self {
        Self {
            config,
            present_since: None,
            last_fired: None,
        }
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    fn accepts(&self, face: &FaceBox, frame_width: u32, frame_height: u32) -> bool {
        let size_ok = |edge: u32| (self.config.min_size..=self.config.max_size).contains(&edge);
        size_ok(face.width)
            && size_ok(face.height)
            && self.config.zone.contains(face, frame_width, frame_height)
    }

    fn cooling_down(&self, now: Instant) -> bool {
        self.last_fired
            .is_some_and(|at| now.saturating_duration_since(at) < self.config.cooldown)
    }

    /// Feed one frame's detections. Returns `true` exactly when presence is
    /// confirmed.
    pub fn observe(
        &mut self,
        faces: &[FaceBox],
        frame_width: u32,
        frame_height: u32,
        now: Instant,
        camera_paused: bool,
    ) -> bool {
        if camera_paused {
            self.present_since = None;
            return false;
        }

        let present = faces
            .iter()
            .any(|face| self.accepts(face, frame_width, frame_height));
        if !present {
            if self.present_since.take().is_some() {
                debug!("face left the detection zone");
            }
            return false;
        }

        let since = *self.present_since.get_or_insert(now);
        if now.saturating_duration_since(since) < self.config.dwell || self.cooling_down(now) {
            return false;
        }

        info!(dwell_ms = now.saturating_duration_since(since).as_millis() as u64, "presence confirmed");
        self.last_fired = Some(now);
        self.present_since = None;
        true
    }

    /// Forget dwell and cooldown state.
    pub fn reset(&mut self) {
        self.present_since = None;
        self.last_fired = None;
    }
}

impl Default for PresenceDebouncer {
    fn default() -> Self {
        Self::new(PresenceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 1280;
    const H: u32 = 720;

    /// 200 px face centred in a 1280×720 frame.
    fn centred() -> FaceBox {
        FaceBox {
            x: 540,
            y: 260,
            width: 200,
            height: 200,
        }
    }

    #[test]
    fn zone_requires_the_whole_face() {
        let zone = DetectionZone::default();
        assert!(zone.contains(&centred(), W, H));
        let edge = FaceBox { x: 300, ..centred() };
        assert!(!zone.contains(&edge, W, H));
    }

    #[test]
    fn corrupt_boxes_are_rejected_without_overflow() {
        let zone = DetectionZone::default();
        let wide = FaceBox {
            x: 500,
            width: u32::MAX,
            ..centred()
        };
        let tall = FaceBox {
            y: 300,
            height: u32::MAX,
            ..centred()
        };
        assert!(!zone.contains(&wide, W, H));
        assert!(!zone.contains(&tall, W, H));

        let mut debouncer = PresenceDebouncer::default();
        assert!(!debouncer.observe(&[wide, tall], W, H, Instant::now(), false));
    }

    #[test]
    fn fires_after_dwell_and_only_once() {
        let mut debouncer = PresenceDebouncer::default();
        let t0 = Instant::now();
        assert!(!debouncer.observe(&[centred()], W, H, t0, false));
        assert!(!debouncer.observe(&[centred()], W, H, t0 + Duration::from_millis(100), false));
        assert!(debouncer.observe(&[centred()], W, H, t0 + Duration::from_millis(400), false));
        // Still standing there during the cooldown.
        assert!(!debouncer.observe(&[centred()], W, H, t0 + Duration::from_secs(5), false));
        assert!(!debouncer.observe(&[centred()], W, H, t0 + Duration::from_secs(6), false));
    }

    #[test]
    fn fires_again_after_cooldown() {
        let mut debouncer = PresenceDebouncer::default();
        let t0 = Instant::now();
        debouncer.observe(&[centred()], W, H, t0, false);
        assert!(debouncer.observe(&[centred()], W, H, t0 + Duration::from_millis(300), false));
        let later = t0 + Duration::from_secs(11);
        debouncer.observe(&[centred()], W, H, later, false);
        assert!(debouncer.observe(&[centred()], W, H, later + Duration::from_millis(300), false));
    }

    #[test]
    fn size_window_is_enforced() {
        let mut debouncer = PresenceDebouncer::new(PresenceConfig {
            dwell: Duration::ZERO,
            ..PresenceConfig::default()
        });
        let now = Instant::now();
        let small = FaceBox { width: 120, height: 120, ..centred() };
        let large = FaceBox { x: 520, y: 220, width: 260, height: 260 };
        assert!(!debouncer.observe(&[small], W, H, now, false));
        assert!(!debouncer.observe(&[large], W, H, now, false));
        assert!(debouncer.observe(&[small, centred()], W, H, now, false));
    }

    #[test]
    fn paused_camera_restarts_the_dwell() {
        let mut debouncer = PresenceDebouncer::default();
        let t0 = Instant::now();
        debouncer.observe(&[centred()], W, H, t0, false);
        assert!(!debouncer.observe(&[centred()], W, H, t0 + Duration::from_millis(400), true));
        assert!(!debouncer.observe(&[centred()], W, H, t0 + Duration::from_millis(500), false));
        assert!(debouncer.observe(&[centred()], W, H, t0 + Duration::from_millis(800), false));
    }

    #[test]
    fn leaving_the_zone_restarts_the_dwell() {
        let mut debouncer = PresenceDebouncer::default();
        let t0 = Instant::now();
        debouncer.observe(&[centred()], W, H, t0, false);
        debouncer.observe(&[], W, H, t0 + Duration::from_millis(200), false);
        assert!(!debouncer.observe(&[centred()], W, H, t0 + Duration::from_millis(400), false));
    }

    #[test]
    fn config_reads_millisecond_durations() {
        let config: PresenceConfig =
            serde_json::from_str(r#"{"dwell": 750, "minSize": 150}"#).expect("parse");
        assert_eq!(config.dwell, Duration::from_millis(750));
        assert_eq!(config.min_size, 150);
        assert_eq!(config.cooldown, Duration::from_secs(10));
    }
}
