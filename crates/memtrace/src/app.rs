//! The render loop: one eframe window showing the composited canvas.

use std::sync::Arc;
use std::time::Instant;

use egui::{Color32, TextureHandle, TextureOptions};
use image::RgbaImage;
use memtrace_core::emotion::map_category;
use memtrace_core::{
    dominant_expression, CanvasSize, Compositor, EmotionClass, EmotionIndex, ModeKey, PresentationModes, Session,
    TickReport,
};
use tokio::sync::watch;

use crate::engine::{DetectionReceiver, FrameReceiver};

pub type IndexReceiver = watch::Receiver<Option<Arc<EmotionIndex>>>;

/// Smoothing factor for the debug frame-rate readout.
const FPS_SMOOTHING: f32 = 0.1;

#[derive(Debug, Default)]
struct FrameRate {
    last: Option<Instant>,
    fps: f32,
}

impl FrameRate {
    fn update(&mut self, now: Instant) -> f32 {
        if let Some(last) = self.last {
            let dt = now.saturating_duration_since(last).as_secs_f32();
            if dt > 0.0 {
                let instant = 1.0 / dt;
                self.fps = if self.fps == 0.0 {
                    instant
                } else {
                    self.fps + (instant - self.fps) * FPS_SMOOTHING
                };
            }
        }
        self.last = Some(now);
        self.fps
    }
}

/// What debug mode reports for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugReadout {
    pub fps: f32,
    pub faces: usize,
    /// Dominant expression of the primary face and its score.
    pub emotion: Option<(String, f32)>,
    pub class: Option<EmotionClass>,
}

pub struct Installation {
    session: Session,
    compositor: Compositor,
    modes: PresentationModes,
    frames: FrameReceiver,
    detections: DetectionReceiver,
    index: IndexReceiver,
    texture: Option<TextureHandle>,
    fps: FrameRate,
    readout: Option<DebugReadout>,
}

impl Installation {
    pub fn new(
        session: Session,
        compositor: Compositor,
        frames: FrameReceiver,
        detections: DetectionReceiver,
        index: IndexReceiver,
    ) -> Self {
        Self {
            session,
            compositor,
            modes: PresentationModes::default(),
            frames,
            detections,
            index,
            texture: None,
            fps: FrameRate::default(),
            readout: None,
        }
    }

    /// Start with `modes` instead of everything off.
    pub fn with_modes(mut self, modes: PresentationModes) -> Self {
        self.modes = modes;
        self
    }

    /// Latest debug readout; `None` while debug mode is off.
    pub fn readout(&self) -> Option<&DebugReadout> {
        self.readout.as_ref()
    }

    /// Apply a mode key; returns the fullscreen change to request, if any.
    pub fn press(&mut self, key: ModeKey) -> Option<bool> {
        let fullscreen = self.modes.press(key);
        if key == ModeKey::Debug && self.modes.debug() {
            self.fps = FrameRate::default();
        }
        if !self.modes.debug() {
            self.readout = None;
        }
        tracing::info!(debug = self.modes.debug(), showcase = self.modes.showcase(), "presentation mode changed");
        fullscreen
    }

    /// Adopt the dataset index once the loader publishes it.
    fn sync_index(&mut self) {
        if !self.index.has_changed().unwrap_or(false) {
            return;
        }
        if let Some(index) = self.index.borrow_and_update().clone() {
            self.session.install_index(index);
        }
    }

    /// Advance the session and composite the newest frame against the
    /// current sample set.
    pub fn step(&mut self, now: Instant) -> (TickReport, &RgbaImage) {
        self.sync_index();

        let detections = Arc::clone(&self.detections.borrow());
        let report = self.session.tick(now, &detections);

        if self.modes.debug() {
            let fps = self.fps.update(now);
            let emotion = dominant_expression(&detections);
            let readout = DebugReadout {
                fps,
                faces: report.faces,
                emotion: emotion.map(|(name, score)| (name.to_string(), score)),
                class: emotion.map(|(name, _)| map_category(name)),
            };
            match (&readout.emotion, &readout.class) {
                (Some((emotion, score)), Some(class)) => tracing::info!(
                    target: "memtrace::debug",
                    fps,
                    emotion = emotion.as_str(),
                    score,
                    %class,
                    faces = report.faces,
                    "frame"
                ),
                _ => tracing::info!(target: "memtrace::debug", fps, faces = report.faces, "frame"),
            }
            self.readout = Some(readout);
        }

        let video = self.frames.borrow().clone();
        let samples = self.session.samples();
        let canvas = self.compositor.composite(video.as_deref().map(|f| &f.image), samples.lines());
        (report, canvas)
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let pressed = ctx.input(|i| {
            [(egui::Key::D, ModeKey::Debug), (egui::Key::S, ModeKey::Showcase)]
                .into_iter()
                .filter(|(key, _)| i.key_pressed(*key))
                .map(|(_, mode)| mode)
                .collect::<Vec<_>>()
        });

        for key in pressed {
            if let Some(on) = self.press(key) {
                ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(on));
            }
        }
    }
}

impl eframe::App for Installation {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);

        let (_, canvas) = self.step(Instant::now());
        let size = [canvas.width() as usize, canvas.height() as usize];
        let image = egui::ColorImage::from_rgba_unmultiplied(size, canvas.as_raw());

        match self.texture.as_mut() {
            Some(tex) if tex.size() == size => tex.set(image, TextureOptions::LINEAR),
            _ => self.texture = Some(ctx.load_texture("memtrace_canvas", image, TextureOptions::LINEAR)),
        }

        let canvas_size = self.compositor.canvas();
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(Color32::BLACK))
            .show(ctx, |ui| {
                if let Some(tex) = &self.texture {
                    let rect = fit_rect(ui.max_rect(), canvas_size);
                    let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                    ui.painter().image(tex.id(), rect, uv, Color32::WHITE);
                }
            });

        ctx.request_repaint();
    }
}

/// Largest rect with the canvas aspect ratio centered in `available`.
fn fit_rect(available: egui::Rect, canvas: CanvasSize) -> egui::Rect {
    if canvas.width == 0 || canvas.height == 0 {
        return available;
    }
    let scale = (available.width() / canvas.width as f32).min(available.height() / canvas.height as f32);
    let size = egui::vec2(canvas.width as f32 * scale, canvas.height as f32 * scale);
    egui::Rect::from_center_size(available.center(), size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memtrace_core::session::SessionConfig;
    use memtrace_core::{build_index, BoundingBox, Detection, DetectionFrame, DialogueRecord, ExpressionScores, TextLayout};
    use memtrace_hw::Frame;
    use std::time::Duration;

    fn installation() -> (
        Installation,
        watch::Sender<Option<Arc<Frame>>>,
        watch::Sender<Arc<DetectionFrame>>,
        watch::Sender<Option<Arc<EmotionIndex>>>,
        Instant,
    ) {
        let start = Instant::now();
        let config = SessionConfig { line_count: 3, ..SessionConfig::default() };
        let session = Session::seeded(config, start, 11);
        let compositor = Compositor::new(CanvasSize::new(64, 48), TextLayout::default());
        let (frame_tx, frame_rx) = watch::channel(None);
        let (det_tx, det_rx) = watch::channel(Arc::new(DetectionFrame::empty()));
        let (index_tx, index_rx) = watch::channel(None);
        let app = Installation::new(session, compositor, frame_rx, det_rx, index_rx);
        (app, frame_tx, det_tx, index_tx, start)
    }

    fn happy_face() -> DetectionFrame {
        let mut scores = ExpressionScores::new();
        scores.insert("happy".into(), 0.8);
        scores.insert("neutral".into(), 0.2);
        DetectionFrame::new(vec![Detection {
            bbox: BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0, confidence: 0.9 },
            expressions: scores,
        }])
    }

    #[test]
    fn test_step_without_inputs_is_transparent() {
        let (mut app, _frames, _dets, _index, start) = installation();
        let (report, canvas) = app.step(start);
        assert_eq!(report.faces, 0);
        assert_eq!((canvas.width(), canvas.height()), (64, 48));
        assert!(canvas.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_step_installs_index_and_resamples() {
        let (mut app, frames, dets, index, start) = installation();
        let records = vec![DialogueRecord {
            dialog: vec!["joy".into()],
            emotion: vec![Some("4".into())],
        }];
        index.send_replace(Some(Arc::new(build_index(&records))));
        frames.send_replace(Some(Arc::new(Frame::from_grey(&[200u8; 16 * 12], 16, 12, 0).unwrap())));

        app.step(start);
        assert!(app.session.samples().iter().all(|l| l == memtrace_core::FALLBACK_LINE));

        dets.send_replace(Arc::new(happy_face()));
        let (report, canvas) = app.step(start + Duration::from_millis(1500));
        // Text pixels reveal the video, the rest stays transparent.
        assert!(canvas.pixels().any(|p| p.0[3] == 255));
        assert!(canvas.pixels().any(|p| p.0[3] == 0));
        assert_eq!(report.faces, 1);
        assert_eq!(report.resampled, Some("4".into()));
        assert!(app.session.samples().iter().all(|l| l == "joy"));
    }

    #[test]
    fn test_debug_mode_produces_readout() {
        let (mut app, _frames, dets, _index, start) = installation();
        app.step(start);
        assert!(app.readout().is_none());

        assert_eq!(app.press(ModeKey::Debug), Some(false));
        dets.send_replace(Arc::new(happy_face()));
        app.step(start + Duration::from_millis(10));
        app.step(start + Duration::from_millis(30));

        let readout = app.readout().unwrap();
        assert_eq!(readout.faces, 1);
        assert_eq!(readout.emotion.as_ref().map(|(e, _)| e.as_str()), Some("happy"));
        assert_eq!(readout.class, Some("4".into()));
        assert!((readout.fps - 50.0).abs() < 0.5);

        app.press(ModeKey::Debug);
        assert!(app.readout().is_none());
    }

    #[test]
    fn test_reentering_debug_resets_frame_rate() {
        let (mut app, _frames, _dets, _index, start) = installation();
        app.press(ModeKey::Debug);
        app.step(start);
        app.step(start + Duration::from_millis(20));
        app.press(ModeKey::Debug);

        // A long pause with debug off must not drag the next readings down.
        app.press(ModeKey::Debug);
        let later = start + Duration::from_secs(60);
        app.step(later);
        app.step(later + Duration::from_millis(20));
        assert!((app.readout().unwrap().fps - 50.0).abs() < 0.5);
    }

    #[test]
    fn test_fullscreen_start_first_showcase_press_leaves_fullscreen() {
        let (app, _frames, _dets, _index, _start) = installation();
        let mut app = app.with_modes(PresentationModes::in_showcase());
        assert_eq!(app.press(ModeKey::Showcase), Some(false));
    }

    #[test]
    fn test_fit_rect_letterboxes() {
        let available = egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(200.0, 200.0));
        let rect = fit_rect(available, CanvasSize::new(160, 90));
        assert!((rect.width() - 200.0).abs() < 1e-3);
        assert!((rect.height() - 112.5).abs() < 1e-3);
        assert!((rect.center().y - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_frame_rate_smoothing() {
        let mut fps = FrameRate::default();
        let t = Instant::now();
        assert_eq!(fps.update(t), 0.0);
        let first = fps.update(t + Duration::from_millis(20));
        assert!((first - 50.0).abs() < 0.5);
        let second = fps.update(t + Duration::from_millis(60));
        assert!(second < first && second > 25.0);
    }
}
