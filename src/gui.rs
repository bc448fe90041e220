use crate::lifecycle::{CloseAction, CloseGuard, RunFlag};
use crate::presentation::{CaptureStatus, Presentation, Snapshot};
use crate::types::*;
use eframe::egui;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ═══ COLORS ═══
const KEY_DOWN: egui::Color32 = egui::Color32::from_rgb(0x60, 0xa5, 0xfa);
const KEY_UP: egui::Color32 = egui::Color32::WHITE;
const KEY_BORDER: egui::Color32 = egui::Color32::from_rgb(60, 60, 60);
const KEY_LABEL: egui::Color32 = egui::Color32::BLACK;
const VIDEO_BG: egui::Color32 = egui::Color32::from_rgb(30, 30, 30);
const ERR_TXT: egui::Color32 = egui::Color32::from_rgb(200, 40, 40);

// ═══ LAYOUT ═══
const WINDOW_SIZE: [f32; 2] = [960.0, 640.0];
const KEY_SIZE: egui::Vec2 = egui::vec2(80.0, 240.0);
const KEY_GAP: f32 = 6.0;
/// Largest upscale applied to the camera image.
const MAX_VIDEO_SCALE: f32 = 1.5;

/// Scale for a `frame` sized image inside `avail`: up to 3/2, shrunk to fit.
fn fit_scale(frame: egui::Vec2, avail: egui::Vec2) -> f32 {
    if frame.x <= 0.0 || frame.y <= 0.0 {
        return 0.0;
    }
    MAX_VIDEO_SCALE
        .min(avail.x / frame.x)
        .min(avail.y / frame.y)
        .max(0.0)
}

pub struct PianoApp {
    presentation: Arc<Presentation>,
    run: RunFlag,
    close: CloseGuard,
    texture: Option<egui::TextureHandle>,
    /// `frame_seq` of the image currently in `texture`.
    shown_seq: u64,
    refresh: Duration,
}

impl PianoApp {
    pub fn new(
        presentation: Arc<Presentation>,
        run: RunFlag,
        refresh: Duration,
        close_grace: Duration,
        cc: &eframe::CreationContext<'_>,
    ) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::light());
        Self {
            presentation,
            close: CloseGuard::new(run.clone(), close_grace),
            run,
            texture: None,
            shown_seq: 0,
            refresh,
        }
    }

    fn handle_close(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        if ctx.input(|i| i.viewport().close_requested()) {
            if self.close.on_close_requested(now) == CloseAction::Defer {
                ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            }
        } else if self.close.grace_elapsed(now) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    /// Re-upload the camera image only when a new frame was published.
    fn sync_texture(&mut self, ctx: &egui::Context, snap: &Snapshot) {
        let Some(frame) = snap.frame.as_ref() else {
            return;
        };
        if self.texture.is_some() && snap.frame_seq == self.shown_seq {
            return;
        }
        let image = egui::ColorImage::from_rgb(
            [frame.width as usize, frame.height as usize],
            &frame.data,
        );
        match self.texture.as_mut() {
            Some(tex) => tex.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("camera", image, egui::TextureOptions::LINEAR))
            }
        }
        self.shown_seq = snap.frame_seq;
    }

    fn draw_video(&self, ui: &mut egui::Ui, snap: &Snapshot, max: egui::Vec2) {
        let placeholder = |ui: &mut egui::Ui, text: &str, color: egui::Color32| {
            let size = egui::vec2(
                (CAPTURE_WIDTH as f32).min(max.x),
                (CAPTURE_HEIGHT as f32).min(max.y),
            );
            let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
            let painter = ui.painter_at(rect);
            painter.rect_filled(rect, 4.0, VIDEO_BG);
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                text,
                egui::FontId::proportional(22.0),
                color,
            );
        };

        match (&snap.status, &self.texture) {
            (CaptureStatus::CameraNotFound(_), _) => {
                placeholder(ui, "Camera not found", ERR_TXT);
            }
            (_, Some(tex)) => {
                let size = tex.size_vec2();
                let scale = fit_scale(size, max);
                ui.image((tex.id(), size * scale));
            }
            (_, None) => {
                placeholder(ui, "Initializing camera…", egui::Color32::LIGHT_GRAY);
            }
        }
    }

    fn draw_keys(&self, ui: &mut egui::Ui, keys: KeySet) {
        ui.horizontal(|ui| {
            ui.spacing_mut().item_spacing = egui::vec2(KEY_GAP, 0.0);
            for key in Key::ALL {
                let (rect, _) = ui.allocate_exact_size(KEY_SIZE, egui::Sense::hover());
                let painter = ui.painter_at(rect);
                let fill = if keys.contains(key) { KEY_DOWN } else { KEY_UP };
                painter.rect_filled(rect, 4.0, fill);
                painter.rect_stroke(rect, 4.0, egui::Stroke::new(1.5, KEY_BORDER));
                painter.text(
                    rect.center_bottom() - egui::vec2(0.0, 30.0),
                    egui::Align2::CENTER_CENTER,
                    key.label(),
                    egui::FontId::proportional(28.0),
                    KEY_LABEL,
                );
            }
        });
    }
}

impl eframe::App for PianoApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_close(ctx);

        let snap = self.presentation.snapshot();
        self.sync_texture(ctx, &snap);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.heading(egui::RichText::new("Virtual Piano").strong());
                ui.add_space(6.0);

                let avail = ui.available_size();
                let keys_w = KEY_SIZE.x * 5.0 + KEY_GAP * 4.0;
                ui.horizontal(|ui| {
                    let video_max = egui::vec2(avail.x - keys_w - 24.0, avail.y - 30.0);
                    self.draw_video(ui, &snap, video_max);
                    ui.add_space(12.0);
                    ui.vertical(|ui| {
                        ui.add_space(((avail.y - KEY_SIZE.y) / 2.0 - 30.0).max(0.0));
                        self.draw_keys(ui, snap.keys);
                    });
                });

                ui.add_space(4.0);
                ui.label(egui::RichText::new(format!("FPS: {:.1}", snap.fps)).monospace());
                if self.close.is_closing() {
                    ui.label("Stopping…");
                }
            });
        });

        if self.run.is_running() || self.close.is_closing() {
            ctx.request_repaint_after(self.refresh);
        }
    }
}

/// Open the window on the calling thread and block until it closes.
pub fn run(
    presentation: Arc<Presentation>,
    run: RunFlag,
    refresh: Duration,
    close_grace: Duration,
) -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(WINDOW_SIZE)
            .with_resizable(false)
            .with_title("Virtual Piano"),
        ..Default::default()
    };

    eframe::run_native(
        "Virtual Piano",
        options,
        Box::new(move |cc| {
            Ok(Box::new(PianoApp::new(presentation, run, refresh, close_grace, cc)))
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_scale_caps_upscale() {
        let s = fit_scale(egui::vec2(320.0, 240.0), egui::vec2(2000.0, 2000.0));
        assert_eq!(s, 1.5);
    }

    #[test]
    fn test_fit_scale_shrinks_to_fit() {
        let s = fit_scale(egui::vec2(640.0, 480.0), egui::vec2(320.0, 480.0));
        assert!((s - 0.5).abs() < 1e-6);
        assert_eq!(fit_scale(egui::vec2(0.0, 480.0), egui::vec2(100.0, 100.0)), 0.0);
    }
}
