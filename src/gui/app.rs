use eframe::egui;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::core::PlayerConfig;
use crate::gui::fade::Fade;
use crate::ipc::{Command, IpcServer};
use crate::player::{
    load_image_surface, Effect, FitMode, GeometryCache, PlayerStateMachine, RgbSurface,
};
use crate::video::{FrameProducer, ProducerEvent, VideoFrame};

/// What is currently uploaded to the GPU. Image content is pre-scaled on
/// the CPU (Lanczos + crop) and painted 1:1; video frames are uploaded at
/// native resolution and scaled into their layout rect at paint time.
struct DisplaySurface {
    texture: egui::TextureHandle,
    source_size: (u32, u32),
    prescaled: bool,
}

/// The player window. Owns every piece of mutable playback state; the IPC
/// listener and frame producers only ever talk to it through channels.
pub struct PlayerApp {
    config: PlayerConfig,
    machine: PlayerStateMachine,
    ipc: IpcServer,
    command_rx: mpsc::Receiver<Command>,
    producer: Option<FrameProducer>,
    producer_rx: Option<mpsc::Receiver<ProducerEvent>>,
    geometry: GeometryCache,
    surface: Option<DisplaySurface>,
    opacity: f32,
    fade: Option<Fade>,
    timer_deadline: Option<Instant>,
    /// Last screen size that reported valid geometry; the fallback when the
    /// surface is momentarily unrealized.
    last_screen: (u32, u32),
    background_painted: bool,
    shutting_down: bool,
}

impl PlayerApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: PlayerConfig,
        background: PathBuf,
    ) -> anyhow::Result<Self> {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        // Failure to bind the control channel is the one fatal startup error.
        let (ipc, command_rx) = IpcServer::bind(&config)?;

        Ok(Self {
            machine: PlayerStateMachine::new(background),
            config,
            ipc,
            command_rx,
            producer: None,
            producer_rx: None,
            geometry: GeometryCache::new(),
            surface: None,
            opacity: 1.0,
            fade: None,
            timer_deadline: None,
            last_screen: (0, 0),
            background_painted: false,
            shutting_down: false,
        })
    }

    fn screen_size(&mut self, ctx: &egui::Context) -> (u32, u32) {
        let rect = ctx.screen_rect();
        let size = (rect.width().round() as u32, rect.height().round() as u32);
        if size.0 > 0 && size.1 > 0 {
            self.last_screen = size;
            size
        } else {
            // Surface not realized yet; fall back to the last known size.
            self.last_screen
        }
    }

    fn execute(&mut self, ctx: &egui::Context, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::CancelTimer => {
                    self.timer_deadline = None;
                }
                Effect::StopSession => self.teardown_session(),
                Effect::BeginFadeOut => {
                    self.fade = Some(Fade::new(self.opacity, 0.0, self.config.fade_duration()));
                }
                Effect::BeginFadeIn => {
                    self.fade = Some(Fade::new(0.0, 1.0, self.config.fade_duration()));
                    self.opacity = 0.0;
                }
                Effect::ShowBackground { path } => {
                    self.show_image_content(ctx, &path, FitMode::Fill);
                }
                Effect::ShowImage { path, duration } => {
                    self.show_image_content(ctx, &path, FitMode::Fit);
                    if duration > 0 {
                        self.timer_deadline = Some(Instant::now() + Duration::from_secs(duration));
                    }
                }
                Effect::StartVideo { path, duration } => {
                    let (event_tx, event_rx) = mpsc::channel();
                    match FrameProducer::start(&path, duration, event_tx) {
                        Ok(producer) => {
                            self.producer = Some(producer);
                            self.producer_rx = Some(event_rx);
                        }
                        Err(e) => {
                            // Treated like an immediate end-of-stream: the
                            // current surface stays up.
                            log::error!("Failed to start video {}: {}", path.display(), e);
                            queue.extend(self.machine.on_video_finished());
                        }
                    }
                }
                Effect::HoldLastFrame => {
                    // The last uploaded texture stays on screen; nothing to do.
                }
                Effect::Shutdown => {
                    log::info!("Shutting down player");
                    self.shutting_down = true;
                    self.teardown_session();
                    self.ipc.shutdown();
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            }
        }
    }

    /// Synchronous teardown of the active frame producer (joins the
    /// playback thread before returning).
    fn teardown_session(&mut self) {
        if let Some(mut producer) = self.producer.take() {
            producer.stop();
        }
        self.producer_rx = None;
    }

    fn show_image_content(&mut self, ctx: &egui::Context, path: &std::path::Path, mode: FitMode) {
        let screen = self.screen_size(ctx);
        match load_image_surface(path, screen, mode) {
            Ok(surface) => self.upload_surface(ctx, &surface, true),
            Err(e) => {
                // Recovered locally: whatever is on screen stays there.
                log::error!("Error displaying image {}: {}", path.display(), e);
            }
        }
    }

    fn upload_surface(&mut self, ctx: &egui::Context, surface: &RgbSurface, prescaled: bool) {
        let image = egui::ColorImage::from_rgb(
            [surface.width as usize, surface.height as usize],
            &surface.pixels,
        );
        let texture = ctx.load_texture("content", image, egui::TextureOptions::LINEAR);
        self.surface = Some(DisplaySurface {
            texture,
            source_size: (surface.width, surface.height),
            prescaled,
        });
    }

    fn upload_video_frame(&mut self, ctx: &egui::Context, frame: &VideoFrame) {
        let expected = (frame.width * frame.height * 3) as usize;
        if frame.pixels.len() != expected {
            log::warn!(
                "Invalid frame data size: expected {}, got {}",
                expected,
                frame.pixels.len()
            );
            return;
        }
        let surface = RgbSurface {
            width: frame.width,
            height: frame.height,
            pixels: frame.pixels.clone(),
        };
        self.upload_surface(ctx, &surface, false);
    }

    fn drain_commands(&mut self, ctx: &egui::Context) {
        while let Ok(command) = self.command_rx.try_recv() {
            let effects = self.machine.on_command(command, self.opacity);
            self.execute(ctx, effects);
        }
    }

    fn drain_producer_events(&mut self, ctx: &egui::Context) {
        let Some(rx) = self.producer_rx.as_ref() else {
            return;
        };

        let mut finished = false;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ProducerEvent::Finished(_)) {
                finished = true;
            }
            events.push(event);
        }

        for event in events {
            match event {
                ProducerEvent::Frame(frame) => self.upload_video_frame(ctx, &frame),
                ProducerEvent::Finished(last_frame) => {
                    if let Some(frame) = last_frame {
                        self.upload_video_frame(ctx, &frame);
                        log::info!("Video finished, holding last frame");
                    }
                }
            }
        }

        if finished {
            // The playback thread has already run to completion; the join
            // here is immediate.
            self.teardown_session();
            let effects = self.machine.on_video_finished();
            self.execute(ctx, effects);
        }
    }

    fn advance_fade(&mut self, ctx: &egui::Context) {
        let Some(fade) = self.fade.clone() else {
            return;
        };

        let now = Instant::now();
        self.opacity = fade.value_at(now);
        if fade.finished_at(now) {
            self.opacity = fade.target();
            self.fade = None;
            let effects = if fade.is_fade_out() {
                self.machine.on_fade_out_complete()
            } else {
                self.machine.on_fade_in_complete()
            };
            self.execute(ctx, effects);
        }
    }

    fn check_timer(&mut self, ctx: &egui::Context) {
        if let Some(deadline) = self.timer_deadline {
            if Instant::now() >= deadline {
                self.timer_deadline = None;
                let effects = self.machine.on_timer_expired();
                self.execute(ctx, effects);
            }
        }
    }

    fn paint(&mut self, ctx: &egui::Context) {
        let screen = self.screen_size(ctx);
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::from_rgb(
                self.config.backdrop_color[0],
                self.config.backdrop_color[1],
                self.config.backdrop_color[2],
            )))
            .show(ctx, |ui| {
                let Some(surface) = self.surface.as_ref() else {
                    return;
                };

                let display_size = if surface.prescaled {
                    surface.source_size
                } else {
                    self.geometry
                        .layout_for(surface.source_size, screen, FitMode::Fit)
                        .display_size()
                };

                let rect = egui::Rect::from_center_size(
                    ui.max_rect().center(),
                    egui::vec2(display_size.0 as f32, display_size.1 as f32),
                );
                let tint = egui::Color32::WHITE.gamma_multiply(self.opacity.clamp(0.0, 1.0));
                ui.painter().image(
                    surface.texture.id(),
                    rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    tint,
                );
            });
    }
}

impl eframe::App for PlayerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.shutting_down {
            return;
        }

        // First background paint waits for the surface to report valid
        // geometry, avoiding the startup race with window realization.
        if !self.background_painted {
            let screen = self.screen_size(ctx);
            if screen.0 > 0 && screen.1 > 0 {
                self.background_painted = true;
                if let crate::player::Content::Background { path } = self.machine.content().clone()
                {
                    self.show_image_content(ctx, &path, FitMode::Fill);
                }
            }
        }

        if ctx.input(|i| i.key_pressed(egui::Key::Q) || i.key_pressed(egui::Key::Escape)) {
            let effects = self.machine.on_command(Command::Exit, self.opacity);
            self.execute(ctx, effects);
        }

        self.drain_commands(ctx);
        self.drain_producer_events(ctx);
        self.advance_fade(ctx);
        self.check_timer(ctx);
        self.paint(ctx);

        if self.shutting_down {
            return;
        }

        // Animate continuously while frames or a fade are in flight;
        // otherwise wake up often enough to keep command latency low.
        if self.producer.is_some() || self.fade.is_some() {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }
}
