use std::path::PathBuf;

use crate::core::MediaKind;
use crate::ipc::Command;

/// What the screen is showing. Exactly one is current at any instant and it
/// is replaced, never mutated, on transition. The background is configured
/// once at startup and stays reachable for the whole process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Background { path: PathBuf },
    Image { path: PathBuf, duration: u64 },
    Video { path: PathBuf, duration: u64 },
}

/// Orthogonal fade axis of the machine. Only one fade animation runs at a
/// time; a fade-out request while already fading out is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeState {
    Steady,
    FadingOut,
    FadingIn,
}

/// Side effects the GUI shell executes in order. The machine itself never
/// touches the surface, timers, or threads, which keeps every transition
/// unit-testable.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CancelTimer,
    /// Synchronously tear down the active frame producer (join before
    /// anything else starts).
    StopSession,
    BeginFadeOut,
    BeginFadeIn,
    ShowBackground { path: PathBuf },
    ShowImage { path: PathBuf, duration: u64 },
    StartVideo { path: PathBuf, duration: u64 },
    /// Keep the last rendered frame on screen; used on video end-of-stream.
    HoldLastFrame,
    Shutdown,
}

/// The playback controller state machine: current content, fade axis, and
/// at most one pending transition request (last-write-wins while a fade-out
/// is in flight).
pub struct PlayerStateMachine {
    background: PathBuf,
    content: Content,
    fade: FadeState,
    pending: Option<Content>,
    session_active: bool,
    timer_armed: bool,
}

impl PlayerStateMachine {
    pub fn new(background: PathBuf) -> Self {
        let content = Content::Background {
            path: background.clone(),
        };
        Self {
            background,
            content,
            fade: FadeState::Steady,
            pending: None,
            session_active: false,
            timer_armed: false,
        }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn fade(&self) -> FadeState {
        self.fade
    }

    pub fn pending(&self) -> Option<&Content> {
        self.pending.as_ref()
    }

    pub fn session_active(&self) -> bool {
        self.session_active
    }

    /// Feeds one decoded command into the machine. `opacity` is the
    /// surface's current fade value; at zero the switch happens without a
    /// fade-out leg.
    pub fn on_command(&mut self, command: Command, opacity: f32) -> Vec<Effect> {
        match command {
            Command::Play { file, duration } => self.on_play(file, duration, opacity),
            Command::Stop => self.on_stop(),
            Command::Exit => self.on_exit(),
        }
    }

    fn on_play(&mut self, file: PathBuf, duration: u64, opacity: f32) -> Vec<Effect> {
        if !file.exists() {
            // Current content stays up; the request is dropped wholesale so
            // no fade runs against a file that cannot be shown.
            log::warn!("Ignoring play request for missing file {}", file.display());
            return Vec::new();
        }

        let next = match MediaKind::classify(&file) {
            MediaKind::Image => Content::Image {
                path: file,
                duration,
            },
            MediaKind::Video => Content::Video {
                path: file,
                duration,
            },
        };

        let mut effects = self.cancel_timer();

        if opacity > 0.0 {
            // Defer the switch behind a fade-out. A newer request simply
            // overwrites an older pending one.
            self.pending = Some(next);
            effects.extend(self.begin_fade_out());
        } else {
            effects.extend(self.apply(next));
        }
        effects
    }

    fn on_stop(&mut self) -> Vec<Effect> {
        let mut effects = self.cancel_timer();
        effects.extend(self.stop_session());

        self.pending = Some(Content::Background {
            path: self.background.clone(),
        });
        effects.extend(self.begin_fade_out());
        effects
    }

    fn on_exit(&mut self) -> Vec<Effect> {
        let mut effects = self.cancel_timer();
        effects.extend(self.stop_session());
        effects.push(Effect::Shutdown);
        effects
    }

    /// The fade-out leg finished; apply whatever transition it was paired
    /// with.
    pub fn on_fade_out_complete(&mut self) -> Vec<Effect> {
        self.fade = FadeState::Steady;
        match self.pending.take() {
            Some(next) => self.apply(next),
            None => Vec::new(),
        }
    }

    pub fn on_fade_in_complete(&mut self) -> Vec<Effect> {
        if self.fade == FadeState::FadingIn {
            self.fade = FadeState::Steady;
        }
        Vec::new()
    }

    /// Duration timer expiry holds the current display; reverting to the
    /// background takes an explicit Stop.
    pub fn on_timer_expired(&mut self) -> Vec<Effect> {
        self.timer_armed = false;
        log::debug!("Display duration elapsed, holding current content");
        Vec::new()
    }

    /// The frame producer ran out of stream (or faulted, which is reported
    /// the same way). The last decoded frame stays up.
    pub fn on_video_finished(&mut self) -> Vec<Effect> {
        self.session_active = false;
        vec![Effect::HoldLastFrame]
    }

    fn apply(&mut self, next: Content) -> Vec<Effect> {
        let mut effects = self.stop_session();

        match &next {
            Content::Background { path } => {
                effects.push(Effect::ShowBackground { path: path.clone() });
            }
            Content::Image { path, duration } => {
                effects.push(Effect::ShowImage {
                    path: path.clone(),
                    duration: *duration,
                });
                if *duration > 0 {
                    self.timer_armed = true;
                }
            }
            Content::Video { path, duration } => {
                effects.push(Effect::StartVideo {
                    path: path.clone(),
                    duration: *duration,
                });
                self.session_active = true;
            }
        }

        self.content = next;
        self.fade = FadeState::FadingIn;
        effects.push(Effect::BeginFadeIn);
        effects
    }

    fn begin_fade_out(&mut self) -> Vec<Effect> {
        if self.fade == FadeState::FadingOut {
            // Idempotent guard: one fade-out at a time.
            return Vec::new();
        }

        let mut effects = self.stop_session();
        self.fade = FadeState::FadingOut;
        effects.push(Effect::BeginFadeOut);
        effects
    }

    fn stop_session(&mut self) -> Vec<Effect> {
        if self.session_active {
            self.session_active = false;
            vec![Effect::StopSession]
        } else {
            Vec::new()
        }
    }

    fn cancel_timer(&mut self) -> Vec<Effect> {
        if self.timer_armed {
            self.timer_armed = false;
            vec![Effect::CancelTimer]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn machine() -> PlayerStateMachine {
        PlayerStateMachine::new(PathBuf::from("bg.png"))
    }

    // Play requests are existence-checked, so test media must be real
    // files. Rewriting the same name is harmless.
    fn media(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "kiosk-state-{}-{}",
            std::process::id(),
            name
        ));
        std::fs::write(&path, b"media").expect("failed to write test media file");
        path
    }

    fn play(file: &str, duration: u64) -> Command {
        Command::Play {
            file: media(file),
            duration,
        }
    }

    fn count_sessions_started(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::StartVideo { .. }))
            .count()
    }

    #[test]
    fn test_play_image_at_zero_opacity_applies_directly() {
        let mut m = machine();
        let effects = m.on_command(play("photo.png", 3), 0.0);
        assert!(effects.contains(&Effect::ShowImage {
            path: media("photo.png"),
            duration: 3
        }));
        assert!(effects.contains(&Effect::BeginFadeIn));
        assert!(!effects.contains(&Effect::BeginFadeOut));
        assert_eq!(m.fade(), FadeState::FadingIn);
    }

    #[test]
    fn test_play_at_full_opacity_defers_behind_fade_out() {
        let mut m = machine();
        let effects = m.on_command(play("clip.mp4", 5), 1.0);
        assert!(effects.contains(&Effect::BeginFadeOut));
        assert_eq!(count_sessions_started(&effects), 0);
        assert_eq!(
            m.pending(),
            Some(&Content::Video {
                path: media("clip.mp4"),
                duration: 5
            })
        );

        let effects = m.on_fade_out_complete();
        assert_eq!(count_sessions_started(&effects), 1);
        assert!(effects.contains(&Effect::BeginFadeIn));
        assert_eq!(m.pending(), None);
        assert!(m.session_active());
    }

    #[test]
    fn test_single_session_across_rapid_plays() {
        // A new video never starts before the old session stop is
        // emitted, whatever the command interleaving.
        let mut m = machine();
        m.on_command(play("a.mp4", 0), 0.0);
        assert!(m.session_active());

        // Second play while the first session runs and content is visible.
        let effects = m.on_command(play("b.mp4", 0), 1.0);
        let stop_pos = effects.iter().position(|e| *e == Effect::StopSession);
        assert!(stop_pos.is_some(), "running session must be torn down");
        assert_eq!(count_sessions_started(&effects), 0);
        assert!(!m.session_active());

        let effects = m.on_fade_out_complete();
        assert_eq!(count_sessions_started(&effects), 1);
        assert!(m.session_active());
    }

    #[test]
    fn test_stop_session_ordered_before_start() {
        let mut m = machine();
        m.on_command(play("a.mp4", 0), 0.0);
        // Direct apply at zero opacity while a session is active.
        m.fade = FadeState::Steady;
        let effects = m.on_command(play("b.mp4", 0), 0.0);
        let stop = effects.iter().position(|e| *e == Effect::StopSession).unwrap();
        let start = effects
            .iter()
            .position(|e| matches!(e, Effect::StartVideo { .. }))
            .unwrap();
        assert!(stop < start);
    }

    #[test]
    fn test_pending_request_overwrites() {
        // Play(A) then Play(B) during A's fade-out shows B, never A.
        let mut m = machine();
        m.on_command(play("a.png", 0), 1.0);
        m.on_command(play("b.png", 0), 1.0);
        assert_eq!(
            m.pending(),
            Some(&Content::Image {
                path: media("b.png"),
                duration: 0
            })
        );

        let effects = m.on_fade_out_complete();
        assert!(effects.contains(&Effect::ShowImage {
            path: media("b.png"),
            duration: 0
        }));
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::ShowImage { path, .. } if path == &media("a.png"))));
    }

    #[test]
    fn test_double_stop_triggers_one_fade_out() {
        // A second stop while already fading out must not restart the fade.
        let mut m = machine();
        let first = m.on_command(Command::Stop, 1.0);
        assert_eq!(
            first.iter().filter(|e| **e == Effect::BeginFadeOut).count(),
            1
        );

        let second = m.on_command(Command::Stop, 1.0);
        assert!(!second.contains(&Effect::BeginFadeOut));
        assert_eq!(m.fade(), FadeState::FadingOut);
    }

    #[test]
    fn test_stop_returns_to_background() {
        let mut m = machine();
        m.on_command(play("clip.mp4", 0), 0.0);
        let effects = m.on_command(Command::Stop, 1.0);
        assert!(effects.contains(&Effect::StopSession));
        assert!(effects.contains(&Effect::BeginFadeOut));

        let effects = m.on_fade_out_complete();
        assert!(effects.contains(&Effect::ShowBackground {
            path: PathBuf::from("bg.png")
        }));
        assert_eq!(
            m.content(),
            &Content::Background {
                path: PathBuf::from("bg.png")
            }
        );
    }

    #[test]
    fn test_timer_expiry_holds_content() {
        // Content stays up after its duration elapses; only a command moves on.
        let mut m = machine();
        m.on_command(play("photo.jpg", 2), 0.0);
        let effects = m.on_timer_expired();
        assert!(effects.is_empty());
        assert_eq!(
            m.content(),
            &Content::Image {
                path: media("photo.jpg"),
                duration: 2
            }
        );
        assert_eq!(m.pending(), None);
    }

    #[test]
    fn test_video_finished_holds_last_frame() {
        let mut m = machine();
        m.on_command(play("clip.mp4", 0), 0.0);
        let effects = m.on_video_finished();
        assert_eq!(effects, vec![Effect::HoldLastFrame]);
        assert!(!m.session_active());
        // Content stays Video; only the session is gone.
        assert!(matches!(m.content(), Content::Video { .. }));
    }

    #[test]
    fn test_exit_cascades_teardown() {
        let mut m = machine();
        m.on_command(play("clip.mp4", 0), 0.0);
        let effects = m.on_command(Command::Exit, 1.0);
        assert!(effects.contains(&Effect::StopSession));
        assert_eq!(effects.last(), Some(&Effect::Shutdown));
    }

    #[test]
    fn test_fade_out_with_no_pending_applies_nothing() {
        let mut m = machine();
        m.fade = FadeState::FadingOut;
        m.pending = None;
        assert!(m.on_fade_out_complete().is_empty());
        assert_eq!(m.fade(), FadeState::Steady);
    }

    #[test]
    fn test_play_during_fade_in_preempts() {
        let mut m = machine();
        m.on_command(play("a.mp4", 0), 0.0);
        assert_eq!(m.fade(), FadeState::FadingIn);

        // Mid fade-in the surface is partially visible, so the new play
        // still goes through a fade-out leg.
        let effects = m.on_command(play("b.png", 0), 0.4);
        assert!(effects.contains(&Effect::StopSession));
        assert!(effects.contains(&Effect::BeginFadeOut));
        assert_eq!(m.fade(), FadeState::FadingOut);
    }

    #[test]
    fn test_image_duration_arms_then_cancel_on_next_play() {
        let mut m = machine();
        m.on_command(play("photo.jpg", 2), 0.0);
        let effects = m.on_command(play("other.jpg", 0), 1.0);
        assert!(effects.contains(&Effect::CancelTimer));
    }

    #[test]
    fn test_play_for_missing_file_leaves_content_unchanged() {
        let mut m = machine();
        m.on_command(play("shown.png", 0), 0.0);
        let before = m.content().clone();
        let fade_before = m.fade();

        let missing = std::env::temp_dir().join(format!(
            "kiosk-state-{}-not-there.png",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&missing);
        let effects = m.on_command(
            Command::Play {
                file: missing,
                duration: 0,
            },
            1.0,
        );

        // No fade leg, no pending switch; the surface keeps what it has.
        assert!(effects.is_empty());
        assert_eq!(m.content(), &before);
        assert_eq!(m.pending(), None);
        assert_eq!(m.fade(), fade_before);
    }
}
