use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rodio::{Decoder, OutputStream, Sink};
use thiserror::Error;

use crate::video::info::{self, VideoInfo};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to probe {path}: {reason}")]
    Probe { path: PathBuf, reason: String },
    #[error("failed to start decoder for {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    pub fn probe(path: &Path, reason: String) -> Self {
        SessionError::Probe {
            path: path.to_path_buf(),
            reason,
        }
    }
}

/// One decoded frame: tightly packed RGB8 at the source's native
/// resolution, with its presentation timestamp.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub pts: f64,
}

/// Non-blocking poll result. The sync loop never blocks on decode, so the
/// stop flag stays responsive.
#[derive(Debug)]
pub enum FramePoll {
    Frame(VideoFrame),
    Pending,
    Eof,
}

/// Seam between the sync loop and the decode backend; the loop is tested
/// against a synthetic implementation.
pub trait FrameSource {
    fn poll_frame(&mut self) -> FramePoll;
    /// Reference audio clock position in seconds; zero or negative when the
    /// source has no usable audio.
    fn audio_pts(&self) -> f64;
    fn close(&mut self);
}

/// Set once the audio sink actually starts; `None` means "no audio
/// reference", which the sync policy treats as free-running video.
struct AudioClock {
    started_at: Mutex<Option<Instant>>,
}

impl AudioClock {
    fn position(&self) -> f64 {
        match *self.started_at.lock().unwrap() {
            Some(started) => started.elapsed().as_secs_f64(),
            None => 0.0,
        }
    }
}

/// One ffmpeg decode session: a child process streaming rawvideo rgb24 on
/// stdout, a reader thread slicing that pipe into frames, and an audio
/// thread playing the extracted track as the sync reference.
pub struct DecodeSession {
    child: Child,
    frames: mpsc::Receiver<VideoFrame>,
    reader_thread: Option<thread::JoinHandle<()>>,
    audio_thread: Option<thread::JoinHandle<()>>,
    audio_clock: Arc<AudioClock>,
    stop_flag: Arc<AtomicBool>,
    closed: bool,
}

impl DecodeSession {
    /// Frames buffered ahead of the sync loop. The bounded channel applies
    /// backpressure so ffmpeg cannot decode unboundedly ahead.
    const FRAME_BUFFER: usize = 4;

    pub fn open(path: &Path) -> Result<Self, SessionError> {
        let info = info::probe_video(path)?;
        log::info!(
            "Starting playback: {} ({:.2}s, {}x{}, {:.2} fps)",
            path.display(),
            info.duration,
            info.width,
            info.height,
            info.fps
        );

        let mut child = Command::new("ffmpeg")
            .arg("-i")
            .arg(path)
            .args([
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-vsync",
                "cfr",
                "-an",
                "-v",
                "quiet",
                "-",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| SessionError::Spawn {
                path: path.to_path_buf(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| SessionError::Spawn {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "decoder stdout missing"),
        })?;

        let stop_flag = Arc::new(AtomicBool::new(false));
        let (frame_tx, frame_rx) = mpsc::sync_channel(Self::FRAME_BUFFER);

        let reader_stop = Arc::clone(&stop_flag);
        let reader_info = info;
        let reader_thread = thread::spawn(move || {
            Self::reader_loop(stdout, reader_info, frame_tx, reader_stop);
        });

        let audio_clock = Arc::new(AudioClock {
            started_at: Mutex::new(None),
        });
        let audio_stop = Arc::clone(&stop_flag);
        let audio_clock_ref = Arc::clone(&audio_clock);
        let audio_path = path.to_path_buf();
        let audio_thread = thread::spawn(move || {
            Self::audio_loop(audio_path, audio_clock_ref, audio_stop);
        });

        Ok(Self {
            child,
            frames: frame_rx,
            reader_thread: Some(reader_thread),
            audio_thread: Some(audio_thread),
            audio_clock,
            stop_flag,
            closed: false,
        })
    }

    /// Slices the raw pipe into frames. Presentation timestamps are derived
    /// from the CFR frame index. A truncated trailing read is a dropped
    /// frame, not an error. Dropping the sender is how EOF reaches the
    /// sync loop.
    fn reader_loop(
        mut stdout: std::process::ChildStdout,
        info: VideoInfo,
        frame_tx: mpsc::SyncSender<VideoFrame>,
        stop_flag: Arc<AtomicBool>,
    ) {
        let frame_size = (info.width * info.height * 3) as usize;
        let fps = if info.fps > 0.0 { info.fps } else { 30.0 };
        let mut frame_index = 0u64;

        loop {
            if stop_flag.load(Ordering::SeqCst) {
                break;
            }

            let mut pixels = vec![0u8; frame_size];
            match stdout.read_exact(&mut pixels) {
                Ok(()) => {
                    let frame = VideoFrame {
                        width: info.width,
                        height: info.height,
                        pixels,
                        pts: frame_index as f64 / fps,
                    };
                    frame_index += 1;
                    // Blocks when the buffer is full; a dropped receiver
                    // means the session is being torn down.
                    if frame_tx.send(frame).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::UnexpectedEof {
                        log::warn!("Decoder pipe read failed: {}", e);
                    }
                    break;
                }
            }
        }
        log::debug!("Decoder reader exiting after {} frames", frame_index);
    }

    /// Extracts the audio track into memory and plays it through rodio.
    /// The wall clock since playback began is the reference position. An
    /// audio-less source simply never starts the clock.
    fn audio_loop(path: PathBuf, clock: Arc<AudioClock>, stop_flag: Arc<AtomicBool>) {
        let child = Command::new("ffmpeg")
            .arg("-i")
            .arg(&path)
            .args(["-vn", "-acodec", "pcm_s16le", "-f", "wav", "-v", "quiet", "-"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                log::warn!("Audio extraction failed for {}: {}", path.display(), e);
                return;
            }
        };
        let Some(mut stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return;
        };

        // Pull the extracted WAV in chunks so a teardown mid-extraction
        // is observed promptly.
        let mut wav = Vec::new();
        let mut chunk = [0u8; 64 * 1024];
        loop {
            if stop_flag.load(Ordering::SeqCst) {
                let _ = child.kill();
                let _ = child.wait();
                return;
            }
            match stdout.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => wav.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    log::warn!("Audio extraction read failed: {}", e);
                    break;
                }
            }
        }
        let _ = child.wait();

        // A bare WAV header (44 bytes) with no samples means no audio track.
        if wav.len() <= 44 {
            log::info!("No audio track in {}, video will free-run", path.display());
            return;
        }

        // The output stream must stay alive on this thread while audio plays.
        let (stream, handle) = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("No audio output device: {}", e);
                return;
            }
        };
        let sink = match Sink::try_new(&handle) {
            Ok(sink) => sink,
            Err(e) => {
                log::warn!("Failed to create audio sink: {}", e);
                return;
            }
        };
        let source = match Decoder::new(Cursor::new(wav)) {
            Ok(source) => source,
            Err(e) => {
                log::warn!("Undecodable extracted audio: {}", e);
                return;
            }
        };

        sink.append(source);
        sink.play();
        *clock.started_at.lock().unwrap() = Some(Instant::now());

        while !stop_flag.load(Ordering::SeqCst) && !sink.empty() {
            thread::sleep(Duration::from_millis(50));
        }
        drop(sink);
        drop(stream);
    }
}

impl FrameSource for DecodeSession {
    fn poll_frame(&mut self) -> FramePoll {
        match self.frames.try_recv() {
            Ok(frame) => FramePoll::Frame(frame),
            Err(mpsc::TryRecvError::Empty) => FramePoll::Pending,
            Err(mpsc::TryRecvError::Disconnected) => FramePoll::Eof,
        }
    }

    fn audio_pts(&self) -> f64 {
        self.audio_clock.position()
    }

    /// Synchronous teardown: kill the decoder, then wait for both helper
    /// threads. Idempotent.
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.stop_flag.store(true, Ordering::SeqCst);
        if let Err(e) = self.child.kill() {
            log::debug!("Decoder already gone: {}", e);
        }
        let _ = self.child.wait();

        // Unblock a reader stuck on a full frame buffer.
        while self.frames.try_recv().is_ok() {}

        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.audio_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DecodeSession {
    fn drop(&mut self) {
        self.close();
    }
}
