use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use crate::video::session::{DecodeSession, FramePoll, FrameSource, SessionError, VideoFrame};

/// Events emitted toward the controller. Frames arrive in decode order;
/// `Finished` is always the last event and carries the frame to hold on
/// screen (None if nothing was ever decoded).
#[derive(Debug)]
pub enum ProducerEvent {
    Frame(VideoFrame),
    Finished(Option<VideoFrame>),
}

/// Video ahead of audio by more than this: sleep the gap away.
const SYNC_AHEAD_THRESHOLD: f64 = 0.001;
/// Video behind audio by more than this: skip the inter-frame wait to
/// catch up. Emitted frames are never retracted.
const SYNC_BEHIND_THRESHOLD: f64 = -0.05;
/// Upper bound on any single sync sleep, so a large desync never stalls
/// the loop.
const SYNC_SLEEP_CAP: Duration = Duration::from_millis(100);
/// Floor sleep when no audio reference is available; avoids a busy loop.
const SYNC_MIN_SLEEP: Duration = Duration::from_millis(1);
/// Retry interval while the decoder has no frame ready.
const POLL_RETRY: Duration = Duration::from_millis(2);

/// Runs the A/V sync loop on its own thread so the controller never blocks
/// on decode. At most one producer is alive at a time; the owner joins via
/// `stop()` before constructing a replacement.
pub struct FrameProducer {
    stop_flag: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl FrameProducer {
    /// Opens the decode session up front so startup failures surface to the
    /// caller instead of dying silently on the playback thread.
    pub fn start(
        path: &Path,
        duration: u64,
        event_tx: mpsc::Sender<ProducerEvent>,
    ) -> Result<Self, SessionError> {
        let session = DecodeSession::open(path)?;
        let stop_flag = Arc::new(AtomicBool::new(false));

        let thread_stop = Arc::clone(&stop_flag);
        let thread = thread::spawn(move || {
            sync_loop(session, duration, event_tx, thread_stop);
        });

        Ok(Self {
            stop_flag,
            thread: Some(thread),
        })
    }

    /// Signals the loop and blocks until the thread is fully gone. The
    /// wait is bounded by the loop's responsiveness to the flag (one poll
    /// or one capped sync sleep).
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FrameProducer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The playback loop: poll, emit, sync against the audio clock. Runs until
/// stop is requested, the duration cap is reached, or the stream ends.
/// Generic over the frame source so the sync policy is testable with a
/// synthetic stream.
pub(crate) fn sync_loop<S: FrameSource>(
    mut source: S,
    duration: u64,
    event_tx: mpsc::Sender<ProducerEvent>,
    stop_flag: Arc<AtomicBool>,
) {
    let started = Instant::now();
    let mut last_frame: Option<VideoFrame> = None;
    let mut frame_count = 0u64;

    while !stop_flag.load(Ordering::SeqCst) {
        if duration > 0 && started.elapsed() >= Duration::from_secs(duration) {
            log::info!("Duration limit reached: {:.2}s", started.elapsed().as_secs_f64());
            break;
        }

        let frame = match source.poll_frame() {
            FramePoll::Eof => {
                log::info!("End of stream reached");
                break;
            }
            FramePoll::Pending => {
                thread::sleep(POLL_RETRY);
                continue;
            }
            FramePoll::Frame(frame) => frame,
        };

        let video_pts = frame.pts;
        let audio_pts = source.audio_pts();

        last_frame = Some(frame.clone());
        if event_tx.send(ProducerEvent::Frame(frame)).is_err() {
            // Controller went away; nothing left to play for.
            break;
        }
        frame_count += 1;

        if audio_pts > 0.0 && video_pts > 0.0 {
            let delay = video_pts - audio_pts;
            if delay > SYNC_AHEAD_THRESHOLD {
                thread::sleep(Duration::from_secs_f64(delay).min(SYNC_SLEEP_CAP));
            } else if delay < SYNC_BEHIND_THRESHOLD {
                // Behind: fetch the next frame immediately.
                continue;
            } else {
                thread::sleep(SYNC_MIN_SLEEP);
            }
        } else {
            thread::sleep(SYNC_MIN_SLEEP);
        }
    }

    source.close();
    log::info!(
        "Playback finished: {} frames, {:.2}s",
        frame_count,
        started.elapsed().as_secs_f64()
    );
    let _ = event_tx.send(ProducerEvent::Finished(last_frame));
}
