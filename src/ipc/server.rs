use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use crate::core::PlayerConfig;
use crate::ipc::protocol::{self, ChannelError, Command, ACK_ERROR, ACK_OK};

/// Listening side of the command channel. Owns the bound socket artifact
/// and the listener thread; decoded commands are handed to the player
/// through an mpsc channel so the GUI thread never touches the socket.
pub struct IpcServer {
    running: Arc<AtomicBool>,
    listener_thread: Option<thread::JoinHandle<()>>,
}

impl IpcServer {
    /// Binds the well-known socket path and starts the accept loop.
    /// A stale artifact left behind by a crashed instance is removed
    /// before binding. Failure here is the one startup error the player
    /// treats as fatal.
    pub fn bind(config: &PlayerConfig) -> Result<(Self, mpsc::Receiver<Command>), ChannelError> {
        let socket_path = config.socket_path.clone();

        if socket_path.exists() {
            log::warn!("Removing stale control socket at {}", socket_path.display());
            std::fs::remove_file(&socket_path).map_err(|source| ChannelError::Bind {
                path: socket_path.clone(),
                source,
            })?;
        }

        let listener = UnixListener::bind(&socket_path).map_err(|source| ChannelError::Bind {
            path: socket_path.clone(),
            source,
        })?;
        // Non-blocking accept so the loop can observe the shutdown flag
        // within one poll interval.
        listener.set_nonblocking(true).map_err(|source| ChannelError::Bind {
            path: socket_path.clone(),
            source,
        })?;

        log::info!("Control channel listening on {}", socket_path.display());

        // Record our pid next to the socket; restart callers use it to
        // force-terminate an instance that stops answering.
        let pid_path = config.pid_path();
        if let Err(e) = std::fs::write(&pid_path, std::process::id().to_string()) {
            log::warn!("Could not record instance pid at {}: {}", pid_path.display(), e);
        }

        let (command_tx, command_rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let poll_interval = config.accept_poll();

        let thread_running = Arc::clone(&running);
        let thread_path = socket_path.clone();
        let thread_pid_path = pid_path.clone();
        let listener_thread = thread::spawn(move || {
            Self::listener_loop(listener, command_tx, thread_running, poll_interval);
            // Clean shutdown removes the artifacts; a crash leaves them
            // for the next bind to clear.
            if let Err(e) = std::fs::remove_file(&thread_path) {
                log::debug!("Control socket already gone at shutdown: {}", e);
            }
            let _ = std::fs::remove_file(&thread_pid_path);
        });

        Ok((
            Self {
                running,
                listener_thread: Some(listener_thread),
            },
            command_rx,
        ))
    }

    fn listener_loop(
        listener: UnixListener,
        command_tx: mpsc::Sender<Command>,
        running: Arc<AtomicBool>,
        poll_interval: Duration,
    ) {
        // Nap briefly between accept attempts; the configured poll interval
        // only bounds how stale the shutdown check may get.
        let nap = poll_interval.min(Duration::from_millis(50));

        while running.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _)) => {
                    if let Err(e) = Self::handle_connection(stream, &command_tx) {
                        log::warn!("Control connection failed: {}", e);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(nap);
                }
                Err(e) => {
                    if running.load(Ordering::SeqCst) {
                        log::error!("Control channel accept error: {}", e);
                    }
                    thread::sleep(nap);
                }
            }
        }
        log::info!("Control channel listener stopped");
    }

    /// One connection carries exactly one command: read once, parse,
    /// acknowledge, close.
    fn handle_connection(
        mut stream: UnixStream,
        command_tx: &mpsc::Sender<Command>,
    ) -> std::io::Result<()> {
        // The accepted stream inherits non-blocking mode from the listener.
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(Duration::from_millis(500)))?;
        stream.set_write_timeout(Some(Duration::from_millis(500)))?;

        let mut buf = [0u8; 4096];
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }

        match protocol::parse_command(&buf[..n]) {
            Ok(command) => {
                log::info!("Received command: {:?}", command);
                // A disconnected receiver means the player is shutting
                // down; the command is dropped either way.
                let dispatched = command_tx.send(command).is_ok();
                stream.write_all(if dispatched { ACK_OK } else { ACK_ERROR })?;
            }
            Err(e) => {
                log::warn!("Dropping malformed command payload: {}", e);
                stream.write_all(ACK_ERROR)?;
            }
        }
        Ok(())
    }

    /// Signals the listener thread and blocks until it exits. Observed
    /// within one accept poll interval.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.listener_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
