use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use crate::core::PlayerConfig;
use crate::ipc::protocol::{self, ChannelError, Command, ACK_OK};

/// Presence heuristic: "an instance is running" means "the socket artifact
/// exists". A crashed player leaves the artifact behind, so this can
/// false-positive; restart logic must also clear stale processes before
/// rebinding.
pub fn instance_running(socket_path: &Path) -> bool {
    socket_path.exists()
}

/// Sends one command over a fresh connection and waits for the single
/// acknowledgment token. Connect, write, and read are all bounded by the
/// configured send timeout.
pub fn send_command(config: &PlayerConfig, command: &Command) -> Result<(), ChannelError> {
    if !instance_running(&config.socket_path) {
        return Err(ChannelError::NotRunning(config.socket_path.clone()));
    }

    let stream = UnixStream::connect(&config.socket_path)?;
    stream.set_read_timeout(Some(config.send_timeout()))?;
    stream.set_write_timeout(Some(config.send_timeout()))?;

    send_on_stream(stream, command)
}

fn send_on_stream(mut stream: UnixStream, command: &Command) -> Result<(), ChannelError> {
    let payload = protocol::encode_command(command)?;
    stream.write_all(&payload)?;

    let mut response = [0u8; 16];
    let n = stream.read(&mut response)?;
    if &response[..n] == ACK_OK {
        Ok(())
    } else {
        Err(ChannelError::Rejected)
    }
}

/// Asks a live instance to exit, force-terminates it if it does not wind
/// down, and clears the leftover artifacts so a fresh bind succeeds. Used
/// by `--start --single-instance`.
pub fn replace_running_instance(config: &PlayerConfig) -> Result<(), ChannelError> {
    if instance_running(&config.socket_path) {
        log::info!("Asking existing instance to exit");
        if let Err(e) = send_command(config, &Command::Exit) {
            log::warn!("Existing instance did not acknowledge exit: {}", e);
        }
        // A cooperative instance removes its socket on the way out.
        for _ in 0..10 {
            if !config.socket_path.exists() {
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    terminate_stale_instance(config);

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let _ = std::fs::remove_file(config.pid_path());
    Ok(())
}

/// An instance that ignored the exit request would keep its fullscreen
/// window while the replacement binds over the socket, so a survivor gets
/// killed outright via its recorded pid.
fn terminate_stale_instance(config: &PlayerConfig) {
    let pid_path = config.pid_path();
    let raw = match std::fs::read_to_string(&pid_path) {
        Ok(raw) => raw,
        Err(_) => return,
    };
    let pid: u32 = match raw.trim().parse() {
        Ok(pid) => pid,
        Err(_) => return,
    };
    if pid == std::process::id() || !process_alive(pid) {
        return;
    }

    log::warn!("Force-terminating unresponsive instance (pid {})", pid);
    let _ = std::process::Command::new("kill")
        .args(["-9", &pid.to_string()])
        .status();
}

fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
