use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::PlayerConfig;
use crate::ipc::{client, protocol::Command, server::IpcServer};

static NEXT_SOCKET_ID: AtomicUsize = AtomicUsize::new(0);

fn test_config() -> PlayerConfig {
    let id = NEXT_SOCKET_ID.fetch_add(1, Ordering::SeqCst);
    let mut config = PlayerConfig::default();
    config.socket_path = std::env::temp_dir().join(format!(
        "kiosk-player-test-{}-{}.sock",
        std::process::id(),
        id
    ));
    config.accept_poll_millis = 20;
    config
}

#[test]
fn test_command_round_trip_over_socket() {
    let config = test_config();
    let (mut server, command_rx) = IpcServer::bind(&config).expect("bind failed");

    let sent = Command::Play {
        file: PathBuf::from("/srv/media/clip.mp4"),
        duration: 5,
    };
    client::send_command(&config, &sent).expect("send failed");

    let received = command_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("command not delivered");
    assert_eq!(received, sent);

    server.shutdown();
}

#[test]
fn test_commands_arrive_in_order() {
    let config = test_config();
    let (mut server, command_rx) = IpcServer::bind(&config).expect("bind failed");

    let first = Command::Play {
        file: PathBuf::from("a.png"),
        duration: 1,
    };
    client::send_command(&config, &first).unwrap();
    client::send_command(&config, &Command::Stop).unwrap();
    client::send_command(&config, &Command::Exit).unwrap();

    assert_eq!(command_rx.recv_timeout(Duration::from_secs(2)).unwrap(), first);
    assert_eq!(command_rx.recv_timeout(Duration::from_secs(2)).unwrap(), Command::Stop);
    assert_eq!(command_rx.recv_timeout(Duration::from_secs(2)).unwrap(), Command::Exit);

    server.shutdown();
}

#[test]
fn test_malformed_payload_gets_error_and_is_dropped() {
    let config = test_config();
    let (mut server, command_rx) = IpcServer::bind(&config).expect("bind failed");

    let mut stream = UnixStream::connect(&config.socket_path).expect("connect failed");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream.write_all(b"definitely not json").unwrap();

    let mut response = [0u8; 16];
    let n = stream.read(&mut response).unwrap();
    assert_eq!(&response[..n], b"ERROR");
    drop(stream);

    // The bad payload never reaches the player, and the channel still works.
    assert!(command_rx.try_recv().is_err());
    client::send_command(&config, &Command::Stop).expect("channel unusable after bad payload");
    assert_eq!(command_rx.recv_timeout(Duration::from_secs(2)).unwrap(), Command::Stop);

    server.shutdown();
}

#[test]
fn test_bind_removes_stale_socket_artifact() {
    let config = test_config();

    // Simulate a crashed prior instance: the artifact exists but nothing
    // is listening. Dropping a raw listener leaves the path behind.
    drop(std::os::unix::net::UnixListener::bind(&config.socket_path).expect("seed bind failed"));

    assert!(config.socket_path.exists());
    let (mut server, command_rx) = IpcServer::bind(&config).expect("rebind over stale artifact failed");

    client::send_command(&config, &Command::Stop).expect("send failed");
    assert_eq!(command_rx.recv_timeout(Duration::from_secs(2)).unwrap(), Command::Stop);

    server.shutdown();
}

#[test]
fn test_shutdown_removes_socket_artifact() {
    let config = test_config();
    let (mut server, _command_rx) = IpcServer::bind(&config).expect("bind failed");
    assert!(config.socket_path.exists());

    server.shutdown();
    assert!(!config.socket_path.exists());
    assert!(!config.pid_path().exists());
    assert!(!client::instance_running(&config.socket_path));
}

#[test]
fn test_replace_force_terminates_unresponsive_instance() {
    let config = test_config();

    // A hung prior instance: a live process that never answers the exit
    // request, plus the artifacts it would have left behind.
    let mut child = std::process::Command::new("sleep")
        .arg("60")
        .spawn()
        .expect("spawn failed");
    std::fs::write(&config.socket_path, b"").expect("seed artifact failed");
    std::fs::write(config.pid_path(), child.id().to_string()).expect("seed pid failed");

    client::replace_running_instance(&config).expect("replace failed");

    let mut terminated = false;
    for _ in 0..50 {
        if child.try_wait().expect("wait failed").is_some() {
            terminated = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    assert!(terminated, "unresponsive instance was not terminated");
    assert!(!config.socket_path.exists());
    assert!(!config.pid_path().exists());
}

#[test]
fn test_send_without_instance_fails() {
    let config = test_config();
    let result = client::send_command(&config, &Command::Stop);
    assert!(result.is_err());
}
