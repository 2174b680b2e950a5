use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/kiosk-player-ipc.sock")
}

fn default_fade_millis() -> u64 {
    150
}

fn default_send_timeout_millis() -> u64 {
    2000
}

fn default_accept_poll_millis() -> u64 {
    1000
}

fn default_backdrop_color() -> [u8; 3] {
    [0, 0, 0]
}

/// Runtime configuration shared by the player process and the short-lived
/// controller invocations. The socket path is the single well-known
/// rendezvous point between the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Crossfade duration in milliseconds.
    #[serde(default = "default_fade_millis")]
    pub fade_millis: u64,
    /// Client-side connect/read/write timeout for one command round-trip.
    #[serde(default = "default_send_timeout_millis")]
    pub send_timeout_millis: u64,
    /// Upper bound on how long the listener waits before re-checking its
    /// shutdown flag.
    #[serde(default = "default_accept_poll_millis")]
    pub accept_poll_millis: u64,
    /// Letterbox/backdrop fill color as RGB.
    #[serde(default = "default_backdrop_color")]
    pub backdrop_color: [u8; 3],
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            fade_millis: default_fade_millis(),
            send_timeout_millis: default_send_timeout_millis(),
            accept_poll_millis: default_accept_poll_millis(),
            backdrop_color: default_backdrop_color(),
        }
    }
}

impl PlayerConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| anyhow::anyhow!("Failed to read config file at {}: {}", config_path.display(), e))?;

            match serde_json::from_str::<Self>(&content) {
                Ok(config) => {
                    log::info!("Loaded config from {}", config_path.display());
                    Ok(config)
                }
                Err(e) => {
                    log::warn!("Config file exists but has issues ({}), falling back to defaults", e);
                    Ok(Self::default())
                }
            }
        } else {
            log::info!("No config file found, writing defaults to {}", config_path.display());
            let config = Self::default();
            if let Err(e) = config.save() {
                log::warn!("Could not write default config: {}", e);
            }
            Ok(config)
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kiosk-player")
            .join("config.json")
    }

    /// Pid record kept next to the socket so a restarting caller can
    /// force-terminate an instance that ignores the exit request.
    pub fn pid_path(&self) -> PathBuf {
        self.socket_path.with_extension("pid")
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_millis)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_millis)
    }

    pub fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_millis)
    }
}
