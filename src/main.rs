mod core;
mod gui;
mod ipc;
mod player;
mod video;

use clap::Parser;
use eframe::egui;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::PlayerConfig;
use crate::gui::PlayerApp;
use crate::ipc::{client, Command};

/// Full-screen kiosk media player remotely controlled over a local socket.
#[derive(Parser, Debug)]
#[command(name = "kiosk-player", version)]
struct Cli {
    /// Start the player process with a background image
    #[arg(long, value_name = "BACKGROUND")]
    start: Option<PathBuf>,

    /// Ask the running player to play a file for a duration in seconds
    #[arg(long, num_args = 2, value_names = ["FILE", "DURATION"])]
    play: Option<Vec<String>>,

    /// Ask the running player to stop and return to the background
    #[arg(long)]
    stop: bool,

    /// Ask the running player to exit
    #[arg(long)]
    exit: bool,

    /// On --start, replace an already-running instance
    #[arg(long)]
    single_instance: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = PlayerConfig::load()?;

    if let Some(background) = cli.start {
        run_player(config, background, cli.single_instance)
    } else if let Some(play_args) = cli.play {
        send_play(&config, &play_args)
    } else if cli.stop {
        send_simple(&config, Command::Stop, "Stop")
    } else if cli.exit {
        send_simple(&config, Command::Exit, "Exit")
    } else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        std::process::exit(1);
    }
}

fn run_player(config: PlayerConfig, background: PathBuf, single_instance: bool) -> anyhow::Result<()> {
    if single_instance && client::instance_running(&config.socket_path) {
        log::info!("Existing instance found, replacing it");
        client::replace_running_instance(&config)?;
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_fullscreen(true)
            .with_title("Kiosk Media Player"),
        ..Default::default()
    };

    eframe::run_native(
        "Kiosk Media Player",
        options,
        Box::new(move |cc| match PlayerApp::new(cc, config, background) {
            Ok(app) => Ok(Box::new(app)),
            Err(e) => {
                eprintln!("Failed to start player: {}", e);
                std::process::exit(1);
            }
        }),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run player window: {}", e))?;

    Ok(())
}

fn send_play(config: &PlayerConfig, args: &[String]) -> anyhow::Result<()> {
    let file = PathBuf::from(&args[0]);
    let duration: u64 = args[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("DURATION must be a whole number of seconds"))?;

    if !client::instance_running(&config.socket_path) {
        eprintln!("No running instance found. Use --start first.");
        std::process::exit(1);
    }

    let command = Command::Play {
        file: file.clone(),
        duration,
    };
    match client::send_command(config, &command) {
        Ok(()) => {
            println!("Play command sent: {}", file.display());
            // Block the caller for the playback window, so scripted
            // controllers can chain invocations.
            std::thread::sleep(Duration::from_secs(duration));
        }
        Err(e) => {
            eprintln!("Failed to send play command: {}", e);
        }
    }
    Ok(())
}

fn send_simple(config: &PlayerConfig, command: Command, label: &str) -> anyhow::Result<()> {
    if !client::instance_running(&config.socket_path) {
        println!("No running instance found");
        return Ok(());
    }

    match client::send_command(config, &command) {
        Ok(()) => println!("{} command sent", label),
        Err(e) => eprintln!("Failed to send {} command: {}", label.to_lowercase(), e),
    }
    Ok(())
}
