//! Command-line front end for audio-relay.
//!
//! ```text
//! audio-relay local   --input BlackHole --output Speakers
//! audio-relay send    192.168.1.20:5005 --input BlackHole
//! audio-relay receive 0.0.0.0:5005 --cutoff 800
//! audio-relay noise   --target 192.168.1.20:5005 --no-filter
//! audio-relay devices
//! ```
//!
//! Runs until Ctrl-C. Exit status is 0 after a clean stop and 1 after a
//! fatal error.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use audio_relay::{
    CancelToken, CpalCatalog, DeviceCatalog, Direction, RelayBuilder, RelayConfig, RelayMode,
    DEFAULT_CUTOFF_HZ, DEFAULT_INPUT_DEVICE,
};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(author, version, about = "Relay live audio between devices and UDP peers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Low-pass cutoff frequency in Hz
    #[arg(long, global = true, default_value_t = DEFAULT_CUTOFF_HZ)]
    cutoff: f64,

    /// Relay frames unfiltered
    #[arg(long, global = true)]
    no_filter: bool,

    /// Fail instead of using the default output when --output matches nothing
    #[arg(long, global = true)]
    no_output_fallback: bool,

    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture device straight to playback device
    Local {
        /// Name fragment of the capture device
        #[arg(short, long, default_value = DEFAULT_INPUT_DEVICE)]
        input: String,
        /// Name fragment of the playback device (host default if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Capture device to a UDP peer
    Send {
        /// Peer address, e.g. 192.168.1.20:5005
        target: SocketAddr,
        /// Name fragment of the capture device
        #[arg(short, long, default_value = DEFAULT_INPUT_DEVICE)]
        input: String,
    },
    /// UDP peer to playback device
    Receive {
        /// Local address to listen on
        #[arg(default_value = "0.0.0.0:5005")]
        bind: SocketAddr,
        /// Name fragment of the playback device (host default if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Milliseconds without a frame before the peer counts as silent
        #[arg(long, default_value = "1000")]
        timeout_ms: u64,
    },
    /// White noise to a playback device or a UDP peer
    Noise {
        /// Send to this peer instead of a playback device
        #[arg(short, long)]
        target: Option<SocketAddr>,
        /// Name fragment of the playback device (host default if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// List audio devices and their channel counts
    Devices,
}

impl Cli {
    fn relay_config(&self) -> Option<RelayConfig> {
        let base = RelayConfig {
            cutoff_hz: self.cutoff,
            filter_enabled: !self.no_filter,
            output_fallback: !self.no_output_fallback,
            ..Default::default()
        };
        let config = match &self.command {
            Commands::Local { input, output } => RelayConfig {
                input_device: input.clone(),
                output_device: output.clone(),
                mode: RelayMode::Local,
                ..base
            },
            Commands::Send { target, input } => RelayConfig {
                input_device: input.clone(),
                mode: RelayMode::UdpSend { target: *target },
                ..base
            },
            Commands::Receive {
                bind,
                output,
                timeout_ms,
            } => RelayConfig {
                output_device: output.clone(),
                mode: RelayMode::UdpReceive { bind: *bind },
                recv_timeout: Duration::from_millis(*timeout_ms),
                ..base
            },
            Commands::Noise { target, output } => RelayConfig {
                output_device: output.clone(),
                mode: RelayMode::Noise { target: *target },
                ..base
            },
            Commands::Devices => return None,
        };
        Some(config)
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn list_devices() -> Result<(), BoxError> {
    let catalog = CpalCatalog::new();
    let defaults = (
        catalog.default_device(Direction::Capture)?.map(|d| d.name),
        catalog.default_device(Direction::Playback)?.map(|d| d.name),
    );

    for device in catalog.descriptors()? {
        let is_default = match device.direction {
            Direction::Capture => defaults.0.as_deref() == Some(device.name.as_str()),
            Direction::Playback => defaults.1.as_deref() == Some(device.name.as_str()),
        };
        println!(
            "[{:>3}] {:<9} {:>2}ch  {}{}",
            device.index,
            device.direction.to_string(),
            device.channels,
            device.name,
            if is_default { "  (default)" } else { "" }
        );
    }
    Ok(())
}

async fn relay(config: RelayConfig) -> Result<(), BoxError> {
    let cancel = CancelToken::new();

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping");
            on_signal.cancel();
        }
    });

    // CPAL streams must stay on the thread that opened them.
    let stats = tokio::task::spawn_blocking(move || {
        let mut pipeline = RelayBuilder::new(config).build()?;
        pipeline.run(&cancel)
    })
    .await??;

    tracing::info!(
        frames = stats.frames_relayed,
        filtered = stats.frames_filtered,
        framing_violations = stats.framing_violations,
        overflows = stats.capture_overflows,
        underruns = stats.playback_underruns,
        "done"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.relay_config() {
        Some(config) => relay(config).await,
        None => list_devices(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_send_maps_to_udp_send() {
        let cli = Cli::parse_from(["audio-relay", "send", "10.0.0.2:5005", "--cutoff", "800"]);
        let config = cli.relay_config().unwrap();
        assert_eq!(
            config.mode,
            RelayMode::UdpSend {
                target: "10.0.0.2:5005".parse().unwrap()
            }
        );
        assert!((config.cutoff_hz - 800.0).abs() < f64::EPSILON);
        assert_eq!(config.input_device, DEFAULT_INPUT_DEVICE);
    }

    #[test]
    fn test_receive_defaults() {
        let cli = Cli::parse_from(["audio-relay", "receive", "--no-filter"]);
        let config = cli.relay_config().unwrap();
        assert_eq!(
            config.mode,
            RelayMode::UdpReceive {
                bind: "0.0.0.0:5005".parse().unwrap()
            }
        );
        assert!(!config.filter_enabled);
        assert_eq!(config.recv_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_strict_output_flag() {
        let cli = Cli::parse_from([
            "audio-relay",
            "receive",
            "--output",
            "Studio Monitors",
            "--no-output-fallback",
        ]);
        let config = cli.relay_config().unwrap();
        assert_eq!(config.output_device.as_deref(), Some("Studio Monitors"));
        assert!(!config.output_fallback);

        let cli = Cli::parse_from(["audio-relay", "local"]);
        assert!(cli.relay_config().unwrap().output_fallback);
    }

    #[test]
    fn test_devices_has_no_relay_config() {
        let cli = Cli::parse_from(["audio-relay", "devices"]);
        assert!(cli.relay_config().is_none());
    }
}
