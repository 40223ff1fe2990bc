//! HDMI-CEC Control Program
//!
//! Runs a single operation against the bus and exits. Each invocation starts its own bus
//! session, so state that was learned by a running daemon is not visible here.

use std::{fmt, path::PathBuf, time::Duration};

use anyhow::Result;
use cecbridge::{
    config::{Backend, Config},
    logging::transport_logging,
    transport::Openable,
    AudioStatus, CecBridge, DeviceTarget, LogicalAddress, LogicalDevice, MuteAction, PowerStatus,
};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Clone, Debug, Parser)]
#[clap(version=env!("CARGO_PKG_VERSION"), author=env!("CARGO_PKG_AUTHORS"))]
struct Opts {
    /// Verbosity level. -v display decoded frames -vv also display polls and raw lines
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output response format (text (default), json, jsonline)
    #[clap(long = "output", short = 'o', default_value = "text")]
    output_format: OutputFormat,

    #[clap(long, env = "CECBRIDGE_LOG")]
    /// Log bus traffic to a file
    log: Option<PathBuf>,

    /// Path to the configuration file
    #[clap(
        long,
        short,
        env = "CECBRIDGE_CONFIG",
        default_value = "/etc/cecbridge/config.toml"
    )]
    config: PathBuf,

    /// Use a simulated bus instead of cec-client
    #[clap(long)]
    mock: bool,

    #[clap(subcommand)]
    subcmd: Option<SubCommand>,
}

#[derive(Clone, Debug, Subcommand)]
enum SubCommand {
    /// Prints the audio status, the display's power status and the selected input
    Status,

    /// Selects an input port, or prints the last selected one
    Input { port: Option<u8> },

    /// Drives the volume towards the given level [0, 100], or prints the current one
    Volume { value: Option<i64> },

    /// Sets the mute status (on | off | toggle), or prints it
    Mute { value: Option<MuteAction> },

    /// Turns a device on or off, or prints its power status
    Power {
        /// Device name, logical address, physical address (1.0.0.0) or input:<port>
        device: DeviceTarget,

        #[clap(value_parser = on_or_off)]
        value: Option<bool>,
    },

    /// Scans the bus and prints the devices that answered
    Scan {
        /// How long to wait for devices to report, in milliseconds
        #[clap(long, default_value = "5000")]
        wait: u64,
    },

    /// Asks every logical address for its name and physical address, then prints the directory
    Devices {
        /// How long to wait for devices to report, in milliseconds
        #[clap(long, default_value = "2000")]
        wait: u64,
    },

    /// Sends opcode[:params] hex to the audio system, such as `71` or `44:41`
    Raw { command: String },
}

#[derive(Debug, strum::EnumString, strum::Display, Clone, Copy, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
enum OutputFormat {
    Text,
    Json,
    JsonLine,
}

impl OutputFormat {
    fn format<T>(self, obj: &T) -> Result<String>
    where
        T: Serialize + fmt::Display,
    {
        Ok(match self {
            OutputFormat::Text => format!("{}", obj),
            OutputFormat::Json => serde_json::to_string_pretty(obj)?,
            OutputFormat::JsonLine => serde_json::to_string(obj)?,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    audio: Option<AudioStatus>,
    tv_power: PowerStatus,
    current_input: Option<u8>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.audio {
            Some(audio) => writeln!(f, "volume: {} muted: {}", audio.level, audio.muted)?,
            None => writeln!(f, "volume: unknown")?,
        }
        writeln!(f, "tv: {}", self.tv_power)?;
        match self.current_input {
            Some(port) => write!(f, "input: {}", port),
            None => write!(f, "input: unknown"),
        }
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct Devices(Vec<LogicalDevice>);

impl fmt::Display for Devices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let known = self
            .0
            .iter()
            .filter(|d| d.name.is_some() || d.physical_address.is_some());
        for (i, device) in known.enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{:>2} {:<14} {:<8} {}",
                device.logical_address,
                device.name.as_deref().unwrap_or("?"),
                device
                    .physical_address
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                device.power,
            )?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Value<T>(T);

impl<T: fmt::Display> fmt::Display for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

async fn run_command(bridge: &CecBridge, cmd: Option<&SubCommand>, opts: &Opts) -> Result<()> {
    let out = opts.output_format;
    match cmd {
        None | Some(SubCommand::Status) => {
            let audio = match bridge.refresh_audio_status().await {
                Ok(audio) => Some(audio),
                Err(e) => {
                    log::warn!("no audio status: {}", e);
                    None
                }
            };
            let tv = DeviceTarget::Named("tv".to_string());
            let tv_power = match bridge.refresh_power(&tv).await {
                Ok(power) => power,
                Err(e) => {
                    log::warn!("no power status: {}", e);
                    PowerStatus::Unknown
                }
            };
            let status = Status {
                audio,
                tv_power,
                current_input: bridge.input(),
            };
            println!("{}", out.format(&status)?);
        }
        Some(SubCommand::Input { port: Some(port) }) => bridge.set_input(*port).await?,
        Some(SubCommand::Input { port: None }) => match bridge.input() {
            Some(port) => println!("{}", out.format(&Value(port))?),
            None => println!("unknown"),
        },
        Some(SubCommand::Volume { value: Some(value) }) => {
            let outcome = bridge.set_volume(*value).await?;
            println!("{}", out.format(&outcome)?);
        }
        Some(SubCommand::Volume { value: None }) => {
            let status = bridge.refresh_audio_status().await?;
            println!("{}", out.format(&Value(status.level))?);
        }
        Some(SubCommand::Mute { value: Some(action) }) => bridge.set_mute(*action).await?,
        Some(SubCommand::Mute { value: None }) => {
            let status = bridge.refresh_audio_status().await?;
            println!("{}", out.format(&Value(status.muted))?);
        }
        Some(SubCommand::Power {
            device,
            value: Some(on),
        }) => bridge.set_power(device, *on).await?,
        Some(SubCommand::Power {
            device,
            value: None,
        }) => {
            let power = bridge.refresh_power(device).await?;
            println!("{}", out.format(&Value(power))?);
        }
        Some(SubCommand::Scan { wait }) => {
            let discovery = bridge.discovery();
            discovery.scan().await;
            let devices = discovery
                .settle(Duration::from_millis(500), Duration::from_millis(*wait))
                .await;
            println!("{}", out.format(&Devices(devices))?);
        }
        Some(SubCommand::Devices { wait }) => {
            let discovery = bridge.discovery();
            let initiator = bridge.client().initiator();
            for address in LogicalAddress::all()
                .filter(|&a| a != LogicalAddress::Broadcast && a != initiator)
            {
                discovery.probe(address).await;
            }
            let devices = discovery
                .settle(Duration::from_millis(500), Duration::from_millis(*wait))
                .await;
            println!("{}", out.format(&Devices(devices))?);
        }
        Some(SubCommand::Raw { command }) => bridge.send_raw_frame(command).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let opts: Opts = Opts::parse();

    let mut config = if opts.config.exists() {
        Config::load(&opts.config)?
    } else {
        Config::default()
    };
    if opts.mock {
        config.bus.backend = Backend::Mock;
    }

    let transport = config.bus.open().await?;
    let transport = transport_logging(transport, opts.verbose, opts.log.clone());
    let bridge = CecBridge::new(transport, config);

    let result = run_command(&bridge, opts.subcmd.as_ref(), &opts).await;

    // Give the adapter a chance to flush the last frames before quitting
    tokio::time::sleep(Duration::from_millis(100)).await;
    bridge.stop().await?;
    result
}

fn on_or_off(s: &str) -> Result<bool, &'static str> {
    match s {
        "on" => Ok(true),
        "true" => Ok(true),
        "off" => Ok(false),
        "false" => Ok(false),
        _ => Err("expected `on`, `true`, `off`, `false`"),
    }
}
