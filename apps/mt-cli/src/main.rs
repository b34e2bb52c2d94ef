use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use milk_telemetry::{decode, ConnectOutcome, TelemetryHub};
use serial_transport::{MockBackend, NativeBackend, SerialBackend};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

mod settings;
use settings::{Overrides, Settings};

const MOCK_COMPOSITION: &str = "mock-composition";
const MOCK_QUANTITY: &str = "mock-quantity";

#[derive(Parser, Debug)]
#[command(
    name = "mt",
    version,
    about = "Milk telemetry CLI",
    disable_help_subcommand = true
)]
struct Cli {
    /// Use the in-process mock backend, fed with generated frames
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum FrameKind {
    Composition,
    Quantity,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    Ports {
        /// Print as a JSON array
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Decode one raw frame and print the sample as JSON
    Decode {
        /// Which sensor produced the frame
        #[arg(long, value_enum, default_value_t = FrameKind::Composition)]
        kind: FrameKind,
        /// Frame text as received from the device
        raw: String,
    },
    /// Connect the configured channels and print polled data as JSON lines
    Watch {
        /// Settings file with port, baud_rate, port_quantity, baud_rate_quantity
        #[arg(long, default_value = "settings.json")]
        settings: String,
        /// Milk analyser port (overrides settings)
        #[arg(long)]
        port: Option<String>,
        /// Milk analyser baud rate (overrides settings)
        #[arg(long)]
        baud: Option<i64>,
        /// Flow meter port (overrides settings)
        #[arg(long)]
        quantity_port: Option<String>,
        /// Flow meter baud rate (overrides settings)
        #[arg(long)]
        quantity_baud: Option<i64>,
        /// Leave the milk analyser disconnected
        #[arg(long, action = ArgAction::SetTrue)]
        no_composition: bool,
        /// Milliseconds between polls
        #[arg(long, default_value_t = 1000u64)]
        interval_ms: u64,
        /// Number of polls before exiting (0 to run until killed)
        #[arg(long, default_value_t = 0u32)]
        count: u32,
        /// Print prometheus metrics on exit
        #[arg(long, action = ArgAction::SetTrue)]
        metrics: bool,
    },
}

struct WatchArgs {
    settings: String,
    overrides: Overrides,
    no_composition: bool,
    interval: Duration,
    count: u32,
    metrics: bool,
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    let mock = cli
        .mock
        .then(|| MockBackend::with_ports(&[MOCK_COMPOSITION, MOCK_QUANTITY]));
    let backend: Arc<dyn SerialBackend> = match &mock {
        Some(m) => Arc::new(m.clone()),
        None => Arc::new(NativeBackend),
    };

    match cli.command {
        Commands::Ports { json } => list_ports(backend, json),
        Commands::Decode { kind, raw } => decode_frame(kind, &raw),
        Commands::Watch {
            settings,
            port,
            baud,
            quantity_port,
            quantity_baud,
            no_composition,
            interval_ms,
            count,
            metrics,
        } => {
            let mut overrides = Overrides {
                port,
                baud_rate: baud,
                port_quantity: quantity_port,
                baud_rate_quantity: quantity_baud,
            };
            if mock.is_some() {
                overrides.port.get_or_insert_with(|| MOCK_COMPOSITION.to_string());
                overrides
                    .port_quantity
                    .get_or_insert_with(|| MOCK_QUANTITY.to_string());
            }
            let args = WatchArgs {
                settings,
                overrides,
                no_composition,
                interval: Duration::from_millis(interval_ms),
                count,
                metrics,
            };
            watch(backend, mock.as_ref(), args)
        }
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn list_ports(backend: Arc<dyn SerialBackend>, json: bool) -> Result<()> {
    let hub = TelemetryHub::new(backend)?;
    let ports = hub.list_ports();
    if json {
        println!("{}", serde_json::to_string(&ports)?);
    } else {
        for p in ports {
            println!("{}\t{}", p.port, p.description);
        }
    }
    Ok(())
}

fn decode_frame(kind: FrameKind, raw: &str) -> Result<()> {
    let json = match kind {
        FrameKind::Composition => serde_json::to_string(&decode::parse_composition(raw)?)?,
        FrameKind::Quantity => {
            let liters = decode::parse_quantity(raw)?;
            serde_json::to_string(&serde_json::json!({ "raw": raw, "liters": liters }))?
        }
    };
    println!("{json}");
    Ok(())
}

fn watch(
    backend: Arc<dyn SerialBackend>,
    mock: Option<&MockBackend>,
    args: WatchArgs,
) -> Result<()> {
    let settings = Settings::load(&args.settings)?.apply(args.overrides);
    let hub = TelemetryHub::new(backend)?;

    if !args.no_composition {
        report("composition", &hub.connect(&settings.port, settings.baud_rate));
    }
    if let Some(port) = settings.port_quantity.as_deref() {
        report("quantity", &hub.connect_quantity(port, settings.baud_rate_quantity));
    }
    if !hub.get_status().connected && !hub.get_status_quantity().connected {
        return Err(anyhow::anyhow!("no channel connected"));
    }

    let stop = Arc::new(AtomicBool::new(false));
    let feeder = mock.map(|m| spawn_mock_feed(m, Arc::clone(&stop)));

    let mut polls = 0u32;
    loop {
        thread::sleep(args.interval);
        let snapshot = hub.poll();
        println!("{}", serde_json::to_string(&snapshot)?);
        polls += 1;
        if args.count != 0 && polls >= args.count {
            break;
        }
    }

    stop.store(true, Ordering::Relaxed);
    if let Some(handle) = feeder {
        let _ = handle.join();
    }
    hub.disconnect();
    hub.disconnect_quantity();
    if args.metrics {
        print!("{}", hub.metrics_text());
    }
    Ok(())
}

fn report(channel: &str, outcome: &ConnectOutcome) {
    let port = outcome.info.port.as_deref().unwrap_or_default();
    if outcome.success {
        info!(channel, port, baud = outcome.info.baud_rate, "channel connected");
    } else {
        warn!(channel, port, message = %outcome.message, "channel not connected");
    }
}

// Emits an analyser frame and a flow line every half second
fn spawn_mock_feed(backend: &MockBackend, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    let composition = backend.add_port(MOCK_COMPOSITION);
    let quantity = backend.add_port(MOCK_QUANTITY);
    thread::spawn(move || {
        let mut tick: u32 = 0;
        while !stop.load(Ordering::Relaxed) {
            let fat = 350 + tick % 60;
            composition.feed(format!(
                "F:{:02}.{:02} S:08.45 D:28.512 W:00.000 P:03.240\r\n",
                fat / 100,
                fat % 100
            ));
            quantity.feed_line(&format!("{:04}", 100 + tick * 5));
            tick = tick.wrapping_add(1);
            thread::sleep(Duration::from_millis(500));
        }
    })
}
