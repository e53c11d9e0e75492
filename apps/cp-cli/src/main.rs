use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use at_transport as at;
use at_transport::AtLink;
use cycling_gatt as cg;

mod sim;

#[derive(Parser, Debug)]
#[command(
    name = "cps",
    version,
    about = "Cycling Power sensor bring-up and telemetry over AT radio modules",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Backend {
    Mock,
    Serial,
}

#[derive(Args, Debug)]
struct LinkArgs {
    /// Backend to talk through
    #[arg(long, value_enum, default_value_t = Backend::Mock)]
    backend: Backend,
    /// Port name (serial device path, or any name for mock)
    #[arg(long, default_value = "mock0")]
    device: String,
    /// Serial baud rate
    #[arg(long, default_value_t = 9600u32)]
    baud: u32,
    /// Sensor config YAML; defaults apply when omitted
    #[arg(long)]
    config: Option<String>,
    /// Verify the catalog before deciding to rebuild it
    #[arg(long, action = ArgAction::SetTrue)]
    verify: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available ports
    PortList {
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
    },
    /// Print the Fletcher-16 of each line
    Checksum {
        #[arg(long = "line", required = true)]
        lines: Vec<String>,
    },
    /// Query the module's catalog and compare it with the reference
    GattCheck {
        #[command(flatten)]
        link: LinkArgs,
        /// Compare line text instead of checksums
        #[arg(long, action = ArgAction::SetTrue)]
        text: bool,
    },
    /// Run catalog bring-up and print the assigned identifiers
    GattSetup {
        #[command(flatten)]
        link: LinkArgs,
    },
    /// Encode one measurement record
    Encode {
        #[arg(long, default_value_t = 0u16)]
        power: u16,
        #[arg(long, default_value_t = 0u32)]
        wheel_revs: u32,
        #[arg(long, default_value_t = 0u32)]
        wheel_ms: u32,
        #[arg(long, default_value_t = 0u16)]
        crank_revs: u16,
        #[arg(long, default_value_t = 0u32)]
        crank_ms: u32,
        /// Print the decoded fields as JSON too
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Decode a measurement record given as hex (dashes or spaces allowed)
    Decode {
        #[arg(long)]
        data: String,
    },
    /// Bring up the sensor, then stream simulated measurements
    Run {
        #[command(flatten)]
        link: LinkArgs,
        /// Number of records to send
        #[arg(long, default_value_t = 50u32)]
        count: u32,
        /// Override the configured update interval
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Simulated cadence
        #[arg(long, default_value_t = 90.0)]
        rpm: f32,
        /// Simulated power
        #[arg(long, default_value_t = 150u16)]
        watts: u16,
        /// Write each record as JSON lines to this file
        #[arg(long)]
        log: Option<String>,
        /// Print Prometheus metrics when done
        #[arg(long, action = ArgAction::SetTrue)]
        metrics: bool,
    },
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::PortList { backend } => port_list(backend),
        Commands::Checksum { lines } => checksum(&lines),
        Commands::GattCheck { link, text } => match link.backend {
            Backend::Mock => gatt_check(at::MockModule::open(&link.device)?, &link, text),
            Backend::Serial => gatt_check(
                at::SerialLink::open_with(&link.device, link.baud)?,
                &link,
                text,
            ),
        },
        Commands::GattSetup { link } => match link.backend {
            Backend::Mock => gatt_setup(at::MockModule::open(&link.device)?, &link),
            Backend::Serial => gatt_setup(
                at::SerialLink::open_with(&link.device, link.baud)?,
                &link,
            ),
        },
        Commands::Encode {
            power,
            wheel_revs,
            wheel_ms,
            crank_revs,
            crank_ms,
            json,
        } => encode(
            cg::TelemetrySample {
                power_watts: power,
                wheel_revs,
                last_wheel_rev_timestamp_ms: wheel_ms,
                crank_revs,
                last_crank_rev_timestamp_ms: crank_ms,
                total_energy_kj: 0,
            },
            json,
        ),
        Commands::Decode { data } => decode(&data),
        Commands::Run {
            link,
            count,
            interval_ms,
            rpm,
            watts,
            log,
            metrics,
        } => {
            let opts = RunOpts {
                count,
                interval_ms,
                rpm,
                watts,
                log: log.as_deref(),
                metrics,
            };
            match link.backend {
                Backend::Mock => run(at::MockModule::open(&link.device)?, &link, &opts),
                Backend::Serial => run(
                    at::SerialLink::open_with(&link.device, link.baud)?,
                    &link,
                    &opts,
                ),
            }
        }
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn load_config(args: &LinkArgs) -> Result<cg::SensorConfig> {
    let mut cfg = match args.config.as_deref() {
        Some(path) => cg::load_config_file(path)?,
        None => cg::SensorConfig::default(),
    };
    if args.verify {
        cfg.always_reprovision = false;
    }
    Ok(cfg)
}

fn manager_for<L: AtLink>(link: L, cfg: &cg::SensorConfig) -> Result<cg::CatalogManager<L>> {
    let mut mgr = cg::CatalogManager::new(link, cg::ManagerConfig::from(cfg));
    if let Some(path) = &cfg.cache_path {
        mgr = mgr.with_cache(Box::new(cg::FileCache::open(path)?));
    }
    Ok(mgr)
}

fn port_list(backend: Backend) -> Result<()> {
    let ports = match backend {
        Backend::Mock => at::MockModule::list()?,
        Backend::Serial => at::SerialLink::list()?,
    };
    for port in ports {
        println!("{}\t{}", port.name, port.driver);
    }
    Ok(())
}

fn checksum(lines: &[String]) -> Result<()> {
    for line in lines {
        println!("0x{:04X}\t{line}", cg::fletcher16(line.as_bytes()));
    }
    Ok(())
}

#[derive(Serialize)]
struct CheckReport {
    ts: String,
    matched: bool,
    lines_compared: usize,
    total_lines: usize,
    timed_out: bool,
}

fn gatt_check<L: AtLink>(link: L, args: &LinkArgs, text: bool) -> Result<()> {
    let cfg = load_config(args)?;
    let mut mgr = manager_for(link, &cfg)?;
    if text {
        mgr = mgr.with_reference(cg::reference::expected_text());
    }
    let v = mgr.check_catalog();
    let report = CheckReport {
        ts: now_rfc3339(),
        matched: v.matched,
        lines_compared: v.lines_compared,
        total_lines: v.total_lines,
        timed_out: v.timed_out,
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn gatt_setup<L: AtLink>(link: L, args: &LinkArgs) -> Result<()> {
    let cfg = load_config(args)?;
    let mut mgr = manager_for(link, &cfg)?;
    let bring_up = mgr.initialize()?;
    info!(
        matched = bring_up.verification.matched,
        reprovisioned = bring_up.reprovisioned,
        "bring-up complete"
    );
    print!("{}", mgr.status_text());
    println!("{}", serde_json::to_string(mgr.catalog())?);
    Ok(())
}

fn encode(sample: cg::TelemetrySample, json: bool) -> Result<()> {
    let record = cg::MeasurementRecord::from_sample(&sample);
    println!("{}", at::hex_dashed(&record.encode()));
    if json {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

fn decode(data: &str) -> Result<()> {
    let bytes = parse_hex(data)?;
    let record = cg::MeasurementRecord::decode(&bytes)?;
    println!("{}", serde_json::to_string(&record)?);
    Ok(())
}

struct RunOpts<'a> {
    count: u32,
    interval_ms: Option<u64>,
    rpm: f32,
    watts: u16,
    log: Option<&'a str>,
    metrics: bool,
}

#[derive(Serialize)]
struct RecordLine {
    ts: String,
    seq: u32,
    ok: bool,
    sample: cg::TelemetrySample,
    data: String,
}

fn run<L: AtLink>(link: L, args: &LinkArgs, opts: &RunOpts<'_>) -> Result<()> {
    let cfg = load_config(args)?;
    let interval = Duration::from_millis(opts.interval_ms.unwrap_or(cfg.update_interval_ms));
    let hub = cg::MetricsHub::new().map_err(|e| anyhow::anyhow!(e))?;
    let mut sensor = cg::CyclingPowerSensor::new(manager_for(link, &cfg)?).with_metrics(hub);
    sensor.initialize()?;
    print!("{}", sensor.manager().status_text());

    let mut writer = match opts.log {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };
    let mut ride = sim::SimulatedRide::new(opts.rpm, opts.watts);
    let step_ms = u32::try_from(interval.as_millis()).unwrap_or(u32::MAX);
    for seq in 0..opts.count {
        let started = Instant::now();
        let sample = ride.advance(step_ms);
        let ok = match sensor.update(&sample) {
            Ok(()) => true,
            Err(e) => {
                warn!(seq, error = %e, "update failed");
                false
            }
        };
        if let Some(w) = writer.as_mut() {
            let line = RecordLine {
                ts: now_rfc3339(),
                seq,
                ok,
                sample,
                data: at::hex_dashed(&cg::TelemetryEncoder::encode(&sample)),
            };
            w.write_all(serde_json::to_string(&line)?.as_bytes())?;
            w.write_all(b"\n")?;
        }
        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }
    if let Some(w) = writer.as_mut() {
        w.flush()?;
    }
    if opts.metrics {
        if let Some(m) = sensor.metrics() {
            print!("{}", m.encode_text());
        }
    }
    Ok(())
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".into())
}

fn parse_hex(s: &str) -> Result<Vec<u8>> {
    let digits: String = s
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !matches!(c, '-' | ' ' | ':'))
        .collect();
    if !digits.is_ascii() {
        anyhow::bail!("non-hex characters in '{s}'");
    }
    if digits.len() % 2 != 0 {
        anyhow::bail!("odd number of hex digits in '{s}'");
    }
    let mut out = Vec::with_capacity(digits.len() / 2);
    for i in (0..digits.len()).step_by(2) {
        let pair = &digits[i..i + 2];
        let b = u8::from_str_radix(pair, 16)
            .map_err(|e| anyhow::anyhow!("invalid hex byte '{pair}': {e}"))?;
        out.push(b);
    }
    Ok(out)
}
