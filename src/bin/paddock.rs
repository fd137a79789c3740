use anyhow::{Context, Result};
use clap::Parser;
use paddock::{IngestConfig, IngestSession, PlaybackHandle, RawPacket, TelemetrySink, TransportCommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "paddock")]
#[command(about = "Ingest live UDP telemetry, or replay a recorded capture")]
struct Args {
    /// Capture file to replay instead of listening
    capture: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind the UDP receiver to
    #[arg(long)]
    bind: Option<IpAddr>,

    /// UDP port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Record live datagrams to this capture file
    #[arg(short, long)]
    record: Option<PathBuf>,

    /// Initial playback speed (1-100)
    #[arg(short, long)]
    speed: Option<u32>,

    /// Playback tick period in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Start replay paused
    #[arg(long)]
    paused: bool,
}

impl Args {
    fn into_config(self) -> Result<IngestConfig> {
        let mut config = match &self.config {
            Some(path) => IngestConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => IngestConfig::default(),
        };

        if let Some(capture) = self.capture {
            config.capture = Some(capture);
        }
        if let Some(bind) = self.bind {
            config.receiver.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.receiver.port = port;
        }
        if let Some(record) = self.record {
            config.receiver.record_to = Some(record);
        }
        if let Some(speed) = self.speed {
            config.playback.initial_speed = speed;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.playback.tick_ms = tick_ms;
        }
        if self.paused {
            config.playback.start_paused = true;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

/// Counts ingested packets and logs throughput periodically
struct StatsSink {
    packets: u64,
    bytes: u64,
    window_packets: u64,
    window_start: Instant,
}

impl StatsSink {
    const REPORT_EVERY: Duration = Duration::from_secs(5);

    fn new() -> Self {
        Self { packets: 0, bytes: 0, window_packets: 0, window_start: Instant::now() }
    }
}

impl TelemetrySink for StatsSink {
    fn ingest(&mut self, packet: &RawPacket) {
        self.packets += 1;
        self.window_packets += 1;
        self.bytes += packet.len() as u64;
    }

    fn end_batch(&mut self, _delivered: usize) {
        let elapsed = self.window_start.elapsed();
        if elapsed < Self::REPORT_EVERY {
            return;
        }
        let rate = self.window_packets as f64 / elapsed.as_secs_f64();
        info!(packets = self.packets, bytes = self.bytes, "Ingesting {:.1} packets/s", rate);
        self.window_packets = 0;
        self.window_start = Instant::now();
    }
}

fn transport_command(key: &str) -> Option<TransportCommand> {
    match key {
        "r" => Some(TransportCommand::Reset),
        "p" => Some(TransportCommand::TogglePlay),
        "+" => Some(TransportCommand::SpeedUp),
        "-" => Some(TransportCommand::SlowDown),
        _ => None,
    }
}

/// Reads transport keys from stdin until `q`, end of input, or Ctrl+C
async fn run_transport(playback: &PlaybackHandle) -> Result<()> {
    println!("Transport: r = reset, p = play/pause, + = faster, - = slower, q = quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => return signal.context("waiting for Ctrl+C"),
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    // stdin closed, keep playing until Ctrl+C
                    return tokio::signal::ctrl_c().await.context("waiting for Ctrl+C");
                };
                let key = line.trim();
                if key == "q" {
                    return Ok(());
                }
                match transport_command(key) {
                    Some(command) => {
                        playback.send(command);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        println!("{}", playback.status());
                    }
                    None if key.is_empty() => println!("{}", playback.status()),
                    None => warn!(key, "Unknown transport key"),
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "paddock=info".into()))
        .init();

    let config = Args::parse().into_config()?;
    let session = IngestSession::start(&config, StatsSink::new()).await.context("starting ingest session")?;

    match session.playback() {
        Some(playback) => run_transport(playback).await?,
        None => {
            if let Some(addr) = session.local_addr() {
                info!(%addr, "Listening for telemetry, Ctrl+C to stop");
            }
            tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;
        }
    }

    let (sink, report) = session.shutdown().await.context("shutting down")?;
    info!(packets = sink.packets, bytes = sink.bytes, ?report, "Done");
    Ok(())
}
