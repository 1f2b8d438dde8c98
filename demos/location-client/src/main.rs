use std::time::Duration;

use clap::Parser;
use multiplay::prelude::*;
use rand::Rng;
use rand::distr::Alphanumeric;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Connects to a game server and walks an avatar in a circle.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Server host name or IP.
    #[arg(long, env = "MULTIPLAY_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port.
    #[arg(long, env = "MULTIPLAY_PORT", default_value_t = 5555)]
    port: u16,

    /// Device id; a random one is generated when omitted.
    #[arg(long, env = "MULTIPLAY_DEVICE_ID")]
    device_id: Option<String>,

    /// Version reported in the handshake.
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
    client_version: String,

    /// Avatar selection.
    #[arg(long, default_value_t = 0)]
    player_id: u32,

    /// Fixed artificial delay for every write, in milliseconds.
    #[arg(long, conflicts_with = "measured_latency")]
    delay_ms: Option<u64>,

    /// Delay every write by the measured one-way latency.
    #[arg(long)]
    measured_latency: bool,

    /// Use 4-byte handler ids in frame headers.
    #[arg(long)]
    wide_ids: bool,

    /// Milliseconds between location updates.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Seconds to stay connected (0 = until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    duration: u64,
}

impl Args {
    fn send_delay(&self) -> SendDelay {
        match (self.delay_ms, self.measured_latency) {
            (Some(ms), _) => SendDelay::Fixed(Duration::from_millis(ms)),
            (None, true) => SendDelay::MeasuredLatency,
            (None, false) => SendDelay::None,
        }
    }
}

fn random_device_id() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

/// Point on a circle of radius 3 around `origin`, one lap per 64 ticks.
fn circle_position(origin: (f32, f32), tick: u64) -> (f32, f32) {
    let angle = (tick % 64) as f32 / 64.0 * std::f32::consts::TAU;
    (origin.0 + 3.0 * angle.cos(), origin.1 + 3.0 * angle.sin())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), MultiplayError> {
    multiplay::logging::init();
    let args = Args::parse();

    let device_id = args.device_id.clone().unwrap_or_else(random_device_id);
    let id_width = if args.wide_ids { IdWidth::U32 } else { IdWidth::U8 };

    let (mut session, mut events) = ClientBuilder::new(device_id.clone())
        .client_version(args.client_version.clone())
        .player_id(args.player_id)
        .send_delay(args.send_delay())
        .id_width(id_width)
        .connect(&args.host, args.port)
        .await?;
    tracing::info!(%device_id, host = %args.host, port = args.port, "connected");

    let outbox = session.outbox()?.clone();
    let tick = Duration::from_millis(args.tick_ms.max(1));
    let deadline = async {
        match args.duration {
            0 => {
                let _ = tokio::signal::ctrl_c().await;
            }
            secs => tokio::time::sleep(Duration::from_secs(secs)).await,
        }
    };
    tokio::pin!(deadline);

    let mut walker: Option<tokio::task::JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::HandshakeComplete(init) => {
                        tracing::info!(user_id = %init.user_id, x = init.x, y = init.y, "spawned");
                        let outbox = outbox.clone();
                        let origin = (init.x, init.y);
                        walker = Some(tokio::spawn(async move {
                            let mut interval = tokio::time::interval(tick);
                            for n in 0u64.. {
                                interval.tick().await;
                                let (x, y) = circle_position(origin, n);
                                if let Err(e) = outbox.send_location(x, y).await {
                                    tracing::debug!(error = %e, "walker stopped");
                                    break;
                                }
                            }
                        }));
                    }
                    SessionEvent::LocationUpdated(users) => {
                        tracing::debug!(users = users.len(), "world update");
                    }
                    SessionEvent::LatencyUpdated(sample) => {
                        tracing::info!(
                            rtt_ms = sample.rtt_millis,
                            latency_ms = sample.latency_millis,
                            "latency"
                        );
                    }
                    SessionEvent::ApplicationError { handler_id, response_code, .. } => {
                        tracing::warn!(handler = %handler_id, code = response_code, "server error");
                    }
                    SessionEvent::ProtocolViolation { error } => {
                        tracing::warn!(%error, "bad frame from server");
                    }
                    SessionEvent::Disconnected(reason) => {
                        tracing::info!(%reason, "disconnected");
                        break;
                    }
                }
            }
        }
    }

    session.disconnect().await;
    if let Some(walker) = walker {
        walker.abort();
    }
    Ok(())
}
