mod error;

use clap::Parser;
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use rfsight_core::{LinkState, NetworkReport, Session, SessionConfig, TlsMode};

use crate::error::CliError;

/// Live network metrics watcher for an RFSight management server.
///
/// Seeds the topology from the device listing, connects to the update
/// stream, and prints per-network derived metrics as they change.
#[derive(Debug, Parser)]
#[command(name = "rfsight", version, about)]
struct Cli {
    /// Management server base URL (e.g. https://rfsight.local/api)
    #[arg(long, env = "RFSIGHT_SERVER")]
    server: String,

    /// Auth token for the stream and REST calls
    #[arg(long, env = "RFSIGHT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Organization id to watch
    #[arg(long)]
    org: String,

    /// Network id to watch
    #[arg(long)]
    network: String,

    /// Verify TLS against the system store (self-signed servers rejected)
    #[arg(long)]
    strict_tls: bool,

    /// Seed from the device listing, print one snapshot, and exit
    #[arg(long)]
    once: bool,

    /// Also emit the merged topology as JSON with each status line
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = build_session_config(&cli)?;
    let session = Session::new(config);

    // Baseline nodes from the static listing — the graph renders even
    // before the first stream update lands.
    let seeded = session.seed_network(&cli.org, &cli.network).await?;
    tracing::info!(seeded, "device listing applied");

    if cli.once {
        print_status(&session, &cli);
        return Ok(());
    }

    session.connect().await?;

    let mut monitors = session.monitors();
    let mut topology_updates = session.store().topology.subscribe_last_updated();
    let mut link_state = session.link_state();

    print_status(&session, &cli);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                session.disconnect().await;
                break;
            }
            changed = monitors.changed() => {
                if changed.is_none() {
                    break;
                }
                print_status(&session, &cli);
            }
            changed = topology_updates.changed() => {
                if changed.is_err() {
                    break;
                }
                print_status(&session, &cli);
            }
            changed = link_state.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *link_state.borrow_and_update();
                println!("· stream {state}");
                if state == LinkState::Closed {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn build_session_config(cli: &Cli) -> Result<SessionConfig, CliError> {
    let server_url: url::Url = cli.server.parse().map_err(|_| CliError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {}", cli.server),
    })?;

    let tls = if cli.strict_tls {
        TlsMode::System
    } else {
        TlsMode::DangerAcceptInvalid
    };

    Ok(SessionConfig {
        server_url,
        token: cli.token.clone().map(SecretString::from),
        tls,
        ..SessionConfig::default()
    })
}

fn print_status(session: &Session, cli: &Cli) {
    let report = session.metrics().report(&cli.org, &cli.network);
    println!("{}", status_line(&cli.network, &report, topology_age(session)));

    if cli.json {
        if let Some(graph) = session.metrics().merged_topology(&cli.org, &cli.network) {
            match serde_json::to_string(&*graph) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::warn!(error = %e, "failed to serialize topology"),
            }
        }
    }
}

fn topology_age(session: &Session) -> Option<std::time::Duration> {
    let last = session.store().topology.last_updated()?;
    (chrono::Utc::now() - last).to_std().ok()
}

fn status_line(
    network: &str,
    report: &NetworkReport,
    age: Option<std::time::Duration>,
) -> String {
    let freshness = age.map_or_else(
        || "no topology update yet".to_owned(),
        |d| {
            format!(
                "updated {} ago",
                humantime::format_duration(std::time::Duration::from_secs(d.as_secs()))
            )
        },
    );

    format!(
        "[{network}] health {:>3} | {}/{} online | {} stations | avg latency {:.1} ms | ↓ {} ↑ {} | {freshness}",
        report.health,
        report.status.online,
        report.status.total,
        report.stations,
        report.average_latency_ms,
        format_bps(report.throughput.download_bps),
        format_bps(report.throughput.upload_bps),
    )
}

/// Render a bits-per-second figure with a sensible unit.
fn format_bps(bps: f64) -> String {
    if bps >= 1e9 {
        format!("{:.1} Gb/s", bps / 1e9)
    } else if bps >= 1e6 {
        format!("{:.1} Mb/s", bps / 1e6)
    } else if bps >= 1e3 {
        format!("{:.1} Kb/s", bps / 1e3)
    } else {
        format!("{bps:.0} b/s")
    }
}

// ── Tests ────────────────────────────────────────────────────────────
