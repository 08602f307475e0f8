use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gradebook::{
    config::Settings,
    domain::Role,
    gate::{GateState, HttpStatusSource, MaintenanceGate, StatusSource},
};

/// Run the maintenance gate outside a browser and report every verdict
/// change for one route.
#[derive(Parser, Debug)]
#[command(name = "gate-watch", version)]
struct Args {
    /// Route to evaluate, e.g. /grades
    #[arg(long, default_value = "/dashboard")]
    route: String,

    /// Viewer role; omit for an anonymous viewer
    #[arg(long, value_parser = parse_role)]
    role: Option<Role>,

    /// Status endpoint; defaults to gate.status_url from config
    #[arg(long)]
    url: Option<String>,

    /// Session token to send with each poll
    #[arg(long, env = "GRADEBOOK_SESSION")]
    session: Option<String>,

    /// Poll interval in seconds; defaults to gate.poll_interval_secs
    #[arg(long)]
    interval: Option<u64>,
}

fn parse_role(s: &str) -> Result<Role, String> {
    Role::from_str(s).ok_or_else(|| format!("unknown role '{}'", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gradebook=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = Settings::new().unwrap_or_default().gate;
    if let Some(url) = args.url {
        config.status_url = url;
    }
    if let Some(interval) = args.interval {
        config.poll_interval_secs = interval;
    }

    let timeout = Duration::from_secs(config.request_timeout_secs);
    let source: Arc<dyn StatusSource> = match args.session.as_deref() {
        Some(token) => Arc::new(HttpStatusSource::with_session(&config.status_url, timeout, token)?),
        None => Arc::new(HttpStatusSource::new(&config.status_url, timeout)?),
    };

    let gate = Arc::new(MaintenanceGate::new(&config, source, args.role, args.route));
    let mut states = gate.subscribe();
    let handle = gate.spawn();

    tracing::info!(url = %config.status_url, route = %gate.route(), "Watching maintenance gate");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                match state {
                    GateState::Blocked => {
                        let message = gate
                            .last_status()
                            .map(|s| s.maintenance_message)
                            .unwrap_or_default();
                        println!("BLOCKED  {}", message);
                    }
                    GateState::Open => println!("OPEN"),
                    GateState::Checking => println!("CHECKING"),
                }
            }
        }
    }

    gate.logout();
    handle.stop().await;
    Ok(())
}
