//! The TV-screen leaderboard.
//!
//! Connects to the gateway, mounts a live leaderboard view, and
//! redraws the standings on every change until SIGINT/SIGTERM.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use houseboard_app::{LeaderboardView, Standings};
use houseboard_gateway::{GatewayConfig, RestGateway};

/// Width of the proportional bar, in terminal cells.
const BAR_WIDTH: i64 = 40;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "houseboard_screen=info,houseboard_gateway=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    // A misconfigured deployment degrades to a clearly broken state,
    // never a crash or a blank screen.
    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Gateway is not configured");
            println!("==================================================");
            println!("  HOUSEBOARD IS NOT CONFIGURED");
            println!("  {e}");
            println!("  The leaderboard cannot load until this is fixed.");
            println!("==================================================");
            return Ok(());
        }
    };
    tracing::info!(url = %config.url, "Loaded gateway configuration");

    // --- Gateway + view ---
    let gateway = Arc::new(RestGateway::new(config));
    let gateway_handle: Arc<dyn houseboard_gateway::Gateway> = gateway.clone();
    let view = match LeaderboardView::start(gateway_handle).await {
        Ok(view) => view,
        Err(e) => {
            println!("Unable to load the leaderboard: {e}");
            return Err(e.into());
        }
    };

    let mut standings = view.watch();
    render(&standings.borrow().clone());

    // --- Redraw loop ---
    loop {
        tokio::select! {
            () = shutdown_signal() => break,
            changed = standings.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = standings.borrow_and_update().clone();
                render(&snapshot);
            }
        }
    }

    // --- Teardown ---
    view.close();
    gateway.shutdown();
    tracing::info!("Screen stopped");
    Ok(())
}

/// Redraw the whole board.
fn render(standings: &Standings) {
    // Clear and home.
    print!("\x1b[2J\x1b[H");
    println!("  HOUSE LEADERBOARD");
    println!("  Aotea College House Competition");
    println!();

    let max_points = standings.max_points();
    for (rank, house) in standings.houses().iter().enumerate() {
        let color = house.color();
        let filled = (house.points * BAR_WIDTH / max_points).clamp(0, BAR_WIDTH) as usize;
        let bar: String = "█".repeat(filled) + &"░".repeat(BAR_WIDTH as usize - filled);
        println!(
            "  {}. {}{:<12}\x1b[0m {:>6}  {}{}\x1b[0m",
            rank + 1,
            color.ansi_fg(),
            house.name,
            house.points,
            color.ansi_fg(),
            bar,
        );
    }
    if standings.is_empty() {
        println!("  (no houses yet)");
    }
}

/// Wait for a termination signal to initiate shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the screen
/// stops cleanly whether closed interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
