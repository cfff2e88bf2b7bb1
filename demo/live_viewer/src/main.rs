use streamlens_core::{SessionController, SessionUpdate, StreamConfig};
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env overlay, then logging / tracing
    let _ = dotenvy::dotenv();
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,streamlens_core=info,live_viewer=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    // Configuration comes from STREAMLENS_* env vars (see core::config)
    let config = StreamConfig::default();
    info!(
        target = "live_viewer",
        url = %config.base_url,
        stream_key = %config.stream_key,
        max_points = config.max_points,
        "Starting live viewer"
    );

    let mut controller = SessionController::new(config);
    let mut updates = controller.start()?;

    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Some(SessionUpdate::Status(state)) => {
                        info!(target = "live_viewer", state = ?state, "connection status");
                    }
                    Some(SessionUpdate::Frame(frame)) => {
                        // A real renderer would draw here; the demo logs a summary
                        let span = frame
                            .span_ms()
                            .map(|(oldest, newest)| newest - oldest)
                            .unwrap_or(0);
                        info!(
                            target = "live_viewer",
                            points = frame.len(),
                            series = frame.series.len(),
                            span_ms = span,
                            "frame"
                        );
                    }
                    Some(SessionUpdate::Ended(state)) => {
                        warn!(target = "live_viewer", state = ?state, "session ended");
                        break;
                    }
                    None => break,
                }
            }
            _ = signal::ctrl_c() => {
                info!(target = "live_viewer", "Ctrl-C received, stopping session");
                controller.stop().await;
                break;
            }
        }
    }

    Ok(())
}
