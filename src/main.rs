mod app;
mod backend;
mod config;
mod confirm;
mod error;
mod profile;
mod state;
mod wall;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "wall=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = state::AppState::init().await?;
    state.load().await;

    // keeps the feed in step with writes made elsewhere
    let poller = state.feed.spawn(state.config.poll_interval);

    let result = app::serve(app::build_app(state)).await;
    poller.stop().await;
    result
}
