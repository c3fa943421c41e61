use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{app, AppState, DEFAULT_PORT};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new("info"))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = Arc::new(AppState::new("data", "."));

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", DEFAULT_PORT))
        .await
        .unwrap();
    tracing::info!("listening on http://127.0.0.1:{DEFAULT_PORT}");
    axum::serve(listener, app(state)).await.unwrap();
}
