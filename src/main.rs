mod config;
mod db;
mod event;
mod routes;
mod services;
mod state;
mod status;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let port = config.port;

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");
    let state = state::AppState::new(pool, config);

    // Spawn background workers.
    let _persistence = services::persistence::spawn_persistence_task(state.clone());
    let _simulator = services::demo::spawn_demo_simulator(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "hawker listening");
    axum::serve(listener, app).await.expect("server failed");
}
