use anyhow::Result;
use std::sync::Arc;

use session_keeper::{auth, config, http_client, middleware, routes, session};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = config::Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Session Keeper starting...");
    tracing::info!(
        "Server configured: {}:{}",
        config.server_host,
        config.server_port
    );

    let client = http_client::from_config(&config)?;
    tracing::info!("HTTP client initialized with connection pooling");

    let token_manager = Arc::new(auth::TokenLifecycleManager::new(
        auth::HttpTokenRefresher::new(client.clone(), &config.api_url),
        config.lifecycle_policy()?,
    ));
    let policy = token_manager.policy();
    tracing::info!(
        renewal_buffer_secs = policy.renewal_buffer.num_seconds(),
        degraded_lifetime_secs = policy.degraded_lifetime.num_seconds(),
        degraded_policy = ?policy.degraded,
        "Token lifecycle policy"
    );
    let verifier = Arc::new(auth::CredentialVerifier::new(client, &config.api_url));

    let sessions = session::SessionStore::new();
    sessions.spawn_sweeper(config.sweep_interval());
    tracing::info!(
        every_secs = config.session_sweep_interval,
        "Expired session sweeper started"
    );

    let app_state = routes::AppState {
        sessions,
        token_manager,
        verifier,
    };

    let app = build_app(app_state);

    // Bind to configured host and port
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    print_startup_banner(&config);

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Build the application with all routes and middleware
fn build_app(state: routes::AppState) -> axum::Router {
    use axum::Router;

    Router::new()
        .merge(routes::health_routes())
        .merge(routes::auth_routes(state.clone()))
        .merge(routes::session_routes(state))
        .layer(middleware::cors_layer())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Print startup banner
fn print_startup_banner(config: &config::Config) {
    println!();
    println!("  Session Keeper {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Server:           http://{}:{}",
        config.server_host, config.server_port
    );
    println!("  Backend:          {}", config.api_url);
    println!("  Renewal buffer:   {}s", config.renewal_buffer);
    println!(
        "  Degraded tokens:  {:?} ({}s)",
        config.degraded_policy, config.degraded_lifetime
    );
    println!("  Log Level:        {}", config.log_level);
    println!();
}

/// Handle graceful shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
