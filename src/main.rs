use axum::extract::DefaultBodyLimit;
use std::net::SocketAddr;
use talent_interview_backend::{
    build_router,
    config::{get_config, init_config, LogFormat},
    database::pool::create_pool,
    AppState,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_config()?;
    let config = get_config();
    init_tracing(config.log_format);

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool)?;

    tokio::spawn(app_state.scoring_worker.clone().run());

    match app_state.reconciliation.sweep().await {
        Ok(report) => info!(
            expired_sessions = report.expired_sessions,
            exhausted_jobs = report.exhausted_jobs,
            stranded_profiles = report.stranded_profiles,
            "startup reconciliation finished"
        ),
        Err(e) => tracing::error!(error = ?e, "startup reconciliation failed"),
    }
    let scheduler = app_state
        .reconciliation
        .clone()
        .schedule(&config.reconcile_cron)
        .await?;
    info!(cron = %config.reconcile_cron, "reconciliation scheduled");

    let app = build_router(app_state, config.public_rps, config.talent_rps)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(5 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    drop(scheduler);
    Ok(())
}
