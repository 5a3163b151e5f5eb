use tokio::net::TcpListener;
use todo_docstore::{
    application::{retention::RetentionJob, todo_repository::TodoRepository},
    config::Config,
    http::routing::{self, todos},
    infrastructure::connect_store,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    let store = connect_store(&config.backend).await?;
    let repo = TodoRepository::new(store);
    let retention = RetentionJob::new(repo.clone(), config.retention).spawn();

    let todos_router = todos::router(todos::AppState { repo });
    let router = routing::app(todos_router, &config.static_dir);

    tracing::info!(addr = %config.addr, static_dir = %config.static_dir.display(), "listening");
    axum::serve(TcpListener::bind(config.addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    retention.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown");
}
