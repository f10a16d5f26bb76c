use anyhow::Context;
use tracing::{info, warn};

use stockline_infra::repository::postgres;
use stockline_infra::{AppConfig, Repositories, Services, SignalListener, SignalRouting, jobs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::load().context("failed to load configuration")?;
    stockline_observability::init_with(&cfg.log);

    if cfg.auth.jwt_secret == "dev-secret" {
        warn!("auth.jwt_secret not set; using insecure dev default");
    }

    let repos = if cfg.database.url.is_some() {
        let pool = postgres::connect(&cfg.database)
            .await
            .context("failed to connect to postgres")?;
        info!("using postgres repositories");
        Repositories::postgres(pool)
    } else {
        info!("database.url not set; using in-memory repositories");
        Repositories::in_memory()
    };

    let services = Services::build(repos, &cfg);
    services
        .users
        .ensure_builtin_roles()
        .await
        .context("failed to seed built-in roles")?;

    let listener_handle = SignalListener::new(
        services.dispatcher.clone(),
        SignalRouting::from_config(&cfg.notifications),
    )
    .spawn(&services.bus);

    let scheduler_handle = if cfg.jobs.enabled {
        Some(jobs::standard_schedule(&cfg.jobs, &services)?.spawn())
    } else {
        info!("scheduled jobs disabled");
        None
    };

    let app = stockline_api::app::build_app(services, cfg.auth.jwt_secret.clone());

    let listener = tokio::net::TcpListener::bind(&cfg.http.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.http.bind))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("shutting down");
    if let Some(handle) = scheduler_handle {
        handle.shutdown().await;
    }
    listener_handle.shutdown().await;
    Ok(())
}
