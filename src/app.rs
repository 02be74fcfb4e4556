use std::{net::SocketAddr, time::Duration};

use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    auth,
    config::AppConfig,
    rate_limit::{limit_requests, RequestLimiter},
    state::AppState,
};

const LIMITER_PRUNE_PERIOD: Duration = Duration::from_secs(60);

pub fn build_app(state: AppState) -> Router {
    let limiter = state.limiter.clone();

    let mut app = Router::new()
        .nest("/api/users", auth::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state);

    if let Some(limiter) = limiter {
        app = app.layer(middleware::from_fn_with_state(limiter, limit_requests));
    }

    app.layer(CorsLayer::permissive()).layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
            })
            .on_response(
                |res: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 span: &tracing::Span| {
                    let status = res.status();
                    span.record("status", tracing::field::display(status));
                    if status.is_server_error() {
                        tracing::error!(%status, ?latency, "response");
                    } else {
                        tracing::info!(%status, ?latency, "response");
                    }
                },
            ),
    )
}

pub async fn serve(
    app: Router,
    config: &AppConfig,
    limiter: Option<RequestLimiter>,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let _pruner = limiter.map(|l| l.spawn_pruner(LIMITER_PRUNE_PERIOD));

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
