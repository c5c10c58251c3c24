use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::handler::{AppState, bus::bus_router, connection::connection_router};

pub(crate) fn start_api_server(listen: String, state: AppState, cancel: CancellationToken) {
    tokio::spawn(async move {
        let app = Router::new()
            .route("/", get(index))
            .nest("/connections", connection_router())
            .nest("/bus", bus_router())
            .with_state(state);

        let listener = match TcpListener::bind(&listen).await {
            Ok(listener) => listener,
            Err(e) => {
                log::error!("API server bind {} failed: {}", listen, e);
                cancel.cancel();
                return;
            }
        };
        log::info!("API server started on {}", listen);
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(cancel))
            .await
        {
            log::error!("Error starting API server: {}", e);
        }
    });
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {
            log::info!("Shutting down API server...");
        }
    }
}

async fn index() -> String {
    format!("flaps-server v{}", env!("CARGO_PKG_VERSION"))
}
