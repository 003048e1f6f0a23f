use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use courier_api::middleware::require_auth;
use courier_api::uploads::UploadStore;
use courier_api::{AppState, AppStateInner, auth, devices, messages, rooms};
use courier_gateway::{Dispatcher, connection};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("COURIER_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("COURIER_DB_PATH").unwrap_or_else(|_| "courier.db".into());
    let upload_dir = std::env::var("COURIER_UPLOAD_DIR").unwrap_or_else(|_| "uploads".into());
    let host = std::env::var("COURIER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("COURIER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Shared state: one store, one dispatcher, owned here and handed to
    // every component that needs them.
    let db = Arc::new(courier_db::Database::open(&PathBuf::from(&db_path))?);
    let dispatcher = Dispatcher::new();
    let uploads = UploadStore::new(PathBuf::from(&upload_dir)).await?;
    let uploads_dir = uploads.dir().to_path_buf();

    let state: AppState = Arc::new(AppStateInner {
        db,
        dispatcher,
        jwt_secret,
        uploads,
    });

    // Routes
    let public_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/rooms", post(rooms::create_room))
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms/{id}", delete(rooms::delete_room))
        .route("/rooms/{id}/messages", get(messages::get_messages))
        .route("/device/register", post(devices::register))
        .route("/device/poll", get(devices::poll))
        .route("/device/{id}/queue", post(devices::enqueue))
        .route("/device/report", post(devices::report))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/rooms/{id}/messages", post(messages::send_message))
        .route("/messages/{id}/read", post(messages::mark_read))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state.clone());

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Courier server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher.clone(), state.db.clone())
    })
}
