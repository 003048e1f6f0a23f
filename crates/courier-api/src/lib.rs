pub mod auth;
pub mod devices;
pub mod error;
pub mod ingest;
pub mod messages;
pub mod middleware;
pub mod rooms;
pub mod uploads;

pub use error::{ApiError, ApiResult};

use std::sync::Arc;

use courier_db::Database;
use courier_gateway::Dispatcher;

use crate::uploads::UploadStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    pub uploads: UploadStore,
}
