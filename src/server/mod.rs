//! `/api/els/*` HTTP サーバ

mod app;
mod error;
mod handlers;
mod models;
mod routes;
mod store;

pub use app::{create_app, init_tracing, spawn_keepalive, AppState};
pub use error::{AppError, AppResult};
pub use models::RunResult;
pub use store::{FileStore, DOWNLOAD_TTL};
