use axum::{
    routing::{get, post},
    Router,
};

use crate::traits::{CredentialManager, Scraper};

use super::app::AppState;
use super::handlers::{
    capabilities, download, get_config, health_check, login, logout, parse_xlsx, run, save_config,
    template,
};

/// Creates and configures all application routes
pub fn create_routes<M>() -> Router<AppState<M>>
where
    M: CredentialManager,
    M::Session: Scraper,
{
    Router::new()
        .route("/health", get(health_check::<M>))
        .route("/api/els/capabilities", get(capabilities))
        .route("/api/els/config", get(get_config::<M>).post(save_config::<M>))
        .route("/api/els/login", post(login::<M>))
        .route("/api/els/run", post(run::<M>))
        .route("/api/els/parse-xlsx", post(parse_xlsx))
        .route("/api/els/download", get(download::<M>))
        .route("/api/els/logout", post(logout::<M>))
        .route("/api/els/template", get(template))
}
