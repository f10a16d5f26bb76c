use axum::{Router, routing::get};

pub mod admin;
pub mod batches;
pub mod inventory;
pub mod notifications;
pub mod system;
pub mod users;
pub mod worklogs;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/inventory", inventory::router())
        .nest("/batches", batches::router())
        .nest("/worklogs", worklogs::router())
        .nest("/notifications", notifications::router())
        .merge(users::router())
        .nest("/admin", admin::router())
}
