use axum::{Router, routing::get};

pub mod cart;
pub mod catalog;
pub mod orders;
pub mod promotions;
pub mod support;
pub mod system;

/// Router for every endpoint behind the identity middleware.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/catalog", catalog::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/promotions", promotions::router())
        .nest("/support", support::router())
}
