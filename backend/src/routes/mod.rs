//! Route definitions for the warehouse workflow API

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes; every route requires a bearer token
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/materials", material_routes())
        .nest("/purchases", purchase_routes())
        .nest("/inventories", inventory_routes())
        .nest("/write-offs", write_off_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Material stock routes
fn material_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_materials))
        .route("/:id", get(handlers::get_material))
}

/// Purchase routes
fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchases).post(handlers::create_purchase),
        )
        .route(
            "/:id",
            get(handlers::get_purchase).delete(handlers::delete_purchase),
        )
        .route("/:id/status", put(handlers::update_purchase_status))
        .route("/:id/items", post(handlers::add_purchase_item))
        .route(
            "/:id/items/:item_id",
            put(handlers::update_purchase_item).delete(handlers::remove_purchase_item),
        )
        .route(
            "/:id/items/:item_id/receive",
            post(handlers::receive_purchase_item),
        )
        .route("/:id/submit", post(handlers::submit_purchase))
}

/// Inventory (stock count) routes
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_inventories).post(handlers::create_inventory),
        )
        .route(
            "/:id",
            get(handlers::get_inventory).delete(handlers::delete_inventory),
        )
        .route("/:id/items/:item_id", put(handlers::count_inventory_item))
        .route("/:id/submit", post(handlers::submit_inventory))
        .route("/:id/approve", post(handlers::approve_inventory))
        .route("/:id/reject", post(handlers::reject_inventory))
}

/// Write-off routes
fn write_off_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_write_offs).post(handlers::create_write_off),
        )
        .route(
            "/:id",
            get(handlers::get_write_off).delete(handlers::delete_write_off),
        )
        .route("/:id/items", post(handlers::add_write_off_item))
        .route(
            "/:id/items/:item_id",
            put(handlers::update_write_off_item).delete(handlers::remove_write_off_item),
        )
        .route("/:id/submit", post(handlers::submit_write_off))
        .route("/:id/approve", post(handlers::approve_write_off))
        .route("/:id/reject", post(handlers::reject_write_off))
}
