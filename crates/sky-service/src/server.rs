//! HTTP server for the take-out API.
//!
//! Customer routes live under `/user` and expect the caller's id in the
//! `x-user-id` header. Staff routes live under `/admin`. The payment gateway
//! calls back on `/notify/paySuccess`.

use crate::apis::{cart, dish, notify, order, shop};
use axum::{
	routing::{delete, get, post, put},
	Router,
};
use sky_config::ApiConfig;
use sky_core::ShopEngine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the engine serving every request.
	pub shop: Arc<ShopEngine>,
}

/// Builds the full route table.
pub fn router(shop: Arc<ShopEngine>) -> Router {
	let user = Router::new()
		.route("/order/submit", post(order::submit))
		.route("/order/payment", put(order::payment))
		.route("/order/history", get(order::history))
		.route("/order/detail/{id}", get(order::user_detail))
		.route("/order/cancel/{id}", put(order::user_cancel))
		.route("/order/repetition/{id}", post(order::repetition))
		.route("/shoppingCart/add", post(cart::add))
		.route("/shoppingCart/sub", post(cart::sub))
		.route("/shoppingCart/list", get(cart::list))
		.route("/shoppingCart/clean", delete(cart::clean))
		.route("/dish/list", get(dish::list))
		.route("/shop/status", get(shop::status));

	let admin = Router::new()
		.route("/order/conditionSearch", get(order::condition_search))
		.route("/order/statistics", get(order::statistics))
		.route("/order/details/{id}", get(order::details))
		.route("/order/confirm", put(order::confirm))
		.route("/order/rejection", put(order::rejection))
		.route("/order/cancel", put(order::admin_cancel))
		.route("/order/delivery/{id}", put(order::delivery))
		.route("/order/complete/{id}", put(order::complete))
		.route(
			"/dish",
			post(dish::create).put(dish::update).delete(dish::delete),
		)
		.route("/dish/list", get(dish::admin_list))
		.route("/dish/page", get(dish::page))
		.route("/dish/status/{status}", post(dish::set_status))
		.route("/dish/{id}", get(dish::get))
		.route("/shop/status", get(shop::status))
		.route("/shop/{status}", put(shop::set_status));

	Router::new()
		.nest("/user", user)
		.nest("/admin", admin)
		.route("/notify/paySuccess", post(notify::pay_success))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(AppState { shop })
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	shop: Arc<ShopEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(shop);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!(address = %bind_address, "Take-out API server starting");

	axum::serve(listener, app).await?;

	Ok(())
}
