//! Dish listing and staff dish maintenance endpoints.

use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::Json,
};
use serde::Deserialize;
use sky_types::{APIError, Dish, DishPageQuery, DishRequest, ItemStatus, Page};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryQuery {
	pub category_id: u64,
}

/// Comma separated id list, as in `?ids=1,2,3`.
#[derive(Debug, Deserialize)]
pub struct IdsQuery {
	pub ids: String,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
	pub id: u64,
}

fn parse_ids(raw: &str) -> Result<Vec<u64>, APIError> {
	raw.split(',')
		.map(str::trim)
		.filter(|part| !part.is_empty())
		.map(|part| {
			part.parse::<u64>().map_err(|_| APIError::BadRequest {
				error_type: "INVALID_REQUEST".to_string(),
				message: format!("invalid dish id '{}'", part),
			})
		})
		.collect()
}

/// GET /user/dish/list
pub async fn list(
	State(state): State<AppState>,
	Query(query): Query<CategoryQuery>,
) -> Result<Json<Vec<Dish>>, APIError> {
	let dishes = state.shop.dishes().list_dishes(query.category_id).await?;
	Ok(Json(dishes))
}

/// GET /admin/dish/list
pub async fn admin_list(
	State(state): State<AppState>,
	Query(query): Query<CategoryQuery>,
) -> Result<Json<Vec<Dish>>, APIError> {
	let dishes = state
		.shop
		.dishes()
		.admin_list_dishes(query.category_id)
		.await?;
	Ok(Json(dishes))
}

/// GET /admin/dish/page
pub async fn page(
	State(state): State<AppState>,
	Query(query): Query<DishPageQuery>,
) -> Result<Json<Page<Dish>>, APIError> {
	let page = state.shop.dishes().page_dishes(&query).await?;
	Ok(Json(page))
}

/// GET /admin/dish/{id}
pub async fn get(
	State(state): State<AppState>,
	Path(id): Path<u64>,
) -> Result<Json<Dish>, APIError> {
	let dish = state.shop.dishes().dish(id).await?;
	Ok(Json(dish))
}

/// POST /admin/dish
pub async fn create(
	State(state): State<AppState>,
	Json(request): Json<DishRequest>,
) -> Result<Json<Dish>, APIError> {
	let dish = state.shop.dishes().save_dish(request).await?;
	Ok(Json(dish))
}

/// PUT /admin/dish
pub async fn update(
	State(state): State<AppState>,
	Json(request): Json<DishRequest>,
) -> Result<Json<Dish>, APIError> {
	let dish = state.shop.dishes().update_dish(request).await?;
	Ok(Json(dish))
}

/// DELETE /admin/dish
pub async fn delete(
	State(state): State<AppState>,
	Query(query): Query<IdsQuery>,
) -> Result<StatusCode, APIError> {
	let ids = parse_ids(&query.ids)?;
	state.shop.dishes().delete_dishes(&ids).await?;
	Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/dish/status/{status}
pub async fn set_status(
	State(state): State<AppState>,
	Path(status): Path<u8>,
	Query(query): Query<IdQuery>,
) -> Result<Json<Dish>, APIError> {
	let status = ItemStatus::try_from(status).map_err(|message| APIError::BadRequest {
		error_type: "INVALID_REQUEST".to_string(),
		message,
	})?;
	let dish = state.shop.dishes().set_dish_status(query.id, status).await?;
	Ok(Json(dish))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_ids() {
		assert_eq!(parse_ids("1,2, 3").unwrap(), vec![1, 2, 3]);
		assert_eq!(parse_ids("4,").unwrap(), vec![4]);
		assert!(parse_ids("").unwrap().is_empty());
		assert!(parse_ids("1,x").is_err());
	}
}
