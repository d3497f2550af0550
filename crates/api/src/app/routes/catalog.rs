use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use commerce_auth::Permission;
use commerce_catalog::{CategoryId, ProductId};
use commerce_core::DomainError;
use commerce_infra::services::catalog::{
    NewCategory, NewProduct, NewVariant, ProductDetails, StockAdjustment,
};

use crate::app::dto::{ChangePriceRequest, ListProductsQuery, parse_id};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{has_permission, require_permission};
use crate::context::RequestIdentity;

pub fn router() -> Router {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:id/deactivate", post(deactivate_category))
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", get(get_product).patch(update_product))
        .route("/products/:id/price", post(change_price))
        .route("/products/:id/variants", post(add_variant))
        .route("/products/:id/activate", post(activate_product))
        .route("/products/:id/archive", post(archive_product))
        .route("/products/:id/stock", post(adjust_stock))
}

async fn list_categories(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(services.read(|s| s.list_categories()))
}

async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Json(body): Json<NewCategory>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::CATALOG_MANAGE)?;
    let category = services
        .run(move |s| s.create_category(body, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn deactivate_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::CATALOG_MANAGE)?;
    let category_id: CategoryId = parse_id(&id)?;
    services
        .run(move |s| s.deactivate_category(category_id, Utc::now()))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Storefront listing; `?include_inactive=true` is honoured for catalog staff only.
async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Query(query): Query<ListProductsQuery>,
) -> impl IntoResponse {
    let include_inactive =
        query.include_inactive && has_permission(&identity, &Permission::CATALOG_MANAGE);
    Json(services.read(|s| s.list_products(include_inactive)))
}

async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Json(body): Json<NewProduct>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::CATALOG_MANAGE)?;
    let product = services
        .run(move |s| s.create_product(body, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let product_id: ProductId = parse_id(&id)?;
    let staff = has_permission(&identity, &Permission::CATALOG_MANAGE);
    let product = services.read(|s| {
        if staff {
            s.product(product_id)
        } else {
            s.visible_product(product_id)
        }
    });
    let product = product.ok_or_else(|| DomainError::not_found(format!("product {product_id}")))?;
    Ok(Json(product))
}

async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
    Json(body): Json<ProductDetails>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::CATALOG_MANAGE)?;
    let product_id: ProductId = parse_id(&id)?;
    let product = services
        .run(move |s| s.update_product_details(product_id, body, Utc::now()))
        .await?;
    Ok(Json(product))
}

async fn change_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
    Json(body): Json<ChangePriceRequest>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::CATALOG_MANAGE)?;
    let product_id: ProductId = parse_id(&id)?;
    let product = services
        .run(move |s| s.change_price(product_id, body.variant_id, body.price, Utc::now()))
        .await?;
    Ok(Json(product))
}

async fn add_variant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
    Json(body): Json<NewVariant>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::CATALOG_MANAGE)?;
    let product_id: ProductId = parse_id(&id)?;
    let product = services
        .run(move |s| s.add_variant(product_id, body, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn activate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::CATALOG_MANAGE)?;
    let product_id: ProductId = parse_id(&id)?;
    let product = services
        .run(move |s| s.activate_product(product_id, Utc::now()))
        .await?;
    Ok(Json(product))
}

async fn archive_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::CATALOG_MANAGE)?;
    let product_id: ProductId = parse_id(&id)?;
    let product = services
        .run(move |s| s.archive_product(product_id, Utc::now()))
        .await?;
    Ok(Json(product))
}

async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
    Json(body): Json<StockAdjustment>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::CATALOG_MANAGE)?;
    let product_id: ProductId = parse_id(&id)?;
    let product = services
        .run(move |s| s.adjust_stock(product_id, body, Utc::now()))
        .await?;
    Ok(Json(product))
}
