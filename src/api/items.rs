//! Item (catalog) endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::item::{CreateItem, Item, ItemAudit, ItemQuery, UpdateItem},
};

/// One page of items
#[derive(Serialize, ToSchema)]
pub struct ItemPage {
    pub items: Vec<Item>,
    /// Total number of matching items
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub per_page: i64,
}

/// List items with an optional category filter
#[utoipa::path(
    get,
    path = "/items",
    tag = "items",
    params(ItemQuery),
    responses(
        (status = 200, description = "List of items", body = ItemPage)
    )
)]
pub async fn list_items(
    State(state): State<crate::AppState>,
    query: Result<Query<ItemQuery>, QueryRejection>,
) -> AppResult<Json<ItemPage>> {
    let Query(query) = query?;

    let (items, total) = state.services.catalog.list_items(&query).await?;

    Ok(Json(ItemPage {
        items,
        total,
        page: query.page(),
        per_page: query.per_page(),
    }))
}

/// Get item details by ID
#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item details", body = Item),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_item(
    State(state): State<crate::AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Item>> {
    let Path(id) = id?;

    let item = state.services.catalog.get_item(id).await?;
    Ok(Json(item))
}

/// Create a new item
#[utoipa::path(
    post,
    path = "/items",
    tag = "items",
    request_body = CreateItem,
    responses(
        (status = 201, description = "Item created", body = Item),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Item code already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_item(
    State(state): State<crate::AppState>,
    payload: Result<Json<CreateItem>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let Json(item) = payload?;

    let created = state.services.catalog.create_item(item).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update the descriptive fields of an item
#[utoipa::path(
    put,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    request_body = UpdateItem,
    responses(
        (status = 200, description = "Item updated", body = Item),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Item code already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_item(
    State(state): State<crate::AppState>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UpdateItem>, JsonRejection>,
) -> AppResult<Json<Item>> {
    let Path(id) = id?;
    let Json(update) = payload?;

    let updated = state.services.catalog.update_item(id, update).await?;
    Ok(Json(updated))
}

/// Delete an item together with its returned loans
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Item has outstanding loans", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_item(
    State(state): State<crate::AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<StatusCode> {
    let Path(id) = id?;

    state.services.lending.delete_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reconcile an item's stock with its open loans
#[utoipa::path(
    get,
    path = "/items/{id}/audit",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Stock audit", body = ItemAudit),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn audit_item(
    State(state): State<crate::AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<ItemAudit>> {
    let Path(id) = id?;

    let audit = state.services.catalog.audit_item(id).await?;
    Ok(Json(audit))
}
