//! `GET /api/products`: active products with computed available stock.

use crate::{ApiError, AppState};
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use shared_types::UNLIMITED_STOCK;

/// One product as the storefront sees it.
#[derive(Debug, Serialize)]
pub struct ProductView {
    /// Merchant SKU.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Minor-unit price.
    pub unit_price: i64,
    /// Units currently purchasable; `null` for unlimited.
    pub available: Option<i64>,
}

/// List active products.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<ProductView>>, ApiError> {
    let products = state.products.list_active()?;
    let mut views = Vec::with_capacity(products.len());
    for product in products {
        let available = state.engine.available(&product)?;
        views.push(ProductView {
            sku: product.sku,
            name: product.name,
            unit_price: product.unit_price,
            available: (available != UNLIMITED_STOCK).then_some(available),
        });
    }
    Ok(Json(views))
}
