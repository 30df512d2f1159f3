use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::responses::ErrorResponse;
use crate::routes::auth::authenticate;
use crate::services::stripe::ProductListing;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPrices {
    pub monthly: Option<f64>,
    pub annual: Option<f64>,
    pub monthly_with_annual_discount: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPriceIds {
    pub monthly: Option<String>,
    pub annual: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub metadata: std::collections::BTreeMap<String, String>,
    pub prices: ProductPrices,
    pub price_ids: ProductPriceIds,
    pub images: Vec<String>,
    pub created: i64,
    pub updated: i64,
}

pub async fn list_products(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match authenticate(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let listings = match state.stripe.list_products().await {
        Ok(listings) => listings,
        Err(err) => {
            error!(user_id = %user.id, error = %err, "product listing failed");
            return ErrorResponse::server_error("Failed to load products").into_response();
        }
    };

    let mut products: Vec<ProductResponse> = listings.into_iter().map(shape_product).collect();
    // Cheapest plan first; products without a monthly price sort last.
    products.sort_by(|a, b| {
        match (a.prices.monthly, b.prices.monthly) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });

    Json(products).into_response()
}

fn shape_product(listing: ProductListing) -> ProductResponse {
    let monthly_price = listing
        .prices
        .iter()
        .find(|p| p.interval.as_deref() == Some("month"));
    let annual_price = listing
        .prices
        .iter()
        .find(|p| p.interval.as_deref() == Some("year"));

    let monthly = monthly_price.and_then(|p| p.unit_amount).map(cents);
    let annual = annual_price.and_then(|p| p.unit_amount).map(cents);
    let monthly_with_annual_discount = annual.map(|a| round2(a / 12.0));
    let monthly_price_id = monthly_price.map(|p| p.id.clone());
    let annual_price_id = annual_price.map(|p| p.id.clone());

    let features = parse_features(&listing.metadata);

    ProductResponse {
        id: listing.id,
        name: listing.name,
        description: listing.description,
        features,
        prices: ProductPrices {
            monthly,
            annual,
            monthly_with_annual_discount,
        },
        price_ids: ProductPriceIds {
            monthly: monthly_price_id,
            annual: annual_price_id,
        },
        metadata: listing.metadata,
        images: listing.images,
        created: listing.created,
        updated: listing.updated,
    }
}

/// Features come from product metadata, either as a JSON array string or as a
/// comma-separated list.
fn parse_features(metadata: &std::collections::BTreeMap<String, String>) -> Vec<String> {
    let Some(raw) = metadata.get("features") else {
        return Vec::new();
    };
    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(raw) {
        return items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn cents(amount: i64) -> f64 {
    amount as f64 / 100.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
