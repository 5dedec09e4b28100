//! HTTP routes for the cart, shipping estimate and checkout handoff

use std::sync::Arc;

use axum::{extract::{Path, State}, http::StatusCode, routing::{get, post, put}, Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use validator::{Validate, ValidationError};

use crate::application::{CheckoutSessionRequest, OrderTotals, SessionRegistry, ShippingEstimator};
use crate::config::CheckoutSettings;
use crate::domain::aggregates::{Cart, LineItem, NewLineItem, ProductError, ShippingEstimate, ShopProduct, UploadedImage};
use crate::domain::value_objects::CountryCode;
use crate::infrastructure::events;
use crate::ports::{Catalog, ImageUploads};
use crate::StorefrontError;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub estimator: Arc<ShippingEstimator>,
    pub catalog: Arc<dyn Catalog>,
    pub uploads: Arc<dyn ImageUploads>,
    pub checkout: CheckoutSettings,
    pub nats: Option<async_nats::Client>,
}

type ApiResult<T> = Result<T, (StatusCode, String)>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "printshop-storefront"})) }))
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/cart", post(create_cart))
        .route("/api/v1/cart/:session", get(get_cart))
        .route("/api/v1/cart/:session/items", post(add_item))
        .route("/api/v1/cart/:session/products/:product_id/variants/:variant_id", post(add_catalog_item))
        .route("/api/v1/cart/:session/items/:product_id/:variant_id", put(update_item).delete(remove_item))
        .route("/api/v1/cart/:session/country", put(set_country))
        .route("/api/v1/cart/:session/shipping", post(estimate_shipping))
        .route("/api/v1/checkout/:session", post(checkout))
        .route("/api/v1/uploads/images", post(upload_image))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

fn error_response(e: StorefrontError) -> (StatusCode, String) {
    let status = match &e {
        StorefrontError::InvalidSession(_) | StorefrontError::EmptyCart => StatusCode::BAD_REQUEST,
        StorefrontError::ProductNotFound(_) | StorefrontError::Product(ProductError::VariantNotFound(_)) => StatusCode::NOT_FOUND,
        StorefrontError::Product(ProductError::VariantDisabled(_)) => StatusCode::CONFLICT,
        StorefrontError::Upstream(_) | StorefrontError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
        StorefrontError::Storage(_) | StorefrontError::Config(_) | StorefrontError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() { tracing::error!(error = %e, "request failed"); }
    (status, e.to_string())
}

fn invalid(e: impl std::fmt::Display) -> (StatusCode, String) { (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()) }

/// Prices must be whole cents so the charged amount matches the displayed totals.
fn price_in_cents(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() { return Err(ValidationError::new("negative_price")); }
    if value.normalize().scale() > 2 { return Err(ValidationError::new("fractional_cents")); }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    #[validate(length(min = 1, max = 64))] pub product_id: String,
    pub variant_id: u64,
    #[validate(length(min = 1, max = 256))] pub name: String,
    #[validate(custom = "price_in_cents")] pub unit_price: Decimal,
    #[serde(default)] pub image: String,
    pub blueprint_id: u64,
    pub print_provider_id: u64,
}

impl From<AddItemRequest> for NewLineItem {
    fn from(r: AddItemRequest) -> Self {
        Self { product_id: r.product_id, variant_id: r.variant_id, name: r.name, unit_price: r.unit_price, image: r.image, blueprint_id: r.blueprint_id, print_provider_id: r.print_provider_id }
    }
}

#[derive(Debug, Deserialize, Validate)] pub struct UpdateQuantityRequest { #[validate(range(min = -1000, max = 1000))] pub quantity: i64 }
#[derive(Debug, Deserialize, Validate)] pub struct SetCountryRequest { #[validate(length(min = 2, max = 17))] pub country: String }

#[derive(Debug, Deserialize, Validate)]
pub struct UploadImageRequest {
    #[validate(length(min = 1, max = 255))] pub name: String,
    #[validate(url)] pub url: String,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub session: String,
    pub items: Vec<LineItem>,
    pub total_items: u32,
    pub item_total: String,
    pub country: CountryCode,
    pub shipping_total: String,
    pub shipping: Option<ShippingEstimate>,
}

#[derive(Debug, Serialize)]
pub struct ShippingResponse { pub applied: bool, pub shipping_total: String, pub partial: bool, pub estimate: ShippingEstimate }

#[derive(Debug, Serialize)]
pub struct CheckoutResponse { pub totals: OrderTotals, pub session_request: CheckoutSessionRequest, pub amount_total: i64 }

fn view(cart: &crate::application::CartStore) -> CartView {
    CartView {
        session: cart.session().to_string(),
        items: cart.items().to_vec(),
        total_items: cart.total_items(),
        item_total: cart.total_item_price().to_string(),
        country: cart.country().clone(),
        shipping_total: cart.shipping_total().to_string(),
        shipping: cart.last_estimate().cloned(),
    }
}

async fn list_products(State(s): State<AppState>) -> ApiResult<Json<Vec<ShopProduct>>> {
    let products = s.catalog.shop_products().await.map_err(error_response)?;
    Ok(Json(products.into_iter().filter(|p| p.visible).map(ShopProduct::sellable).collect()))
}

async fn create_cart(State(s): State<AppState>) -> ApiResult<(StatusCode, Json<CartView>)> {
    let session = uuid::Uuid::new_v4().simple().to_string();
    let cart = s.sessions.open(&session).await.map_err(error_response)?;
    let cart = cart.lock().await;
    Ok((StatusCode::CREATED, Json(view(&cart))))
}

async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> ApiResult<Json<CartView>> {
    let cart = s.sessions.open(&session).await.map_err(error_response)?;
    let cart = cart.lock().await;
    Ok(Json(view(&cart)))
}

async fn add_line(s: &AppState, session: &str, item: NewLineItem) -> ApiResult<(StatusCode, Json<CartView>)> {
    let cart = s.sessions.open(session).await.map_err(error_response)?;
    let (body, events) = {
        let mut cart = cart.lock().await;
        cart.add(item).await;
        (view(&cart), cart.take_events())
    };
    events::publish(s.nats.as_ref(), session, events).await;
    Ok((StatusCode::CREATED, Json(body)))
}

async fn add_item(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<AddItemRequest>) -> ApiResult<(StatusCode, Json<CartView>)> {
    r.validate().map_err(invalid)?;
    add_line(&s, &session, r.into()).await
}

async fn add_catalog_item(State(s): State<AppState>, Path((session, product_id, variant_id)): Path<(String, String, u64)>) -> ApiResult<(StatusCode, Json<CartView>)> {
    let products = s.catalog.shop_products().await.map_err(error_response)?;
    let product = products.iter().find(|p| p.visible && p.id == product_id).ok_or_else(|| error_response(StorefrontError::ProductNotFound(product_id.clone())))?;
    let item = product.line_item(variant_id).map_err(|e| error_response(e.into()))?;
    add_line(&s, &session, item).await
}

async fn update_item(State(s): State<AppState>, Path((session, product_id, variant_id)): Path<(String, String, u64)>, Json(r): Json<UpdateQuantityRequest>) -> ApiResult<Json<CartView>> {
    r.validate().map_err(invalid)?;
    let cart = s.sessions.open(&session).await.map_err(error_response)?;
    let (body, events) = {
        let mut cart = cart.lock().await;
        cart.update(&product_id, variant_id, r.quantity).await;
        (view(&cart), cart.take_events())
    };
    events::publish(s.nats.as_ref(), &session, events).await;
    Ok(Json(body))
}

async fn remove_item(State(s): State<AppState>, Path((session, product_id, variant_id)): Path<(String, String, u64)>) -> ApiResult<Json<CartView>> {
    let cart = s.sessions.open(&session).await.map_err(error_response)?;
    let (body, events) = {
        let mut cart = cart.lock().await;
        cart.remove(&product_id, variant_id).await;
        (view(&cart), cart.take_events())
    };
    events::publish(s.nats.as_ref(), &session, events).await;
    Ok(Json(body))
}

async fn set_country(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<SetCountryRequest>) -> ApiResult<Json<CartView>> {
    r.validate().map_err(invalid)?;
    let country = CountryCode::new(r.country).map_err(invalid)?;
    let cart = s.sessions.open(&session).await.map_err(error_response)?;
    let (body, events) = {
        let mut cart = cart.lock().await;
        cart.set_country(country).await;
        (view(&cart), cart.take_events())
    };
    events::publish(s.nats.as_ref(), &session, events).await;
    Ok(Json(body))
}

async fn estimate_shipping(State(s): State<AppState>, Path(session): Path<String>) -> ApiResult<Json<ShippingResponse>> {
    let cart = s.sessions.open(&session).await.map_err(error_response)?;
    let ticket = cart.lock().await.begin_estimate();
    let estimate = s.estimator.estimate(&ticket.country, &ticket.items).await;

    let (applied, shipping_total, events) = {
        let mut cart = cart.lock().await;
        let applied = cart.apply_estimate(ticket.generation, estimate.clone()).await;
        (applied, cart.shipping_total().to_string(), cart.take_events())
    };
    events::publish(s.nats.as_ref(), &session, events).await;
    Ok(Json(ShippingResponse { applied, shipping_total, partial: estimate.is_partial(), estimate }))
}

async fn checkout(State(s): State<AppState>, Path(session): Path<String>) -> ApiResult<Json<CheckoutResponse>> {
    let cart = s.sessions.open(&session).await.map_err(error_response)?;
    let ticket = cart.lock().await.begin_estimate();
    if ticket.items.is_empty() { return Err(error_response(StorefrontError::EmptyCart)); }
    let estimate = s.estimator.estimate(&ticket.country, &ticket.items).await;

    let settings = s.sessions.settings();
    let snapshot = Cart::restore(ticket.items, &settings.currency, settings.max_quantity);
    let totals = OrderTotals::compute(&snapshot, &estimate, s.checkout.tax_rate);
    let session_request = CheckoutSessionRequest::build(&snapshot, &totals, &s.checkout).map_err(error_response)?;

    let events = {
        let mut cart = cart.lock().await;
        cart.apply_estimate(ticket.generation, estimate).await;
        cart.take_events()
    };
    events::publish(s.nats.as_ref(), &session, events).await;
    info!(session = %session, total = %totals.total, partial = totals.shipping_partial, "checkout session prepared");
    let amount_total = session_request.amount_total();
    Ok(Json(CheckoutResponse { totals, session_request, amount_total }))
}

async fn upload_image(State(s): State<AppState>, Json(r): Json<UploadImageRequest>) -> ApiResult<Json<UploadedImage>> {
    r.validate().map_err(invalid)?;
    let image = s.uploads.upload_image(&r.name, &r.url).await.map_err(error_response)?;
    info!(id = %image.id, file_name = %image.file_name, "artwork uploaded");
    Ok(Json(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::shipping::tests::{flat_rate, StubRates};
    use crate::config::CartSettings;
    use crate::domain::aggregates::{ProductImage, Variant};
    use crate::infrastructure::MemoryStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct StubCatalog(Vec<ShopProduct>);
    struct StubUploads;

    #[async_trait]
    impl ImageUploads for StubUploads {
        async fn upload_image(&self, file_name: &str, url: &str) -> crate::Result<UploadedImage> {
            if url.contains("broken") { return Err(StorefrontError::Upstream("/v1/uploads/images.json returned 400".into())); }
            Ok(UploadedImage {
                id: "img-1".into(), file_name: file_name.into(), height: 100, width: 200, size: 2048,
                mime_type: "image/png".into(), preview_url: url.into(), upload_time: "2024-01-01 00:00:00".into(),
            })
        }
    }

    #[async_trait]
    impl Catalog for StubCatalog {
        async fn shop_products(&self) -> crate::Result<Vec<ShopProduct>> { Ok(self.0.clone()) }
    }

    fn products() -> Vec<ShopProduct> {
        let tee = ShopProduct {
            id: "tee".into(), title: "Unisex Tee".into(), description: String::new(), blueprint_id: 6, print_provider_id: 99,
            images: vec![ProductImage { src: "https://images.example/tee.png".into(), variant_ids: vec![1], is_default: true }],
            variants: vec![
                Variant { id: 1, title: "S".into(), price: 1000, sku: String::new(), is_enabled: true, is_default: true },
                Variant { id: 2, title: "M".into(), price: 1000, sku: String::new(), is_enabled: false, is_default: false },
            ],
            visible: true,
        };
        let draft = ShopProduct { id: "draft".into(), title: "Unreleased Hoodie".into(), visible: false, ..tee.clone() };
        vec![tee, draft]
    }

    fn app() -> (Router, Arc<StubRates>) { app_with_tax(Decimal::ZERO) }

    fn app_with_tax(tax_rate: Decimal) -> (Router, Arc<StubRates>) {
        let store = Arc::new(MemoryStore::new());
        let rates = Arc::new(StubRates::default().with(6, 99, flat_rate(vec![1], &["US"], 300, 100)));
        let state = AppState {
            sessions: Arc::new(SessionRegistry::new(store.clone(), CartSettings::default())),
            estimator: Arc::new(ShippingEstimator::new(rates.clone(), store, chrono::Duration::hours(24))),
            catalog: Arc::new(StubCatalog(products())),
            uploads: Arc::new(StubUploads),
            checkout: CheckoutSettings::for_app_url("https://shop.example", "USD", tax_rate),
            nats: None,
        };
        (router(state), rates)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(v) => builder.header("content-type", "application/json").body(Body::from(v.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    fn tee() -> Value {
        json!({"product_id": "tee", "variant_id": 1, "name": "Unisex Tee, S", "unit_price": "10.00",
               "image": "https://images.example/tee.png", "blueprint_id": 6, "print_provider_id": 99})
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_create_cart_issues_session() {
        let (app, _) = app();
        let (status, body) = send(&app, "POST", "/api/v1/cart", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let session = body["session"].as_str().unwrap().to_string();
        assert_eq!(session.len(), 32);
        let (status, body) = send(&app, "GET", &format!("/api/v1/cart/{}", session), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["shipping_total"], "0.00");
    }

    #[tokio::test]
    async fn test_add_then_estimate() {
        let (app, rates) = app();
        send(&app, "POST", "/api/v1/cart/s1/items", Some(tee())).await;
        let (status, body) = send(&app, "POST", "/api/v1/cart/s1/items", Some(tee())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["items"][0]["quantity"], 2);
        assert_eq!(body["item_total"], "20.00");

        let (status, body) = send(&app, "POST", "/api/v1/cart/s1/shipping", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applied"], true);
        assert_eq!(body["shipping_total"], "4.00");
        assert_eq!(body["partial"], false);

        send(&app, "POST", "/api/v1/cart/s1/shipping", None).await;
        assert_eq!(rates.call_count(), 1);

        let (_, body) = send(&app, "GET", "/api/v1/cart/s1", None).await;
        assert_eq!(body["shipping_total"], "4.00");
        assert_eq!(body["country"], "US");
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let (app, _) = app();
        send(&app, "POST", "/api/v1/cart/s1/items", Some(tee())).await;
        let (_, body) = send(&app, "PUT", "/api/v1/cart/s1/items/tee/1", Some(json!({"quantity": 3}))).await;
        assert_eq!(body["item_total"], "30.00");

        let (status, body) = send(&app, "PUT", "/api/v1/cart/s1/items/missing/1", Some(json!({"quantity": 3}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_items"], 3);

        let (_, body) = send(&app, "DELETE", "/api/v1/cart/s1/items/tee/1", None).await;
        assert_eq!(body["items"].as_array().map(Vec::len), Some(0));
        assert_eq!(body["shipping_total"], "0.00");
    }

    #[tokio::test]
    async fn test_add_from_catalog() {
        let (app, _) = app();
        let (status, body) = send(&app, "POST", "/api/v1/cart/s1/products/tee/variants/1", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["items"][0]["name"], "Unisex Tee, S");
        assert_eq!(body["items"][0]["image"], "https://images.example/tee.png");

        let (status, _) = send(&app, "POST", "/api/v1/cart/s1/products/tee/variants/2", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = send(&app, "POST", "/api/v1/cart/s1/products/mug/variants/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "POST", "/api/v1/cart/s1/products/draft/variants/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_products_hide_disabled_variants() {
        let (app, _) = app();
        let (_, body) = send(&app, "GET", "/api/v1/products", None).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["variants"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_country_without_profile_is_partial() {
        let (app, _) = app();
        send(&app, "POST", "/api/v1/cart/s1/items", Some(tee())).await;
        let (status, body) = send(&app, "PUT", "/api/v1/cart/s1/country", Some(json!({"country": "au"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["country"], "AU");

        let (_, body) = send(&app, "POST", "/api/v1/cart/s1/shipping", None).await;
        assert_eq!(body["partial"], true);
        assert_eq!(body["shipping_total"], "0.00");
        assert_eq!(body["estimate"]["omitted"][0]["reason"], "no_applicable_profile");
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (app, _) = app();
        let mut bad = tee();
        bad["unit_price"] = json!("-1.00");
        let (status, _) = send(&app, "POST", "/api/v1/cart/s1/items", Some(bad)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let mut sub_cent = tee();
        sub_cent["unit_price"] = json!("0.005");
        let (status, _) = send(&app, "POST", "/api/v1/cart/s1/items", Some(sub_cent)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&app, "PUT", "/api/v1/cart/s1/country", Some(json!({"country": "Narnia"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&app, "GET", "/api/v1/cart/bad:id", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_checkout_payload() {
        let (app, _) = app();
        let (status, _) = send(&app, "POST", "/api/v1/checkout/s1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        send(&app, "POST", "/api/v1/cart/s1/items", Some(tee())).await;
        send(&app, "POST", "/api/v1/cart/s1/items", Some(tee())).await;
        let (status, body) = send(&app, "POST", "/api/v1/checkout/s1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["amount_total"], 2400);
        assert_eq!(body["session_request"]["line_items"][0]["price_data"]["unit_amount"], 1000);
        assert_eq!(body["session_request"]["line_items"][1]["price_data"]["product_data"]["name"], "Shipping");
        assert_eq!(body["totals"]["shipping_partial"], false);

        let (_, body) = send(&app, "GET", "/api/v1/cart/s1", None).await;
        assert_eq!(body["shipping_total"], "4.00");
    }

    #[tokio::test]
    async fn test_charged_amount_matches_totals() {
        let (app, _) = app_with_tax(Decimal::new(825, 4));
        let mut item = tee();
        item["unit_price"] = json!("4.990");
        for _ in 0..3 { send(&app, "POST", "/api/v1/cart/s1/items", Some(item.clone())).await; }

        let (status, body) = send(&app, "POST", "/api/v1/checkout/s1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totals"]["items"]["amount"], "14.97");
        assert_eq!(body["totals"]["tax"]["amount"], "1.24");
        assert_eq!(body["totals"]["total"]["amount"], "21.21");
        assert_eq!(body["amount_total"], 2121);
    }

    #[tokio::test]
    async fn test_upload_image() {
        let (app, _) = app();
        let (status, body) = send(&app, "POST", "/api/v1/uploads/images", Some(json!({"name": "art.png", "url": "https://cdn.example/art.png"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "img-1");
        assert_eq!(body["file_name"], "art.png");

        let (status, _) = send(&app, "POST", "/api/v1/uploads/images", Some(json!({"name": "art.png", "url": "not a url"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&app, "POST", "/api/v1/uploads/images", Some(json!({"name": "art.png", "url": "https://cdn.example/broken.png"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
