//! Print provider HTTP client: shipping rates, shop catalog and image uploads

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::PrintifyConfig;
use crate::domain::aggregates::{ShippingInfo, ShopProduct, UploadedImage};
use crate::ports::{Catalog, ImageUploads, RateLookup};
use crate::{Result, StorefrontError};

const USER_AGENT: &str = concat!("printshop-storefront/", env!("CARGO_PKG_VERSION"));
const PAGE_LIMIT: u32 = 50;
/// Upper bound on catalog pages walked in one listing
const MAX_PAGES: u32 = 100;

#[derive(Clone)]
pub struct PrintifyClient {
    http: HttpClient,
    base_url: String,
    api_token: String,
    shop_id: String,
}

#[derive(Deserialize)]
struct ProductPage {
    #[serde(default = "first_page")] current_page: u32,
    #[serde(default)] last_page: Option<u32>,
    data: Vec<ShopProduct>,
}

fn first_page() -> u32 { 1 }

#[derive(Serialize)]
struct UploadRequest<'a> { file_name: &'a str, url: &'a str }

impl PrintifyClient {
    pub fn new(config: &PrintifyConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            shop_id: config.shop_id.clone(),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> Result<T> {
        let response = request.bearer_auth(&self.api_token).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(StorefrontError::Upstream(format!("{} returned {}: {}", path, status, body)));
        }

        response.json::<T>().await.map_err(|e| StorefrontError::MalformedResponse(format!("{}: {}", path, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json(path, self.http.get(format!("{}{}", self.base_url, path))).await
    }
}

#[async_trait]
impl RateLookup for PrintifyClient {
    #[instrument(skip(self))]
    async fn shipping_info(&self, blueprint_id: u64, print_provider_id: u64) -> Result<ShippingInfo> {
        let path = format!("/v1/catalog/blueprints/{}/print_providers/{}/shipping.json", blueprint_id, print_provider_id);
        let info: ShippingInfo = self.get_json(&path).await?;
        debug!(profiles = info.profiles.len(), handling_days = info.handling_time.value, "fetched shipping profiles");
        Ok(info)
    }
}

#[async_trait]
impl Catalog for PrintifyClient {
    #[instrument(skip(self))]
    async fn shop_products(&self) -> Result<Vec<ShopProduct>> {
        let mut products = Vec::new();
        let mut page = 1;
        loop {
            let path = format!("/v1/shops/{}/products.json?limit={}&page={}", self.shop_id, PAGE_LIMIT, page);
            let batch: ProductPage = self.get_json(&path).await?;
            let done = batch.data.is_empty() || batch.current_page >= batch.last_page.unwrap_or(batch.current_page);
            products.extend(batch.data);
            if done || page >= MAX_PAGES { break; }
            page = batch.current_page.max(page) + 1;
        }
        debug!(products = products.len(), pages = page, "fetched shop catalog");
        Ok(products)
    }
}

#[async_trait]
impl ImageUploads for PrintifyClient {
    #[instrument(skip(self))]
    async fn upload_image(&self, file_name: &str, url: &str) -> Result<UploadedImage> {
        let path = "/v1/uploads/images.json";
        let request = self.http.post(format!("{}{}", self.base_url, path)).json(&UploadRequest { file_name, url });
        let image: UploadedImage = self.send_json(path, request).await?;
        debug!(id = %image.id, "uploaded image");
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> PrintifyClient {
        PrintifyClient::new(&PrintifyConfig { base_url: server.url(), api_token: "tok".into(), shop_id: "42".into() }).unwrap()
    }

    fn page_query(page: &str) -> Matcher {
        Matcher::AllOf(vec![Matcher::UrlEncoded("limit".into(), "50".into()), Matcher::UrlEncoded("page".into(), page.into())])
    }

    #[tokio::test]
    async fn test_shipping_info_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/catalog/blueprints/6/print_providers/99/shipping.json")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"handling_time":{"value":4,"unit":"day"},"profiles":[{"variant_ids":[1],"first_item":{"cost":300,"currency":"USD"},"additional_items":{"cost":100,"currency":"USD"},"countries":["US"]}]}"#)
            .create_async()
            .await;

        let info = client(&server).shipping_info(6, 99).await.unwrap();
        assert_eq!(info.handling_time.value, 4);
        assert_eq!(info.profiles[0].additional_items.cost, 100);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/v1/catalog/blueprints/6/print_providers/99/shipping.json").with_status(404).with_body("not found").create_async().await;

        let err = client(&server).shipping_info(6, 99).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Upstream(msg) if msg.contains("404")));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/v1/catalog/blueprints/6/print_providers/99/shipping.json").with_status(200).with_body(r#"{"profiles": "nope"}"#).create_async().await;

        let err = client(&server).shipping_info(6, 99).await.unwrap_err();
        assert!(matches!(err, StorefrontError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_shop_products() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/shops/42/products.json")
            .match_query(page_query("1"))
            .with_status(200)
            .with_body(r#"{"current_page":1,"last_page":1,"data":[{"id":"p1","title":"Tee","blueprint_id":6,"print_provider_id":99,"variants":[{"id":1,"title":"S","price":2000}]}]}"#)
            .create_async()
            .await;

        let products = client(&server).shop_products().await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].variants[0].price, 2000);
    }

    #[tokio::test]
    async fn test_shop_products_walks_every_page() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/v1/shops/42/products.json")
            .match_query(page_query("1"))
            .with_status(200)
            .with_body(r#"{"current_page":1,"last_page":2,"data":[{"id":"p1","title":"Tee","blueprint_id":6,"print_provider_id":99}]}"#)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v1/shops/42/products.json")
            .match_query(page_query("2"))
            .with_status(200)
            .with_body(r#"{"current_page":2,"last_page":2,"data":[{"id":"p2","title":"Mug","blueprint_id":68,"print_provider_id":1}]}"#)
            .create_async()
            .await;

        let ids: Vec<String> = client(&server).shop_products().await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_image_posts_file_name_and_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/uploads/images.json")
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::Json(serde_json::json!({"file_name": "art.png", "url": "https://cdn.example/art.png"})))
            .with_status(200)
            .with_body(r#"{"id":"5e16d66791287a0006e522b2","file_name":"art.png","height":5979,"width":17045,"size":1138575,"mime_type":"image/png","preview_url":"https://images.example/preview.png","upload_time":"2020-01-09 07:29:43"}"#)
            .create_async()
            .await;

        let image = client(&server).upload_image("art.png", "https://cdn.example/art.png").await.unwrap();
        assert_eq!(image.id, "5e16d66791287a0006e522b2");
        assert_eq!(image.width, 17045);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_rejection_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("POST", "/v1/uploads/images.json").with_status(400).with_body(r#"{"error":"invalid url"}"#).create_async().await;

        let err = client(&server).upload_image("art.png", "nope").await.unwrap_err();
        assert!(matches!(err, StorefrontError::Upstream(msg) if msg.contains("invalid url")));
    }
}
