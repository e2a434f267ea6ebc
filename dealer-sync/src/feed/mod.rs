//! Upstream dealer feed client
//!
//! The feed is the canonical snapshot of cities and showrooms. It is owned by
//! an external system; this module only fetches and deserializes it. Both
//! endpoints are materialized fully before processing starts, so a transport
//! failure is detected before any local row is touched.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// City record as delivered by the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct CityDto {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Name")]
    pub name: String,
}

/// Showroom (dealer) record as delivered by the feed.
///
/// `id` is externally assigned and may be reassigned between snapshots; `gssn`
/// is the stable business key that identifies the same dealer across id
/// changes.
#[derive(Debug, Clone, Deserialize)]
pub struct ShowroomDto {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Gssn")]
    pub gssn: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CityId")]
    pub city_id: Option<i64>,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Cofico")]
    pub cofico: Option<String>,
    #[serde(rename = "Fax")]
    pub fax: String,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Phone")]
    pub phone: String,
    #[serde(rename = "Site")]
    pub site: String,
}

/// Source of feed snapshots.
///
/// The sync engine only depends on this trait; tests substitute an in-memory
/// implementation.
#[async_trait]
pub trait DealerFeed {
    async fn fetch_cities(&self) -> Result<Vec<CityDto>>;
    async fn fetch_showrooms(&self) -> Result<Vec<ShowroomDto>>;
}

/// HTTP implementation of [`DealerFeed`] against the configured endpoints.
pub struct HttpDealerFeed {
    client: reqwest::Client,
    city_url: String,
    showroom_url: String,
}

impl HttpDealerFeed {
    pub fn new(city_url: String, showroom_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            city_url,
            showroom_url,
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url))?
            .error_for_status()
            .with_context(|| format!("Feed endpoint {} returned an error status", url))?;

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize response from {}", url))
    }
}

#[async_trait]
impl DealerFeed for HttpDealerFeed {
    async fn fetch_cities(&self) -> Result<Vec<CityDto>> {
        self.fetch_json(&self.city_url).await
    }

    async fn fetch_showrooms(&self) -> Result<Vec<ShowroomDto>> {
        self.fetch_json(&self.showroom_url).await
    }
}
