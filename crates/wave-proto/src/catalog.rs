//! Catalog (iTunes Search API) client.
//!
//! A thin typed pass-through: one request per call, no caching, no retries,
//! no paging.  Ranking and matching belong to the remote service.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::track::{CatalogItem, TrackCard, TrackRef};

/// Album count requested by an artist lookup.
pub const ARTIST_LOOKUP_LIMIT: u32 = 12;

/// Kind of entity the catalog should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Song,
    Album,
    MusicArtist,
    MusicVideo,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Song => "song",
            Self::Album => "album",
            Self::MusicArtist => "musicArtist",
            Self::MusicVideo => "musicVideo",
        }
    }
}

/// One search request.  `media` is omitted from the query string when `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub term: String,
    pub limit: u32,
    pub entity: Entity,
    pub media: Option<&'static str>,
}

impl SearchQuery {
    pub fn new(term: impl Into<String>, limit: u32, entity: Entity) -> Self {
        Self {
            term: term.into(),
            limit,
            entity,
            media: Some("music"),
        }
    }

    /// Album lookup for an artist name.  The catalog is queried without a
    /// media filter so compilations keep their collection wrapper.
    pub fn artist_albums(name: impl Into<String>) -> Self {
        Self {
            term: name.into(),
            limit: ARTIST_LOOKUP_LIMIT,
            entity: Entity::Album,
            media: None,
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("term", self.term.clone()),
            ("limit", self.limit.to_string()),
            ("entity", self.entity.as_str().to_string()),
        ];
        if let Some(media) = self.media {
            params.push(("media", media.to_string()));
        }
        params
    }
}

/// Response body of the search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    #[serde(default)]
    pub result_count: u64,
    #[serde(default)]
    pub results: Vec<CatalogItem>,
}

impl SearchResults {
    /// The "no results" condition.  Not an error.
    pub fn is_empty(&self) -> bool {
        self.result_count == 0 || self.results.is_empty()
    }

    /// Every result that is a track, in catalog order.
    pub fn cards(&self) -> Vec<TrackCard> {
        self.results.iter().filter_map(TrackCard::from_catalog).collect()
    }

    /// Tracks that carry a preview URL.
    pub fn playable(&self) -> Vec<TrackRef> {
        self.results
            .iter()
            .filter_map(TrackRef::from_catalog)
            .filter(TrackRef::is_playable)
            .collect()
    }

    /// Album-like entries, for artist lookups.
    pub fn collections(&self) -> Vec<&CatalogItem> {
        self.results.iter().filter(|r| r.is_collection()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: Url,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| CatalogError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(CatalogError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                config.base_url
            )));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .user_agent(format!("soundwave/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(CatalogError::Transport)?;

        Ok(Self { http, base_url })
    }

    /// Client against an explicit endpoint, default timeouts otherwise.
    pub fn with_base_url(base_url: &str) -> Result<Self, CatalogError> {
        Self::new(&CatalogConfig {
            base_url: base_url.to_string(),
            ..CatalogConfig::default()
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub async fn search(
        &self,
        term: &str,
        limit: u32,
        entity: Entity,
    ) -> Result<SearchResults, CatalogError> {
        self.execute(&SearchQuery::new(term, limit, entity)).await
    }

    /// Albums for `name`.  Callers narrow the set with
    /// [`SearchResults::collections`].
    pub async fn lookup_artist(&self, name: &str) -> Result<SearchResults, CatalogError> {
        self.execute(&SearchQuery::artist_albums(name)).await
    }

    pub async fn execute(&self, query: &SearchQuery) -> Result<SearchResults, CatalogError> {
        debug!(term = %query.term, limit = query.limit, entity = query.entity.as_str(), "catalog request");

        let response = self
            .http
            .get(self.base_url.clone())
            .query(&query.params())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!("catalog: transport error for {:?}: {}", query.term, e);
                CatalogError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("catalog: {:?} returned status {}", query.term, status);
            return Err(CatalogError::Remote {
                status: status.as_u16(),
            });
        }

        // The endpoint labels its JSON as text/javascript, so decode by hand
        let body = response.text().await.map_err(CatalogError::Transport)?;
        let results: SearchResults =
            serde_json::from_str(&body).map_err(|e| CatalogError::Decode(e.to_string()))?;

        info!(
            "catalog: {:?} -> {} results",
            query.term,
            results.result_count
        );
        Ok(results)
    }
}
