//! Browse content built on the catalog: trending picks, genre listings and
//! the artist spotlight.

use futures_util::future::try_join_all;
use rand::seq::SliceRandom;
use tracing::info;

use crate::catalog::{CatalogClient, Entity, SearchResults};
use crate::error::CatalogError;
use crate::track::{TrackCard, TrackRef};

/// Albums shown in the spotlight discography strip.
pub const SPOTLIGHT_ALBUMS: usize = 8;
const SPOTLIGHT_ART_SIZE: u32 = 600;
const ALBUM_ART_SIZE: u32 = 200;

/// Pick `pick` distinct terms at random.
pub fn sample_terms(terms: &[String], pick: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    terms.choose_multiple(&mut rng, pick).cloned().collect()
}

/// Trending tracks: a few random preset terms searched concurrently, a
/// handful of songs each.  Any failed request fails the whole load; only
/// playable tracks are kept.
pub async fn trending(
    client: &CatalogClient,
    terms: &[String],
    pick: usize,
    per_term: u32,
) -> Result<Vec<TrackRef>, CatalogError> {
    let chosen = sample_terms(terms, pick);
    info!("trending: loading {:?}", chosen);
    let results = try_join_all(
        chosen
            .iter()
            .map(|term| client.search(term, per_term, Entity::Song)),
    )
    .await?;
    Ok(results.iter().flat_map(SearchResults::playable).collect())
}

pub async fn genre_tracks(
    client: &CatalogClient,
    genre: &str,
    limit: u32,
) -> Result<Vec<TrackCard>, CatalogError> {
    let results = client.search(genre, limit, Entity::Song).await?;
    Ok(results.cards())
}

/// Which genre tile is open.  Selecting the open genre again closes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenreSelection {
    active: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenreChange {
    /// A genre was opened; its tracks should be loaded.
    Opened(String),
    Closed,
}

impl GenreSelection {
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn toggle(&mut self, genre: &str) -> GenreChange {
        if self.active.as_deref() == Some(genre) {
            self.active = None;
            GenreChange::Closed
        } else {
            self.active = Some(genre.to_string());
            GenreChange::Opened(genre.to_string())
        }
    }

    pub fn close(&mut self) {
        self.active = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumCard {
    pub title: String,
    pub art: String,
}

/// Featured-artist panel contents.
#[derive(Debug, Clone, PartialEq)]
pub struct Spotlight {
    pub artist_name: String,
    pub genre: String,
    pub art: String,
    pub albums: Vec<AlbumCard>,
}

impl Spotlight {
    /// Shape a lookup response.  `None` when it holds no collections.
    pub fn from_results(results: &SearchResults, requested: &str) -> Option<Self> {
        let albums = results.collections();
        let first = albums.first()?;

        Some(Self {
            artist_name: first
                .artist_name
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| requested.to_string()),
            genre: first
                .primary_genre_name
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Music".to_string()),
            art: first.artwork(SPOTLIGHT_ART_SIZE),
            albums: albums
                .iter()
                .take(SPOTLIGHT_ALBUMS)
                .map(|a| AlbumCard {
                    title: a.collection_name.clone().unwrap_or_default(),
                    art: a.artwork(ALBUM_ART_SIZE),
                })
                .collect(),
        })
    }

    pub fn blurb(&self) -> String {
        format!(
            "Explore the discography of {}. From chart-topping hits to deep cuts, \
             discover the albums that defined a generation.",
            self.artist_name
        )
    }
}

pub async fn artist_spotlight(
    client: &CatalogClient,
    name: &str,
) -> Result<Option<Spotlight>, CatalogError> {
    let results = client.lookup_artist(name).await?;
    Ok(Spotlight::from_results(&results, name))
}
