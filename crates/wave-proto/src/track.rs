//! Track model: raw catalog results and the immutable `TrackRef` built from them.

use serde::{Deserialize, Serialize};

use crate::error::PlaybackError;

/// Artwork size used for track cards and the now-playing bar.
pub const CARD_ART_SIZE: u32 = 300;

/// One object from the catalog's `results` array.  Every field is optional;
/// the catalog omits whatever does not apply to the entry's wrapper type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub wrapper_type: Option<String>,
    pub track_id: Option<u64>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    #[serde(rename = "artworkUrl100")]
    pub artwork_url_100: Option<String>,
    pub preview_url: Option<String>,
    pub track_time_millis: Option<u64>,
    pub track_price: Option<f64>,
    pub collection_id: Option<u64>,
    pub collection_name: Option<String>,
    pub collection_type: Option<String>,
    pub primary_genre_name: Option<String>,
}

impl CatalogItem {
    /// True for album-like entries returned by an artist lookup.
    pub fn is_collection(&self) -> bool {
        self.wrapper_type.as_deref() == Some("collection")
            || self.collection_type.as_deref() == Some("Album")
    }

    /// Artwork URL resized to `size`x`size`, or empty when the item has none.
    pub fn artwork(&self, size: u32) -> String {
        self.artwork_url_100
            .as_deref()
            .map(|url| artwork_at(url, size))
            .unwrap_or_default()
    }
}

/// Rewrite the catalog's 100x100 artwork URL to another square size.
pub fn artwork_at(url: &str, size: u32) -> String {
    url.replace("100x100", &format!("{size}x{size}"))
}

/// The unit that is listed, played and stored in the history.
///
/// Built once from a catalog result and never mutated afterwards; fields are
/// only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    id: String,
    title: String,
    artist: String,
    #[serde(default)]
    art: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_blank"
    )]
    preview: Option<String>,
}

/// Blank preview URLs read back as absent, same as in `TrackRef::new`.
fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|p| !p.trim().is_empty()))
}

impl TrackRef {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        art: impl Into<String>,
        preview: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            art: art.into(),
            preview: preview.filter(|p| !p.trim().is_empty()),
        }
    }

    /// Build from a catalog result.  Entries without a `trackId` (albums,
    /// artists) are not tracks and yield `None`.
    pub fn from_catalog(item: &CatalogItem) -> Option<Self> {
        let id = item.track_id?;
        Some(Self::new(
            id.to_string(),
            item.track_name.clone().unwrap_or_default(),
            item.artist_name.clone().unwrap_or_default(),
            item.artwork(CARD_ART_SIZE),
            item.preview_url.clone(),
        ))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn art(&self) -> &str {
        &self.art
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    pub fn is_playable(&self) -> bool {
        self.preview.is_some()
    }

    /// The preview URL, or `NotPlayable` when the catalog gave none.
    pub fn playable_url(&self) -> Result<&str, PlaybackError> {
        self.preview
            .as_deref()
            .ok_or_else(|| PlaybackError::NotPlayable(self.id.clone()))
    }

    /// "Artist – Title" for single-line displays.
    pub fn display(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} \u{2013} {}", self.artist, self.title)
        }
    }
}

/// A track as listed in a result pane: the playable reference plus the
/// catalog extras shown on the card.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackCard {
    pub track: TrackRef,
    pub duration_ms: Option<u64>,
    pub price: Option<f64>,
    pub genre: Option<String>,
}

impl TrackCard {
    pub fn from_catalog(item: &CatalogItem) -> Option<Self> {
        Some(Self {
            track: TrackRef::from_catalog(item)?,
            duration_ms: item.track_time_millis,
            price: item.track_price,
            genre: item.primary_genre_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> CatalogItem {
        serde_json::from_value(serde_json::json!({
            "wrapperType": "track",
            "trackId": 1440833098,
            "trackName": "Kesariya",
            "artistName": "Pritam",
            "artworkUrl100": "https://is1.mzstatic.com/image/thumb/x/100x100bb.jpg",
            "previewUrl": "https://audio.example/preview.m4a",
            "trackTimeMillis": 268000,
            "trackPrice": 1.29,
            "primaryGenreName": "Bollywood",
            "somethingElse": true
        }))
        .unwrap()
    }

    #[test]
    fn test_catalog_item_decodes_known_fields() {
        let it = item();
        assert_eq!(it.track_id, Some(1440833098));
        assert_eq!(it.track_time_millis, Some(268000));
        assert!(!it.is_collection());
    }

    #[test]
    fn test_track_ref_from_catalog() {
        let t = TrackRef::from_catalog(&item()).unwrap();
        assert_eq!(t.id(), "1440833098");
        assert_eq!(t.title(), "Kesariya");
        assert_eq!(t.art(), "https://is1.mzstatic.com/image/thumb/x/300x300bb.jpg");
        assert!(t.is_playable());
        assert_eq!(t.display(), "Pritam \u{2013} Kesariya");
    }

    #[test]
    fn test_missing_track_id_is_not_a_track() {
        let mut it = item();
        it.track_id = None;
        assert!(TrackRef::from_catalog(&it).is_none());
    }

    #[test]
    fn test_blank_preview_is_not_playable() {
        let t = TrackRef::new("1", "t", "a", "", Some("  ".into()));
        assert!(!t.is_playable());
        assert!(matches!(t.playable_url(), Err(PlaybackError::NotPlayable(id)) if id == "1"));
    }

    #[test]
    fn test_stored_blank_preview_is_not_playable() {
        let t: TrackRef = serde_json::from_str(
            r#"{"id":"7","title":"t","artist":"a","art":"","preview":" "}"#,
        )
        .unwrap();
        assert!(!t.is_playable());
        assert_eq!(t, TrackRef::new("7", "t", "a", "", None));

        let t: TrackRef =
            serde_json::from_str(r#"{"id":"8","title":"t","artist":"a","preview":null}"#).unwrap();
        assert_eq!(t.preview(), None);
    }

    #[test]
    fn test_collection_detection() {
        let album = CatalogItem {
            wrapper_type: Some("collection".into()),
            ..Default::default()
        };
        let typed = CatalogItem {
            collection_type: Some("Album".into()),
            ..Default::default()
        };
        assert!(album.is_collection());
        assert!(typed.is_collection());
        assert!(!CatalogItem::default().is_collection());
    }
}
