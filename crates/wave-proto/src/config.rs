use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub discover: DiscoverConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub playlog: PlayLogConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Search endpoint of the catalog API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Page size for free-text searches.
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Preset content for the browse panes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverConfig {
    #[serde(default = "default_trending_terms")]
    pub trending_terms: Vec<String>,
    /// How many trending terms are sampled per load.
    #[serde(default = "default_trending_pick")]
    pub trending_pick: usize,
    #[serde(default = "default_trending_per_term")]
    pub trending_per_term: u32,
    #[serde(default = "default_featured_artist")]
    pub featured_artist: String,
    #[serde(default = "default_genres")]
    pub genres: Vec<String>,
    #[serde(default = "default_genre_limit")]
    pub genre_limit: u32,
    /// Quick-search chips shown under the search box.
    #[serde(default = "default_chips")]
    pub chips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_file")]
    pub file: PathBuf,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Days the history survives after its last write.
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_volume")]
    pub default_volume: f32,
}

/// Optional remote play-event log (Firebase Realtime Database REST layout).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayLogConfig {
    /// Root URL of the database, e.g. `https://example-default-rtdb.firebaseio.com`.
    /// Logging is disabled when unset.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Signed-in identity; plays are logged as a guest when absent.
    #[serde(default)]
    pub user: Option<UserConfig>,
    #[serde(default = "default_client_id_file")]
    pub client_id_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Quiet period before a typed query is sent.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            search_limit: default_search_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            trending_terms: default_trending_terms(),
            trending_pick: default_trending_pick(),
            trending_per_term: default_trending_per_term(),
            featured_artist: default_featured_artist(),
            genres: default_genres(),
            genre_limit: default_genre_limit(),
            chips: default_chips(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            file: default_history_file(),
            max_entries: default_max_entries(),
            retention_days: default_retention_days(),
        }
    }
}

impl HistoryConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(24 * 60 * 60))
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
        }
    }
}

impl Default for PlayLogConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            user: None,
            client_id_file: default_client_id_file(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl UiConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_base_url() -> String {
    "https://itunes.apple.com/search".to_string()
}

fn default_search_limit() -> u32 {
    24
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_trending_terms() -> Vec<String> {
    [
        "Arijit Singh",
        "AP Dhillon",
        "Diljit Dosanjh",
        "Shreya Ghoshal",
        "Pritam",
        "Badshah",
        "Neha Kakkar",
        "Jubin Nautiyal",
        "Honey Singh",
        "Atif Aslam",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_trending_pick() -> usize {
    5
}

fn default_trending_per_term() -> u32 {
    2
}

fn default_featured_artist() -> String {
    "A.R. Rahman".to_string()
}

fn default_genres() -> Vec<String> {
    [
        "pop",
        "hip hop",
        "rock",
        "electronic",
        "jazz",
        "classical",
        "bollywood",
        "r&b",
        "indie",
        "lofi",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_genre_limit() -> u32 {
    16
}

fn default_chips() -> Vec<String> {
    ["Lofi beats", "Arijit Singh", "Punjabi hits", "90s Bollywood", "Chill"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_history_file() -> PathBuf {
    platform::data_dir().join("history.json")
}

fn default_max_entries() -> usize {
    50
}

fn default_retention_days() -> u64 {
    90
}

fn default_volume() -> f32 {
    0.8
}

fn default_client_id_file() -> PathBuf {
    platform::data_dir().join("client_id")
}

fn default_debounce_ms() -> u64 {
    400
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.catalog.base_url.starts_with("https://"));
        assert_eq!(config.history.max_entries, 50);
        assert_eq!(config.history.retention(), Duration::from_secs(90 * 86_400));
        assert_eq!(config.ui.debounce(), Duration::from_millis(400));
        assert_eq!(config.discover.trending_pick, 5);
        assert!(config.playlog.database_url.is_none());
        assert!(config.history.file.ends_with("soundwave/history.json"));
    }

    #[test]
    fn test_huge_retention_saturates() {
        let config = Config::from_toml_str(
            r#"
            [history]
            retention_days = 9223372036854775807
            "#,
        )
        .unwrap();
        assert_eq!(config.history.retention(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
            [history]
            max_entries = 10

            [playlog]
            database_url = "https://db.example"

            [playlog.user]
            uid = "u1"
            "#,
        )
        .unwrap();
        assert_eq!(config.history.max_entries, 10);
        assert_eq!(config.history.retention_days, 90);
        assert_eq!(config.catalog.search_limit, 24);
        assert_eq!(config.playlog.user.unwrap().uid, "u1");
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back = Config::from_toml_str(&text).unwrap();
        assert_eq!(back.discover.genres, config.discover.genres);
        assert_eq!(back.ui.debounce_ms, config.ui.debounce_ms);
    }
}
