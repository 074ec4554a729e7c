//! Catalog client and discovery helpers against a mock catalog.

use serde_json::{json, Value};
use wave_proto::catalog::{CatalogClient, Entity};
use wave_proto::discover::{artist_spotlight, genre_tracks, trending};
use wave_proto::error::CatalogError;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn song(id: u64, preview: bool) -> Value {
    let mut v = json!({
        "wrapperType": "track",
        "trackId": id,
        "trackName": format!("Song {id}"),
        "artistName": "Artist",
        "artworkUrl100": format!("https://art.example/{id}/100x100bb.jpg"),
        "trackTimeMillis": 215_000,
        "trackPrice": 1.29,
        "primaryGenreName": "Pop"
    });
    if preview {
        v["previewUrl"] = json!(format!("https://audio.example/{id}.m4a"));
    }
    v
}

fn body(results: Vec<Value>) -> Value {
    json!({ "resultCount": results.len(), "results": results })
}

async fn client_for(server: &MockServer) -> CatalogClient {
    CatalogClient::with_base_url(&format!("{}/search", server.uri())).unwrap()
}

// =============================================================================
// Search
// =============================================================================

mod search {
    use super::*;

    #[tokio::test]
    async fn test_sends_expected_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("term", "arijit singh"))
            .and(query_param("limit", "24"))
            .and(query_param("entity", "song"))
            .and(query_param("media", "music"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(vec![song(1, true), song(2, false)])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let results = client.search("arijit singh", 24, Entity::Song).await.unwrap();

        assert_eq!(results.result_count, 2);
        let cards = results.cards();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].track.title(), "Song 1");
        assert_eq!(cards[0].track.art(), "https://art.example/1/300x300bb.jpg");
        assert_eq!(cards[0].duration_ms, Some(215_000));
        assert!(!cards[1].track.is_playable());
    }

    #[tokio::test]
    async fn test_zero_results_is_empty_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "resultCount": 0, "results": [] })))
            .mount(&server)
            .await;

        let results = client_for(&server)
            .await
            .search("zzzzqqq", 24, Entity::Song)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_maps_to_remote() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .search("x", 24, Entity::Song)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Remote { status: 503 }));
    }

    #[tokio::test]
    async fn test_garbage_body_maps_to_decode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .search("x", 24, Entity::Song)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Decode(_)));
    }

    #[tokio::test]
    async fn test_refused_connection_maps_to_transport() {
        let client = CatalogClient::with_base_url("http://127.0.0.1:1/search").unwrap();
        let err = client.search("x", 24, Entity::Song).await.unwrap_err();
        assert!(matches!(err, CatalogError::Transport(_)));
    }
}

// =============================================================================
// Discovery
// =============================================================================

mod discovery {
    use super::*;

    #[tokio::test]
    async fn test_trending_keeps_playable_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("limit", "2"))
            .respond_with(|req: &Request| {
                // one playable and one silent track per term
                let term = req
                    .url
                    .query_pairs()
                    .find(|(k, _)| k == "term")
                    .map(|(_, v)| v.len() as u64)
                    .unwrap_or(0);
                ResponseTemplate::new(200).set_body_json(body(vec![song(term * 10, true), song(term * 10 + 1, false)]))
            })
            .expect(3)
            .mount(&server)
            .await;

        let terms: Vec<String> = ["a", "bb", "ccc"].iter().map(|s| s.to_string()).collect();
        let tracks = trending(&client_for(&server).await, &terms, 3, 2).await.unwrap();

        assert_eq!(tracks.len(), 3);
        assert!(tracks.iter().all(|t| t.is_playable()));
    }

    #[tokio::test]
    async fn test_trending_fails_when_any_request_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("term", "bad"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(vec![song(1, true)])))
            .mount(&server)
            .await;

        let terms = vec!["good".to_string(), "bad".to_string()];
        let err = trending(&client_for(&server).await, &terms, 2, 2).await.unwrap_err();
        assert!(matches!(err, CatalogError::Remote { status: 500 }));
    }

    #[tokio::test]
    async fn test_genre_tracks_uses_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("term", "jazz"))
            .and(query_param("limit", "16"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(vec![song(5, true)])))
            .expect(1)
            .mount(&server)
            .await;

        let cards = genre_tracks(&client_for(&server).await, "jazz", 16).await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].track.id(), "5");
    }

    #[tokio::test]
    async fn test_spotlight_lookup_filters_collections() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("entity", "album"))
            .and(query_param("limit", "12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(vec![
                json!({ "wrapperType": "artist", "artistName": "A. R. Rahman" }),
                json!({
                    "wrapperType": "collection",
                    "collectionType": "Album",
                    "collectionName": "Roja",
                    "artistName": "A. R. Rahman",
                    "primaryGenreName": "Soundtrack",
                    "artworkUrl100": "https://art.example/roja/100x100bb.jpg"
                }),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let spotlight = artist_spotlight(&client_for(&server).await, "A.R. Rahman")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(spotlight.artist_name, "A. R. Rahman");
        assert_eq!(spotlight.albums.len(), 1);
        assert_eq!(spotlight.albums[0].title, "Roja");
        assert_eq!(spotlight.art, "https://art.example/roja/600x600bb.jpg");

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].url.query_pairs().all(|(k, _)| k != "media"));
    }

    #[tokio::test]
    async fn test_spotlight_none_without_albums() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(vec![song(1, true)])))
            .mount(&server)
            .await;

        let spotlight = artist_spotlight(&client_for(&server).await, "Nobody").await.unwrap();
        assert!(spotlight.is_none());
    }
}
