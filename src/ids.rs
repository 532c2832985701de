// External ID scheme. Every ID that crosses the wire carries a type
// prefix; movies and shows are the historical exception and stay bare.
// The prefix alone decides which handler branch an ID takes, so the
// matching order below is part of the contract: the favorites and
// playlist view prefixes extend "collection_" and must be tested first.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

pub const ROOT: &str = "root_";
pub const COLLECTION: &str = "collection_";
pub const COLLECTION_FAVORITES: &str = "collectionfavorites_";
pub const COLLECTION_PLAYLIST: &str = "collectionplaylist_";
pub const SEASON: &str = "season_";
pub const EPISODE: &str = "episode_";
pub const PLAYLIST: &str = "playlist_";
pub const GENRE: &str = "genre_";
pub const STUDIO: &str = "studio_";
pub const PERSON: &str = "person_";
pub const DISPLAY_PREFS: &str = "dp_";

/// Image-tag sentinel: `redirect_<url>` means "302 to this URL".
pub const REDIRECT: &str = "redirect_";

/// What an external ID resolves to, decided purely by its prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalId {
    Root(String),
    /// Favorites virtual view; payload is the collection-style suffix.
    FavoritesView(String),
    /// Playlists virtual view.
    PlaylistView(String),
    Collection(String),
    Season(String),
    Episode(String),
    Playlist(String),
    Genre(String),
    Studio(String),
    Person(String),
    DisplayPrefs(String),
    /// Bare ID: a movie or a show (backward compatible, no prefix).
    Media(String),
}

/// Classify an ID by prefix. Total: anything unrecognized is `Media`.
pub fn classify(id: &str) -> ExternalId {
    // Order matters: collectionfavorites_/collectionplaylist_ share the
    // collection_ prefix start only lexically, but keep them first so a
    // future prefix rename cannot silently break the dispatch.
    if let Some(rest) = id.strip_prefix(COLLECTION_FAVORITES) {
        ExternalId::FavoritesView(rest.to_string())
    } else if let Some(rest) = id.strip_prefix(COLLECTION_PLAYLIST) {
        ExternalId::PlaylistView(rest.to_string())
    } else if let Some(rest) = id.strip_prefix(COLLECTION) {
        ExternalId::Collection(rest.to_string())
    } else if let Some(rest) = id.strip_prefix(ROOT) {
        ExternalId::Root(rest.to_string())
    } else if let Some(rest) = id.strip_prefix(SEASON) {
        ExternalId::Season(rest.to_string())
    } else if let Some(rest) = id.strip_prefix(EPISODE) {
        ExternalId::Episode(rest.to_string())
    } else if let Some(rest) = id.strip_prefix(PLAYLIST) {
        ExternalId::Playlist(rest.to_string())
    } else if let Some(rest) = id.strip_prefix(GENRE) {
        ExternalId::Genre(rest.to_string())
    } else if let Some(rest) = id.strip_prefix(STUDIO) {
        ExternalId::Studio(rest.to_string())
    } else if let Some(rest) = id.strip_prefix(PERSON) {
        ExternalId::Person(rest.to_string())
    } else if let Some(rest) = id.strip_prefix(DISPLAY_PREFS) {
        ExternalId::DisplayPrefs(rest.to_string())
    } else {
        ExternalId::Media(id.to_string())
    }
}

pub fn root_id(server_id: &str) -> String {
    format!("{ROOT}{server_id}")
}

pub fn collection_id(id: &str) -> String {
    format!("{COLLECTION}{id}")
}

pub fn favorites_view_id(server_id: &str) -> String {
    format!("{COLLECTION_FAVORITES}{server_id}")
}

pub fn playlist_view_id(server_id: &str) -> String {
    format!("{COLLECTION_PLAYLIST}{server_id}")
}

pub fn season_id(id: &str) -> String {
    format!("{SEASON}{id}")
}

pub fn episode_id(id: &str) -> String {
    format!("{EPISODE}{id}")
}

pub fn playlist_id(id: &str) -> String {
    format!("{PLAYLIST}{id}")
}

/// Encode a display name into a reversible, URL-safe ID.
pub fn genre_id(name: &str) -> String {
    format!("{GENRE}{}", URL_SAFE_NO_PAD.encode(name.as_bytes()))
}

pub fn studio_id(name: &str) -> String {
    format!("{STUDIO}{}", URL_SAFE_NO_PAD.encode(name.as_bytes()))
}

pub fn person_id(name: &str) -> String {
    format!("{PERSON}{}", URL_SAFE_NO_PAD.encode(name.as_bytes()))
}

/// Recover the name from a genre/studio/person ID produced above.
/// The prefix must already be stripped by `classify`.
pub fn decode_name(encoded: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded.as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}

/// Redirect sentinel helpers for image tags.
pub fn redirect_tag(url: &str) -> String {
    format!("{REDIRECT}{url}")
}

pub fn redirect_url(tag: &str) -> Option<&str> {
    tag.strip_prefix(REDIRECT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn favorites_and_playlist_views_win_over_collection() {
        assert_eq!(
            classify("collectionfavorites_srv"),
            ExternalId::FavoritesView("srv".into())
        );
        assert_eq!(
            classify("collectionplaylist_srv"),
            ExternalId::PlaylistView("srv".into())
        );
        assert_eq!(classify("collection_abc"), ExternalId::Collection("abc".into()));
    }

    #[test]
    fn bare_ids_are_media() {
        assert_eq!(classify("deadbeef"), ExternalId::Media("deadbeef".into()));
    }

    #[test]
    fn name_ids_round_trip() {
        for name in ["Science Fiction", "Warner Bros.", "Amélie Poulain", ""] {
            let id = genre_id(name);
            let ExternalId::Genre(raw) = classify(&id) else {
                panic!("expected genre id");
            };
            assert_eq!(decode_name(&raw).as_deref(), Some(name));
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(decode_name("!!!not-base64!!!"), None);
    }

    #[test]
    fn redirect_sentinel() {
        let tag = redirect_tag("https://example.com/p.jpg");
        assert_eq!(redirect_url(&tag), Some("https://example.com/p.jpg"));
        assert_eq!(redirect_url("plaintag"), None);
    }

    #[test]
    fn every_prefix_classifies_to_its_own_branch() {
        let cases = [
            ("root_x", ExternalId::Root("x".into())),
            ("season_x", ExternalId::Season("x".into())),
            ("episode_x", ExternalId::Episode("x".into())),
            ("playlist_x", ExternalId::Playlist("x".into())),
            ("genre_x", ExternalId::Genre("x".into())),
            ("studio_x", ExternalId::Studio("x".into())),
            ("person_x", ExternalId::Person("x".into())),
            ("dp_x", ExternalId::DisplayPrefs("x".into())),
        ];
        for (id, want) in cases {
            assert_eq!(classify(id), want);
        }
    }
}
