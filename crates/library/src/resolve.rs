use std::collections::HashSet;

use common::{storage_key, ALBUMS_PREFIX};
use tracing::debug;

use crate::mapping::FolderMapping;

/// A client-supplied retrieval key, split when it has the `Artist/Album/File` shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetrievalRequest {
    Structured {
        artist: String,
        album: String,
        file: String,
    },
    Verbatim(String),
}

impl RetrievalRequest {
    /// Splits `Artist/Album/File` into a structured request. A leading `/` is ignored.
    ///
    /// Everything else is verbatim, including two three-segment shapes: keys that
    /// already start with `albums/` (raw storage keys) and keys with an empty segment
    /// such as `Artist//File.mp3`.
    pub fn from_key(key: &str) -> Self {
        let key = key.trim_start_matches('/');
        if key.starts_with(&format!("{}/", ALBUMS_PREFIX)) {
            return RetrievalRequest::Verbatim(key.to_string());
        }
        let parts: Vec<&str> = key.split('/').collect();
        match parts.as_slice() {
            [artist, album, file] if !artist.is_empty() && !album.is_empty() && !file.is_empty() => {
                RetrievalRequest::Structured {
                    artist: artist.to_string(),
                    album: album.to_string(),
                    file: file.to_string(),
                }
            }
            _ => RetrievalRequest::Verbatim(key.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    CaseInsensitive,
    PartialAlbum,
    ArtistOnly,
    Constructed,
    Verbatim,
}

impl MatchTier {
    pub fn label(self) -> &'static str {
        match self {
            MatchTier::Exact => "exact",
            MatchTier::CaseInsensitive => "case_insensitive",
            MatchTier::PartialAlbum => "partial_album",
            MatchTier::ArtistOnly => "artist_only",
            MatchTier::Constructed => "constructed",
            MatchTier::Verbatim => "verbatim",
        }
    }
}

/// Ordered storage keys to try, most confident first. Never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub tier: MatchTier,
    pub candidates: Vec<String>,
}

/// Turns a retrieval request into candidate storage keys.
///
/// Mapping tiers are tried in order (exact, case-insensitive, partial album,
/// artist only) and the first tier with any match supplies its folders, in mapping
/// order. Constructed `Artist - Album` style keys always follow, so the list is
/// never empty even when the mapping knows nothing about the request.
///
/// The tiers are heuristics: an artist-only match can point at a different album's
/// file with the same name. The proxy stops at the first key that exists.
pub fn resolve_candidates(request: &RetrievalRequest, mapping: &FolderMapping) -> Resolution {
    let (artist, album, file) = match request {
        RetrievalRequest::Verbatim(key) => {
            let key = if key.starts_with(&format!("{}/", ALBUMS_PREFIX)) {
                key.clone()
            } else {
                format!("{}/{}", ALBUMS_PREFIX, key)
            };
            return Resolution {
                tier: MatchTier::Verbatim,
                candidates: vec![key],
            };
        }
        RetrievalRequest::Structured {
            artist,
            album,
            file,
        } => (artist.as_str(), album.as_str(), file.as_str()),
    };

    let mut candidates = CandidateList::default();
    let tier = match matched_folders(artist, album, mapping) {
        Some((tier, folders)) => {
            for folder in folders {
                candidates.push(storage_key(folder, file));
            }
            tier
        }
        None => MatchTier::Constructed,
    };
    for folder in constructed_folders(artist, album) {
        candidates.push(storage_key(&folder, file));
    }

    let candidates = candidates.into_vec();
    debug!(
        artist,
        album,
        tier = tier.label(),
        candidates = candidates.len(),
        "resolved retrieval request"
    );
    Resolution { tier, candidates }
}

fn matched_folders<'a>(
    artist: &str,
    album: &str,
    mapping: &'a FolderMapping,
) -> Option<(MatchTier, Vec<&'a str>)> {
    if let Some(folder) = mapping.get(artist, album) {
        return Some((MatchTier::Exact, vec![folder]));
    }

    let artist_lower = artist.to_lowercase();
    let album_lower = album.to_lowercase();

    let same_artist = |candidate: &str| candidate.to_lowercase() == artist_lower;

    let folders: Vec<&str> = mapping
        .iter()
        .filter(|(key, _)| same_artist(key.artist()) && key.album().to_lowercase() == album_lower)
        .map(|(_, folder)| folder)
        .collect();
    if !folders.is_empty() {
        return Some((MatchTier::CaseInsensitive, folders));
    }

    let folders: Vec<&str> = mapping
        .iter()
        .filter(|(key, _)| {
            if !same_artist(key.artist()) {
                return false;
            }
            let mapped = key.album().to_lowercase();
            !mapped.is_empty() && (mapped.contains(&album_lower) || album_lower.contains(&mapped))
        })
        .map(|(_, folder)| folder)
        .collect();
    if !folders.is_empty() {
        return Some((MatchTier::PartialAlbum, folders));
    }

    let folders: Vec<&str> = mapping
        .iter()
        .filter(|(key, folder)| {
            same_artist(key.artist()) || folder.to_lowercase().contains(&artist_lower)
        })
        .map(|(_, folder)| folder)
        .collect();
    if !folders.is_empty() {
        return Some((MatchTier::ArtistOnly, folders));
    }

    None
}

fn constructed_folders(artist: &str, album: &str) -> Vec<String> {
    let spaced = format!("{} - {}", artist, album);
    let bare = format!("{}-{}", artist, album);
    if artist == album {
        vec![artist.to_string(), spaced, bare]
    } else {
        vec![spaced, bare]
    }
}

#[derive(Default)]
struct CandidateList {
    keys: Vec<String>,
    seen: HashSet<String>,
}

impl CandidateList {
    fn push(&mut self, key: String) {
        if self.seen.insert(key.clone()) {
            self.keys.push(key);
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.keys
    }
}
