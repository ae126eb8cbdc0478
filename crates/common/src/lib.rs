use std::fmt;

use serde::{Deserialize, Serialize};

/// First segment of every library object key.
pub const ALBUMS_PREFIX: &str = "albums";

const KEY_SEP: char = '\x1f';

const TRACK_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "ogg"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const PLAYLIST_EXTENSIONS: &[&str] = &["m3u", "m3u8", "pls"];

/// Best-effort (artist, album) pair recovered from a folder name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedIdentity {
    pub artist: String,
    pub album: String,
}

impl ParsedIdentity {
    pub fn new(artist: impl Into<String>, album: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            album: album.into(),
        }
    }

    pub fn mapping_key(&self) -> MappingKey {
        MappingKey::new(&self.artist, &self.album)
    }
}

/// (artist, album) joined into a single comparable token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MappingKey(String);

impl MappingKey {
    pub fn new(artist: &str, album: &str) -> Self {
        let mut key = String::with_capacity(artist.len() + album.len() + 1);
        key.push_str(artist);
        key.push(KEY_SEP);
        key.push_str(album);
        Self(key)
    }

    pub fn artist(&self) -> &str {
        self.split().0
    }

    pub fn album(&self) -> &str {
        self.split().1
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split(&self) -> (&str, &str) {
        // Artist names never contain the separator, so the first one is the join point.
        match self.0.split_once(KEY_SEP) {
            Some(parts) => parts,
            None => (self.0.as_str(), ""),
        }
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.artist(), self.album())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    pub tracks: Vec<String>,
    pub images: Vec<String>,
    pub original_folder: String,
}

impl LibraryEntry {
    pub fn new(original_folder: impl Into<String>) -> Self {
        Self {
            tracks: Vec::new(),
            images: Vec::new(),
            original_folder: original_folder.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Track,
    Image,
}

/// Classifies a file name by extension. Playlists, extensionless names and unknown
/// extensions yield `None`.
pub fn classify_file(file_name: &str) -> Option<MediaKind> {
    let ext = file_extension(file_name)?.to_ascii_lowercase();
    let ext = ext.as_str();
    if PLAYLIST_EXTENSIONS.contains(&ext) {
        return None;
    }
    if TRACK_EXTENSIONS.contains(&ext) {
        Some(MediaKind::Track)
    } else if IMAGE_EXTENSIONS.contains(&ext) {
        Some(MediaKind::Image)
    } else {
        None
    }
}

pub fn file_extension(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// Builds `albums/<folder>/<file>`.
pub fn storage_key(folder: &str, file: &str) -> String {
    format!("{}/{}/{}", ALBUMS_PREFIX, folder, file)
}

/// Splits a raw object key into (folder, file) when it has the library shape.
pub fn split_library_key(key: &str) -> Option<(&str, &str)> {
    let mut parts = key.split('/');
    let prefix = parts.next()?;
    let folder = parts.next()?;
    let file = parts.next()?;
    if parts.next().is_some() || prefix != ALBUMS_PREFIX {
        return None;
    }
    if folder.is_empty() || file.is_empty() {
        return None;
    }
    Some((folder, file))
}
