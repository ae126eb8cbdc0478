use std::collections::HashMap;

use common::{classify_file, split_library_key, LibraryEntry, MediaKind};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use tracing::trace;

use crate::naming::parse_folder_name;

/// Artist -> album -> entry, kept in first-seen order.
#[derive(Clone, Debug, Default)]
pub struct LibraryIndex {
    artists: Vec<ArtistAlbums>,
    positions: HashMap<String, usize>,
}

#[derive(Clone, Debug)]
pub struct ArtistAlbums {
    name: String,
    albums: Vec<(String, LibraryEntry)>,
    positions: HashMap<String, usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct LibraryStats {
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
    pub images: usize,
}

/// Groups raw object keys into the library tree.
///
/// Keys that are not `albums/<folder>/<file>`, playlists, and files that are neither
/// tracks nor images are skipped.
pub fn index_objects<I, S>(keys: I) -> LibraryIndex
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut index = LibraryIndex::default();
    for key in keys {
        let key = key.as_ref();
        let Some((folder, file)) = split_library_key(key) else {
            trace!(key, "skipping key outside album layout");
            continue;
        };
        let Some(kind) = classify_file(file) else {
            trace!(key, "skipping unsupported file");
            continue;
        };
        let identity = parse_folder_name(folder);
        let entry = index.entry_mut(&identity.artist, &identity.album, folder);
        match kind {
            MediaKind::Track => entry.tracks.push(file.to_string()),
            MediaKind::Image => entry.images.push(file.to_string()),
        }
    }
    index
}

impl LibraryIndex {
    /// Returns the entry for (artist, album), creating it with `folder` as the
    /// original folder on first sight.
    pub fn entry_mut(&mut self, artist: &str, album: &str, folder: &str) -> &mut LibraryEntry {
        let pos = match self.positions.get(artist) {
            Some(pos) => *pos,
            None => {
                self.artists.push(ArtistAlbums {
                    name: artist.to_string(),
                    albums: Vec::new(),
                    positions: HashMap::new(),
                });
                let pos = self.artists.len() - 1;
                self.positions.insert(artist.to_string(), pos);
                pos
            }
        };
        self.artists[pos].entry_mut(album, folder)
    }

    pub fn get(&self, artist: &str, album: &str) -> Option<&LibraryEntry> {
        let pos = self.positions.get(artist)?;
        self.artists[*pos].get(album)
    }

    pub fn artists(&self) -> impl Iterator<Item = &ArtistAlbums> {
        self.artists.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
    }

    pub fn stats(&self) -> LibraryStats {
        let mut stats = LibraryStats {
            artists: self.artists.len(),
            ..LibraryStats::default()
        };
        for artist in &self.artists {
            stats.albums += artist.albums.len();
            for (_, entry) in &artist.albums {
                stats.tracks += entry.tracks.len();
                stats.images += entry.images.len();
            }
        }
        stats
    }
}

impl ArtistAlbums {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn albums(&self) -> impl Iterator<Item = (&str, &LibraryEntry)> {
        self.albums.iter().map(|(title, entry)| (title.as_str(), entry))
    }

    pub fn get(&self, album: &str) -> Option<&LibraryEntry> {
        let pos = self.positions.get(album)?;
        Some(&self.albums[*pos].1)
    }

    fn entry_mut(&mut self, album: &str, folder: &str) -> &mut LibraryEntry {
        let pos = match self.positions.get(album) {
            Some(pos) => *pos,
            None => {
                self.albums
                    .push((album.to_string(), LibraryEntry::new(folder)));
                let pos = self.albums.len() - 1;
                self.positions.insert(album.to_string(), pos);
                pos
            }
        };
        &mut self.albums[pos].1
    }
}

impl Serialize for LibraryIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.artists.len()))?;
        for artist in &self.artists {
            map.serialize_entry(&artist.name, artist)?;
        }
        map.end()
    }
}

impl Serialize for ArtistAlbums {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.albums.len()))?;
        for (title, entry) in &self.albums {
            map.serialize_entry(title, entry)?;
        }
        map.end()
    }
}
