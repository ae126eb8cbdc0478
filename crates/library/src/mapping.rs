use std::collections::HashMap;

use common::{split_library_key, MappingKey};
use tracing::debug;

use crate::naming::parse_folder_name;

/// (artist, album) -> original folder name.
///
/// Only the first folder seen for a key is kept; later folders that parse to the
/// same pair are dropped. Iteration follows insertion order.
#[derive(Clone, Debug, Default)]
pub struct FolderMapping {
    entries: Vec<(MappingKey, String)>,
    positions: HashMap<MappingKey, usize>,
}

impl FolderMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the folder segment of every `albums/<folder>/<file>` key.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mapping = Self::new();
        for key in keys {
            if let Some((folder, _)) = split_library_key(key.as_ref()) {
                mapping.insert_folder(folder);
            }
        }
        mapping
    }

    /// Records `folder` under its parsed identity. Returns false when the key was
    /// already taken by an earlier folder.
    pub fn insert_folder(&mut self, folder: &str) -> bool {
        let key = parse_folder_name(folder).mapping_key();
        self.insert(key, folder)
    }

    pub fn insert(&mut self, key: MappingKey, folder: &str) -> bool {
        if let Some(pos) = self.positions.get(&key) {
            let existing = &self.entries[*pos].1;
            if existing != folder {
                debug!(key = %key, kept = %existing, dropped = folder, "folder mapping collision");
            }
            return false;
        }
        self.positions.insert(key.clone(), self.entries.len());
        self.entries.push((key, folder.to_string()));
        true
    }

    pub fn get(&self, artist: &str, album: &str) -> Option<&str> {
        self.get_key(&MappingKey::new(artist, album))
    }

    pub fn get_key(&self, key: &MappingKey) -> Option<&str> {
        let pos = self.positions.get(key)?;
        Some(self.entries[*pos].1.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MappingKey, &str)> {
        self.entries.iter().map(|(key, folder)| (key, folder.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::FolderMapping;

    #[test]
    fn first_seen_folder_wins_on_collision() {
        let mapping = FolderMapping::from_keys([
            "albums/Daft Punk - Discovery/01.mp3",
            "albums/Daft Punk-Discovery/01.mp3",
            "albums/Daft Punk - Discovery/02.mp3",
        ]);
        assert_eq!(mapping.len(), 1);
        assert_eq!(
            mapping.get("Daft Punk", "Discovery"),
            Some("Daft Punk - Discovery")
        );
    }

    #[test]
    fn insert_reports_whether_key_was_new() {
        let mut mapping = FolderMapping::new();
        assert!(mapping.insert_folder("Boston"));
        assert!(!mapping.insert_folder("  Boston  "));
        assert_eq!(mapping.get("Boston", "Boston"), Some("Boston"));
    }

    #[test]
    fn ignores_keys_outside_album_layout() {
        let mapping = FolderMapping::from_keys(["albums/Boston", "misc/A - B/c.mp3", "albums/A - B/c/d.mp3"]);
        assert!(mapping.is_empty());
    }

    #[test]
    fn iterates_in_insertion_order() {
        let mapping = FolderMapping::from_keys([
            "albums/Yes - Fragile/01.mp3",
            "albums/Air - Moon Safari/01.mp3",
        ]);
        let folders: Vec<&str> = mapping.iter().map(|(_, folder)| folder).collect();
        assert_eq!(folders, vec!["Yes - Fragile", "Air - Moon Safari"]);
        let (key, _) = mapping.iter().next().unwrap();
        assert_eq!(key.artist(), "Yes");
        assert_eq!(key.album(), "Fragile");
    }
}
