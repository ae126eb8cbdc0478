use common::ParsedIdentity;

const SPACED_DELIMITER: &str = " - ";
const BARE_DELIMITER: &str = "-";

/// Splits a folder name such as `Radiohead - OK Computer` into artist and album.
///
/// The last spaced delimiter wins, then the last bare hyphen. A name with neither is
/// treated as self-titled and yields artist == album. A delimiter at the very start,
/// or one that leaves only whitespace before it, does not count: the artist is never empty.
pub fn parse_folder_name(folder_name: &str) -> ParsedIdentity {
    if let Some(identity) = split_at_last(folder_name, SPACED_DELIMITER) {
        return identity;
    }
    if let Some(identity) = split_at_last(folder_name, BARE_DELIMITER) {
        return identity;
    }
    let name = folder_name.trim();
    ParsedIdentity::new(name, name)
}

fn split_at_last(folder_name: &str, delimiter: &str) -> Option<ParsedIdentity> {
    let pos = folder_name.rfind(delimiter)?;
    if pos == 0 {
        return None;
    }
    let artist = folder_name[..pos].trim();
    if artist.is_empty() {
        return None;
    }
    let album = folder_name[pos + delimiter.len()..].trim();
    Some(ParsedIdentity::new(artist, album))
}
