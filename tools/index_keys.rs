use std::env;
use std::fs;
use std::io::{self, Read};

use library::{index_objects, FolderMapping};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Reads raw object keys, one per line, from a file argument or stdin and prints the
/// album index followed by the folder mapping.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let input = match env::args().nth(1) {
        Some(path) if path != "-" => fs::read_to_string(&path)?,
        _ => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    let keys: Vec<&str> = input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let index = index_objects(keys.iter().copied());
    let stats = index.stats();
    info!(
        "Indexed {} keys: {} artists, {} albums, {} tracks, {} images",
        keys.len(),
        stats.artists,
        stats.albums,
        stats.tracks,
        stats.images
    );
    println!("{}", serde_json::to_string_pretty(&index)?);

    let mapping = FolderMapping::from_keys(keys);
    println!();
    for (key, folder) in mapping.iter() {
        println!("{}\t{}", key, folder);
    }
    Ok(())
}
