//! Low resolution track archive: a gzip compressed tar of GPX files.
//!
//! Entries are sorted by name, so the entry at position `n` belongs to track
//! number `n`. Every lookup is cross-checked against the manifest path.

use std::io::Read;
use std::time::Instant;

use flate2::read::GzDecoder;
use futures::future::{AbortRegistration, Abortable};
use log::{debug, info, warn};

use crate::surface::Fetch;
use crate::{MapError, Result};

/// A named file from the track archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// Decompress and unpack `compressed`, returning the regular files sorted by name.
pub fn extract_archive(compressed: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let decompress = |e: std::io::Error| MapError::Decompress(e.to_string());

    let mut archive = tar::Archive::new(GzDecoder::new(compressed));
    let mut entries = Vec::new();

    for entry in archive.entries().map_err(decompress)? {
        let mut entry = entry.map_err(decompress)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = {
            let path = entry.path().map_err(decompress)?;
            let name = path.to_string_lossy();
            name.strip_prefix("./").unwrap_or(&name[..]).to_string()
        };

        // header sizes are untrusted, the buffer grows with what is actually read
        let mut data = Vec::new();
        entry.read_to_end(&mut data).map_err(decompress)?;
        entries.push(ArchiveEntry { name, data });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// The archive entry of `track_number`, checked against its manifest path.
///
/// The entry name must be a suffix of `lowres_path`; anything else means the
/// archive and the manifest are out of sync.
///
/// ```
/// use track_map::{archive::entry_for_track, ArchiveEntry};
///
/// let entries = vec![ArchiveEntry { name: "track_00.gpx".into(), data: vec![] }];
/// assert!(entry_for_track(&entries, 0, "/tracks/track_00.gpx").is_ok());
/// assert!(entry_for_track(&entries, 0, "/tracks/track_01.gpx").is_err());
/// ```
pub fn entry_for_track<'a>(
    entries: &'a [ArchiveEntry],
    track_number: usize,
    lowres_path: &str,
) -> Result<&'a ArchiveEntry> {
    let entry = entries.get(track_number).ok_or(MapError::MissingArchiveEntry {
        track_number,
        entries: entries.len(),
    })?;

    if !lowres_path.ends_with(&entry.name) {
        warn!(
            "[Archive] track {} expects '{}' but entry is '{}'",
            track_number, lowres_path, entry.name
        );
        return Err(MapError::CorruptArchive {
            track_number,
            expected: lowres_path.to_string(),
            found: entry.name.clone(),
        });
    }

    Ok(entry)
}

/// Fetch and extract the archive at `url`.
///
/// Returns `None` if the load was aborted through the handle paired with
/// `registration`; no further processing happens after the abort.
pub async fn load_archive(
    fetcher: &dyn Fetch,
    url: &str,
    registration: AbortRegistration,
) -> Option<Result<Vec<ArchiveEntry>>> {
    let load = async {
        let start = Instant::now();
        info!("[Archive] Fetching {}", url);

        let compressed = fetcher.fetch(url).await?;
        let fetched = start.elapsed();

        let entries = extract_archive(&compressed)?;
        info!(
            "[Archive] {} entries from {:.1}KB (fetch={:?} total={:?})",
            entries.len(),
            compressed.len() as f64 / 1024.0,
            fetched,
            start.elapsed()
        );
        Ok::<_, MapError>(entries)
    };

    match Abortable::new(load, registration).await {
        Ok(result) => Some(result),
        Err(_) => {
            debug!("[Archive] Load of {} aborted", url);
            None
        }
    }
}
