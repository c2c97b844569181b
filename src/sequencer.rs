//! Derives page order from image file names.
//!
//! Pages are named `<collection_id>_<digits>.<ext>`; the digits are the
//! reading-order position. `<collection_id>.pdf` is the album's full-document
//! rendition and takes no part in the sequence.

use crate::error::{AlbumError, Result};
use crate::types::{PageDescriptor, RenditionAsset, SequencedAssets};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub fn sequence_pages<I, S>(collection_id: &str, file_names: I) -> Result<SequencedAssets>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let suffix = Regex::new(r"^(\d+)\.([A-Za-z0-9]+)$").expect("static regex");
    let page_prefix = format!("{}_", collection_id);
    let expected = format!("'{}<digits>.<ext>' or '{}.pdf'", page_prefix, collection_id);

    let mut pages = Vec::new();
    let mut rendition: Option<RenditionAsset> = None;
    for name in file_names {
        let name = name.as_ref();
        if is_rendition(collection_id, name) {
            if let Some(first) = &rendition {
                return Err(AlbumError::MalformedName {
                    name: name.to_string(),
                    expected: format!(
                        "a single rendition, but '{}' is already present",
                        first.file_name()
                    ),
                });
            }
            rendition = Some(RenditionAsset {
                source_file: PathBuf::from(name),
                collection_id: collection_id.to_string(),
            });
            continue;
        }
        let malformed = || AlbumError::MalformedName {
            name: name.to_string(),
            expected: expected.clone(),
        };
        let rest = name.strip_prefix(&page_prefix).ok_or_else(malformed)?;
        let digits = suffix
            .captures(rest)
            .and_then(|c| c.get(1))
            .ok_or_else(malformed)?
            .as_str();
        // leading zeros do not change the position
        let sequence_number: u32 = digits.parse().map_err(|_| malformed())?;
        pages.push(PageDescriptor {
            source_file: PathBuf::from(name),
            sequence_number,
            collection_id: collection_id.to_string(),
        });
    }

    check_contiguous(collection_id, &pages)?;
    pages.sort_by_key(|p| p.sequence_number);
    Ok(SequencedAssets { pages, rendition })
}

fn is_rendition(collection_id: &str, name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(stem, ext)| stem == collection_id && ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Positions must be exactly 1..=N for N pages.
fn check_contiguous(collection_id: &str, pages: &[PageDescriptor]) -> Result<()> {
    let count = pages.len();
    let mut seen: BTreeMap<u32, usize> = BTreeMap::new();
    for page in pages {
        *seen.entry(page.sequence_number).or_default() += 1;
    }
    let duplicated: Vec<u32> = seen.iter().filter(|(_, n)| **n > 1).map(|(s, _)| *s).collect();
    let missing: Vec<u32> = (1..=count as u32).filter(|s| !seen.contains_key(s)).collect();
    let out_of_range = seen.keys().any(|s| *s == 0 || *s as usize > count);

    if duplicated.is_empty() && missing.is_empty() && !out_of_range {
        return Ok(());
    }
    Err(AlbumError::SequenceGap {
        collection_id: collection_id.to_string(),
        expected_count: count,
        missing,
        duplicated,
    })
}
