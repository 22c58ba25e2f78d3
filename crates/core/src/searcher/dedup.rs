//! Deduplication of torrent search results by info_hash.

use std::collections::HashMap;

use super::quality::Quality;
use super::{RawTorrentResult, TorrentCandidate};

/// Normalize an info-hash to 40 lowercase hex characters.
///
/// Returns `None` for missing or malformed hashes.
pub fn normalize_info_hash(hash: &str) -> Option<String> {
    let hash = hash.trim();
    if hash.len() == 40 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hash.to_ascii_lowercase())
    } else {
        None
    }
}

/// Deduplicate raw torrent results by info_hash.
///
/// Results with the same info_hash are merged into a single `TorrentCandidate`:
/// the first-seen title, size and quality win, and later indexers are
/// appended to `sources`. Results without a valid info_hash are dropped.
///
/// The final list is sorted by quality, then size (both descending). Ties
/// keep discovery order.
pub fn deduplicate_results(raw: Vec<RawTorrentResult>) -> Vec<TorrentCandidate> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut results: Vec<TorrentCandidate> = Vec::new();

    for r in raw {
        let Some(hash) = r.info_hash.as_deref().and_then(normalize_info_hash) else {
            continue;
        };

        if let Some(&i) = index.get(&hash) {
            let existing = &mut results[i];
            if !existing.sources.contains(&r.indexer) {
                existing.sources.push(r.indexer);
            }
            continue;
        }

        index.insert(hash.clone(), results.len());
        results.push(TorrentCandidate {
            quality: Quality::detect(r.quality.as_deref(), &r.title),
            title: r.title,
            info_hash: hash,
            size_bytes: r.size_bytes,
            sources: vec![r.indexer],
        });
    }

    sort_candidates(&mut results);
    results
}

/// Order by (quality rank desc, size desc).
pub fn sort_candidates(candidates: &mut [TorrentCandidate]) {
    candidates.sort_by(|a, b| {
        b.quality
            .rank()
            .cmp(&a.quality.rank())
            .then(b.size_bytes.cmp(&a.size_bytes))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn hash(c: char) -> String {
        c.to_string().repeat(40)
    }

    fn make_raw(title: &str, indexer: &str, info_hash: Option<&str>, size: u64) -> RawTorrentResult {
        RawTorrentResult {
            title: title.to_string(),
            indexer: indexer.to_string(),
            info_hash: info_hash.map(|s| s.to_string()),
            quality: None,
            size_bytes: size,
        }
    }

    #[test]
    fn test_dedup_single_result() {
        let raw = vec![make_raw("Test 1080p", "yts", Some(&hash('a')), 10)];
        let results = deduplicate_results(raw);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Test 1080p");
        assert_eq!(results[0].quality, Quality::Fhd1080p);
        assert_eq!(results[0].sources, vec!["yts"]);
    }

    #[test]
    fn test_dedup_merges_same_hash() {
        let upper = hash('A');
        let lower = hash('a');
        let raw = vec![
            make_raw("Test A", "indexer1", Some(&upper), 100),
            make_raw("Test B", "indexer2", Some(&lower), 200),
            make_raw("Test C", "indexer3", Some(&upper), 300),
        ];
        let results = deduplicate_results(raw);

        assert_eq!(results.len(), 1);
        // First title and size are kept
        assert_eq!(results[0].title, "Test A");
        assert_eq!(results[0].size_bytes, 100);
        // Hash is normalized to lowercase
        assert_eq!(results[0].info_hash, lower);
        assert_eq!(results[0].sources, vec!["indexer1", "indexer2", "indexer3"]);
    }

    #[test]
    fn test_dedup_same_indexer_listed_once() {
        let raw = vec![
            make_raw("Test", "yts", Some(&hash('a')), 1),
            make_raw("Test", "yts", Some(&hash('a')), 1),
        ];
        let results = deduplicate_results(raw);
        assert_eq!(results[0].sources, vec!["yts"]);
    }

    #[test]
    fn test_dedup_drops_missing_or_malformed_hash() {
        let raw = vec![
            make_raw("Good", "indexer1", Some(&hash('b')), 10),
            make_raw("None", "indexer2", None, 20),
            make_raw("Empty", "indexer3", Some(""), 20),
            make_raw("Short", "indexer3", Some("abc123"), 20),
            make_raw("Not hex", "indexer3", Some(&hash('z')), 20),
        ];
        let results = deduplicate_results(raw);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Good");
    }

    #[test]
    fn test_dedup_sorts_by_quality_then_size() {
        let raw = vec![
            make_raw("Small 720p", "i", Some(&hash('1')), 500),
            make_raw("Big 1080p", "i", Some(&hash('2')), 2000),
            make_raw("No quality", "i", Some(&hash('3')), 9000),
            make_raw("Small 1080p", "i", Some(&hash('4')), 1000),
            make_raw("Movie 2160p", "i", Some(&hash('5')), 100),
        ];
        let titles: Vec<_> = deduplicate_results(raw)
            .into_iter()
            .map(|c| c.title)
            .collect();

        assert_eq!(
            titles,
            vec!["Movie 2160p", "Big 1080p", "Small 1080p", "Small 720p", "No quality"]
        );
    }

    #[test]
    fn test_dedup_uses_quality_label() {
        let mut raw = make_raw("The Matrix", "yts", Some(&hash('c')), 1);
        raw.quality = Some("720p".to_string());
        let results = deduplicate_results(vec![raw]);
        assert_eq!(results[0].quality, Quality::Hd720p);
    }

    #[test]
    fn test_dedup_hashes_are_unique() {
        let raw: Vec<_> = (0..50)
            .map(|i| {
                let c = std::char::from_digit(i % 7, 16).unwrap();
                make_raw(&format!("T{}", i), &format!("idx{}", i % 3), Some(&hash(c)), i as u64)
            })
            .collect();
        let results = deduplicate_results(raw);

        let unique: HashSet<_> = results.iter().map(|c| c.info_hash.clone()).collect();
        assert_eq!(unique.len(), results.len());
        assert_eq!(results.len(), 7);
    }

    #[test]
    fn test_normalize_info_hash() {
        assert_eq!(
            normalize_info_hash(&format!(" {} ", hash('F'))),
            Some(hash('f'))
        );
        assert_eq!(normalize_info_hash(""), None);
        assert_eq!(normalize_info_hash(&hash('g')), None);
    }
}
