use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static QUALITY_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[^a-z0-9])(2160p|4k|uhd|1080p|720p|480p)(?:[^a-z0-9]|$)").unwrap());

/// Video resolution class of a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "2160p")]
    Uhd2160p,
    #[serde(rename = "1080p")]
    Fhd1080p,
    #[serde(rename = "720p")]
    Hd720p,
    #[serde(rename = "480p")]
    Sd480p,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl Quality {
    /// Parse from a quality label ("1080p", "2160p", "4K") or a release title.
    pub fn from_str_loose(s: &str) -> Self {
        let Some(caps) = QUALITY_TAG.captures(s) else {
            return Quality::Unknown;
        };
        match caps[1].to_ascii_lowercase().as_str() {
            "2160p" | "4k" | "uhd" => Quality::Uhd2160p,
            "1080p" => Quality::Fhd1080p,
            "720p" => Quality::Hd720p,
            "480p" => Quality::Sd480p,
            _ => Quality::Unknown,
        }
    }

    /// Label first, title as fallback.
    pub fn detect(label: Option<&str>, title: &str) -> Self {
        match label.map(Quality::from_str_loose) {
            Some(q) if q != Quality::Unknown => q,
            _ => Quality::from_str_loose(title),
        }
    }

    /// Ranking for sorting (higher = better).
    pub fn rank(&self) -> u8 {
        match self {
            Quality::Uhd2160p => 4,
            Quality::Fhd1080p => 3,
            Quality::Hd720p => 2,
            Quality::Sd480p => 1,
            Quality::Unknown => 0,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Quality::Uhd2160p => "2160p",
            Quality::Fhd1080p => "1080p",
            Quality::Hd720p => "720p",
            Quality::Sd480p => "480p",
            Quality::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
