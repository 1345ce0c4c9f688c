//! Subset of the search result objects the CLI renders.
//!
//! Unknown fields are ignored so provider additions never break decoding.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Body of `GET /search`. Only the requested kinds are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub albums: Option<Page<AlbumObject>>,
    #[serde(default)]
    pub artists: Option<Page<ArtistObject>>,
    #[serde(default)]
    pub tracks: Option<Page<TrackObject>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub album_type: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub total_tracks: Option<u32>,
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    #[serde(default)]
    pub album: Option<AlbumObject>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub uri: Option<String>,
}

fn artist_names(artists: &[ArtistObject]) -> String {
    artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for ArtistObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}", self.id, self.name)
    }
}

impl fmt::Display for AlbumObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {} - {}", self.id, artist_names(&self.artists), self.name)?;
        if let Some(date) = &self.release_date {
            let year = date.split('-').next().unwrap_or(date);
            write!(f, " ({year})")?;
        }
        Ok(())
    }
}

impl fmt::Display for TrackObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.duration_ms / 1000;
        write!(
            f,
            "{}  {} - {} [{}:{:02}]",
            self.id,
            artist_names(&self.artists),
            self.name,
            secs / 60,
            secs % 60
        )
    }
}

impl SearchResponse {
    /// One display line per item, albums then artists then tracks.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(page) = &self.albums {
            lines.extend(page.items.iter().map(ToString::to_string));
        }
        if let Some(page) = &self.artists {
            lines.extend(page.items.iter().map(ToString::to_string));
        }
        if let Some(page) = &self.tracks {
            lines.extend(page.items.iter().map(ToString::to_string));
        }
        lines
    }
}
