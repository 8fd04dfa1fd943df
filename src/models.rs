use crate::ellipsis;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Valence/arousal pair, each nominally in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Emotion {
    pub valence: f64,
    pub arousal: f64,
}

impl Emotion {
    /// Stand-in sample used when no page text could be analyzed.
    pub const NEUTRAL: Emotion = Emotion {
        valence: 0.5,
        arousal: 0.5,
    };

    pub fn new(valence: f64, arousal: f64) -> Self {
        Self { valence, arousal }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ valence: {:.2}, arousal: {:.2} }}",
            self.valence, self.arousal
        )
    }
}

/// Body of `POST /murecom`: the pages around the reader's position.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGroup {
    #[serde(default, alias = "PrevPages", deserialize_with = "null_as_empty")]
    pub prev_pages: Vec<String>,
    #[serde(default, alias = "CurrentPages", deserialize_with = "null_as_empty")]
    pub current_pages: Vec<String>,
    #[serde(default, alias = "NextPages", deserialize_with = "null_as_empty")]
    pub next_pages: Vec<String>,
}

impl PageGroup {
    /// All page texts, prev -> current -> next, each group in its own order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.prev_pages
            .iter()
            .chain(&self.current_pages)
            .chain(&self.next_pages)
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.prev_pages.len() + self.current_pages.len() + self.next_pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short rendering for log lines; never prints whole pages.
    pub fn digest(&self) -> PagesDigest<'_> {
        PagesDigest(self)
    }
}

pub struct PagesDigest<'a>(&'a PageGroup);

impl fmt::Display for PagesDigest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: [(&str, &[String], fn(&str, usize) -> String); 3] = [
            ("prev", self.0.prev_pages.as_slice(), ellipsis::ending),
            ("curr", self.0.current_pages.as_slice(), ellipsis::centering),
            ("next", self.0.next_pages.as_slice(), ellipsis::starting),
        ];

        write!(f, "{{")?;
        for (index, (label, pages, shorten)) in groups.into_iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            write!(f, " {}: [", label)?;
            for (i, page) in pages.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", shorten(page.as_str(), 7))?;
            }
            write!(f, "]")?;
        }
        write!(f, " }}")
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A track as the music store's recommendation endpoint describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Artist", default)]
    pub artist: String,
    #[serde(rename = "Album", default)]
    pub album: String,
    #[serde(rename = "CoverImageURL", default)]
    pub cover_image_url: String,
    #[serde(rename = "AudioFileURL", default)]
    pub audio_file_url: String,
    #[serde(rename = "Emotion")]
    pub emotion: Emotion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Music {
    pub title: String,
    pub artist: String,
    pub cover_image: String,
    pub source_url: String,
    pub track_emotion: Emotion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub music: Music,
    pub text_emotion: Emotion,
}

#[derive(Serialize, Deserialize)]
pub struct HelloResponse {
    pub hello: String,
}
