//! Records of the external history store
//!
//! The store itself (ordering, eviction, persistence) lives outside this
//! crate. The session only reads the summary and payload back out.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::TITLE_WORDS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub title: String,
    pub summary: String,
    /// Base64 PCM exactly as the speech provider returned it
    pub base64_audio: String,
}

impl HistoryItem {
    /// Record a finished generation. The id is the creation timestamp and
    /// the title is the first words of the summary.
    pub fn new(
        summary: impl Into<String>,
        base64_audio: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        let summary = summary.into();
        let title = format!(
            "{}...",
            summary.split(' ').take(TITLE_WORDS).collect::<Vec<_>>().join(" ")
        );
        Self {
            id: created.to_rfc3339_opts(SecondsFormat::Millis, true),
            title,
            summary,
            base64_audio: base64_audio.into(),
        }
    }
}
