//! WAV download naming and export

use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};

use crate::codec::{to_wav_container, RawAudioPayload, WavContainer};
use crate::constants::{DEFAULT_FILENAME_STEM, FILENAME_DATE_FORMAT, FILENAME_WORDS};
use crate::error::Result;

/// A named WAV file ready to be saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: String,
    pub container: WavContainer,
}

impl Download {
    /// Write the container into `dir`, creating it if needed
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, self.container.as_bytes())?;
        tracing::info!(
            path = %path.display(),
            bytes = self.container.len(),
            "Exported summary audio"
        );
        Ok(path)
    }
}

/// Build the download for `payload`, dated today in local time
pub fn download(payload: &RawAudioPayload, summary: &str) -> Result<Download> {
    download_on(payload, summary, Local::now().date_naive())
}

/// Build the download for `payload` with an explicit date
pub fn download_on(payload: &RawAudioPayload, summary: &str, date: NaiveDate) -> Result<Download> {
    Ok(Download {
        filename: download_filename(summary, date),
        container: to_wav_container(payload)?,
    })
}

/// `<slug>_<YYYY-DD-MM>.wav`
///
/// The slug is the first four words joined by `-`, restricted to
/// `[a-zA-Z0-9-]` and lowercased, or `summary` when nothing is left.
pub fn download_filename(summary: &str, date: NaiveDate) -> String {
    let slug: String = summary
        .split_whitespace()
        .take(FILENAME_WORDS)
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_lowercase();

    let stem = if slug.is_empty() {
        DEFAULT_FILENAME_STEM
    } else {
        slug.as_str()
    };
    format!("{}_{}.wav", stem, date.format(FILENAME_DATE_FORMAT))
}
