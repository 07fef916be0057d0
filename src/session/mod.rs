//! Session orchestration: payload hand-off, auto-play and downloads

pub mod download;
pub mod history;
pub mod orchestrator;

pub use download::{download, download_filename, download_on, Download};
pub use history::HistoryItem;
pub use orchestrator::{ReadyAudio, SessionOrchestrator};
