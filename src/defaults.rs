//! Default configuration constants for voxsync.

/// Default language spoken into the STT stage.
pub const SOURCE_LANG: &str = "sv-SE";

/// Default target languages for translation and synthesis.
///
/// The jitter buffer's language set is fixed at construction, so this list
/// also decides which languages gate segment release.
pub const TARGET_LANGS: &[&str] = &["en-US"];

/// First segment id the STT stage assigns; the jitter buffer releases
/// contiguously from here.
pub const FIRST_SEGMENT_ID: u64 = 1;

/// Default `tracing` filter when neither `RUST_LOG` nor the config sets one.
pub const LOG_FILTER: &str = "info";

/// Environment variable overriding the source language.
pub const ENV_SOURCE_LANG: &str = "VOXSYNC_SOURCE_LANG";

/// Environment variable overriding target languages (comma separated).
pub const ENV_TARGET_LANGS: &str = "VOXSYNC_TARGET_LANGS";

/// Environment variable overriding the log filter.
pub const ENV_LOG: &str = "VOXSYNC_LOG";
