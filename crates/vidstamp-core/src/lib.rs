pub mod atom;
pub mod date;
pub mod metadata;
pub mod provider;
pub mod tags;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use metadata::{Confidence, ExtractionMethod, GpsCoordinates, MetadataResult};
pub use provider::{FileAttributes, ProviderError, SiblingFile, StorageProvider};

fn default_true() -> bool {
    true
}

/// Tuning knobs for an extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Try to read a date out of the filename.
    #[serde(default = "default_true")]
    pub filename_guess: bool,
    /// Interpolate between dated neighbors of the same camera counter run.
    #[serde(default = "default_true")]
    pub sequence_interpolation: bool,
    /// Lower the prefix-fetch ceiling in bytes.
    #[serde(default)]
    pub prefix_cap: Option<u64>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            filename_guess: true,
            sequence_interpolation: true,
            prefix_cap: None,
        }
    }
}

/// Metadata extraction engine bound to one storage provider.
///
/// Stateless between calls: every `extract` fetches what it needs and
/// returns an owned result, so one extractor can serve a whole batch.
pub struct Extractor<P> {
    provider: P,
    options: ExtractOptions,
}

impl<P: StorageProvider> Extractor<P> {
    pub fn new(provider: P) -> Self {
        Self::with_options(provider, ExtractOptions::default())
    }

    pub fn with_options(provider: P, options: ExtractOptions) -> Self {
        Self { provider, options }
    }

    /// Best-effort capture metadata for one file.
    ///
    /// Never errors: storage failures and malformed containers degrade the
    /// result instead of aborting it, and the terminal "nothing found"
    /// outcome is a reportable value. The result's method and confidence
    /// say how much to trust the timestamp.
    pub fn extract(&self, file_id: &str, file_name: &str) -> MetadataResult {
        let now = Utc::now();

        // Stage 1: provider attributes, used for prefix sizing and the
        // last-resort date.
        let attributes = match self.provider.file_attributes(file_id) {
            Ok(attrs) => Some(attrs),
            Err(err) => {
                warn!(file_id, %err, "attribute fetch failed");
                None
            }
        };

        // Stage 2: fetch the byte prefix and parse its atom tree.
        let mut max_bytes = attributes
            .as_ref()
            .map(|attrs| provider::prefix_fetch_size(attrs.size))
            .unwrap_or(provider::PREFIX_FLOOR_BYTES);
        if let Some(cap) = self.options.prefix_cap {
            max_bytes = max_bytes.min(cap);
        }
        let prefix = match self.provider.fetch_prefix(file_id, max_bytes) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(file_id, %err, "prefix fetch failed");
                Vec::new()
            }
        };
        let atoms = atom::parse_atoms(&prefix);
        debug!(file_id, atoms = atoms.len(), bytes = prefix.len(), "parsed prefix");

        // Stage 3: pull what the container itself knows.
        let atom_date = tags::first_timestamp(&atoms, &prefix, now);
        let gps = tags::first_gps(&atoms, &prefix);
        let device_info = tags::device_info(&atoms, &prefix);

        // Stage 4: run the date cascade.
        let resolved = date::resolve(
            atom_date,
            file_name,
            |seq| match self.provider.list_siblings(file_id, &seq.prefix) {
                Ok(list) => Some(list),
                Err(err) => {
                    warn!(file_id, %err, "sibling listing failed");
                    None
                }
            },
            attributes.as_ref(),
            &self.options,
            now,
        );

        let mut result = match resolved {
            Some(date) => MetadataResult::dated(date.timestamp, date.method, date.confidence),
            None => MetadataResult::none(),
        };
        result.gps = gps;
        result.device_info = device_info;
        result
    }
}
