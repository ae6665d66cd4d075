pub mod filename;
pub mod sequence;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::metadata::{Confidence, ExtractionMethod};
use crate::provider::{FileAttributes, SiblingFile};
use crate::ExtractOptions;

/// Outcome of the date cascade: the winning instant plus how it was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedDate {
    pub timestamp: DateTime<Utc>,
    pub method: ExtractionMethod,
    pub confidence: Confidence,
}

/// Run the strategies in priority order and stop at the first hit. The
/// order encodes decreasing authority and is fixed: embedded metadata,
/// then the filename, then sequence neighbors, then provider times.
///
/// `siblings` is only called when the filename parses as a sequence name
/// and every higher strategy came up empty, so providers with a slow
/// listing call pay for it rarely.
pub fn resolve<F>(
    atom_date: Option<DateTime<Utc>>,
    file_name: &str,
    siblings: F,
    attributes: Option<&FileAttributes>,
    options: &ExtractOptions,
    now: DateTime<Utc>,
) -> Option<ResolvedDate>
where
    F: FnOnce(&sequence::SequenceName) -> Option<Vec<SiblingFile>>,
{
    // Strategy 1: embedded container metadata.
    if let Some(timestamp) = atom_date {
        return Some(ResolvedDate {
            timestamp,
            method: ExtractionMethod::AtomParse,
            confidence: Confidence::High,
        });
    }
    debug!(file_name, "no embedded timestamp");

    // Strategy 2: date spelled out in the filename.
    if options.filename_guess {
        if let Some(timestamp) = filename::date_from_filename(file_name) {
            return Some(ResolvedDate {
                timestamp,
                method: ExtractionMethod::FilenamePattern,
                confidence: Confidence::Medium,
            });
        }
        debug!(file_name, "no date in filename");
    }

    // Strategy 3: interpolate between dated sequence neighbors.
    if options.sequence_interpolation {
        if let Some(seq) = sequence::parse_sequence_name(file_name) {
            if let Some(candidates) = siblings(&seq) {
                if let Some((timestamp, confidence)) =
                    sequence::interpolate(seq.number, file_name, &candidates, now)
                {
                    return Some(ResolvedDate {
                        timestamp,
                        method: ExtractionMethod::SequenceInterpolation,
                        confidence,
                    });
                }
            }
            debug!(file_name, "sequence interpolation found nothing");
        }
    }

    // Strategy 4: provider-reported times. Modification time sits closer
    // to capture than creation for files re-uploaded after the fact.
    if let Some(attrs) = attributes {
        if let Some(timestamp) = attrs.modified.or(attrs.created) {
            return Some(ResolvedDate {
                timestamp,
                method: ExtractionMethod::ProviderFallback,
                confidence: Confidence::Low,
            });
        }
    }

    None
}
