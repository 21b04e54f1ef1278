//! Pre-allocation capacity estimation.
//!
//! The record count is not stored anywhere in a log, so the store capacity
//! is estimated up front from the file size and the observed byte spacing
//! of the variant's once-per-sample-block marker record. The estimate is
//! only a hint; the store grows past it when it proves low.

use std::io::{Read, Seek};

use tracing::debug;

use crate::bytes::ByteCursor;
use crate::config::{Config, InstrumentKind};
use crate::record::RecordType;
use crate::synchronizer::find_next_header;
use crate::Result;

/// Marker occurrences sampled when measuring spacing.
pub const SPACING_SCANS: usize = 50;

/// Average byte spacing between checksum-qualified occurrences of `marker`,
/// scanning at most [`SPACING_SCANS`] recurrences from the current
/// position. `None` if the marker never recurs.
fn marker_spacing<R>(cursor: &mut ByteCursor<R>, marker: RecordType) -> Result<Option<f64>>
where
    R: Read + Seek,
{
    let mut first: Option<u64> = None;
    let mut last = 0u64;
    let mut count = 0usize;
    while count < SPACING_SCANS {
        match find_next_header(cursor, true)? {
            None => break,
            Some((offset, rtype)) => {
                if rtype == marker {
                    match first {
                        None => first = Some(offset),
                        Some(_) => {
                            last = offset;
                            count += 1;
                        }
                    }
                }
                // The scanner parks on the sync byte and skips an in-place
                // candidate itself on the next call; no reposition needed.
            }
        }
    }
    match first {
        Some(first) if count > 0 => Ok(Some((last - first) as f64 / count as f64)),
        _ => Ok(None),
    }
}

/// Estimates the total slot count for pre-allocation. Restores the cursor
/// position before returning.
///
/// Very short files where the marker never recurs fall back to a capacity
/// of 1.
pub fn estimate_capacity<R>(cursor: &mut ByteCursor<R>, config: &Config) -> Result<usize>
where
    R: Read + Seek,
{
    let marker = match config.kind {
        InstrumentKind::Vector => RecordType::VecSysData,
        InstrumentKind::Awac => RecordType::AwacProfile,
    };
    let start = cursor.position();
    let spacing = marker_spacing(cursor, marker);
    cursor.seek_to(start)?;
    let Some(spacing) = spacing? else {
        debug!(?marker, "marker never recurred; minimum capacity");
        return Ok(1);
    };

    // Sample blocks in the file, then samples per block: the Vector emits
    // one sysdata record per second and fs velocity records in between.
    let blocks = (cursor.len() as f64 / spacing).ceil() + 1.0;
    let per_block = match config.kind {
        InstrumentKind::Vector => config.fs.max(1.0),
        InstrumentKind::Awac => 1.0,
    };
    let estimate = (blocks * per_block).ceil() as usize;
    debug!(?marker, spacing, estimate, "capacity estimated");
    Ok(estimate.max(1))
}
