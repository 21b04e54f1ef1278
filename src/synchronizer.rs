//! Header search for resynchronization and capacity estimation.
//!
//! The driver is normally `Locked`: headers are read directly and the sync
//! byte is checked. When framing is lost it goes `Seeking` and scans here,
//! one byte at a time, for a content-addressed record boundary. The format
//! has no frame length prefix, so this is the only recovery mechanism.

use std::io::{Read, Seek};

use crate::bytes::{ByteCursor, Endian};
use crate::checksum::CHECKSUM_SEED;
use crate::record::{RecordType, SYNC};
use crate::{Error, Result};

/// Upper bound on the checksum lookback window. Larger than any record in
/// the catalog, so a scan that starts at a record boundary always holds the
/// whole preceding record when it reaches the next one.
const MAX_WINDOW: usize = 8192;

/// Tests whether the bytes preceding a candidate header look like a
/// complete record: the trailing 16-bit word must equal the seed plus the
/// wrapping sum of the words before it, with word alignment anchored at the
/// candidate position.
fn window_checksum_ok(endian: Endian, window: &[u8]) -> bool {
    let n = window.len();
    if n < 4 {
        return false;
    }
    let target = endian.u16_at(window, n - 2);
    let start = (n - 2) % 2;
    let mut sum = CHECKSUM_SEED;
    for pair in window[start..n - 2].chunks_exact(2) {
        sum = sum.wrapping_add(endian.u16([pair[0], pair[1]]));
    }
    sum == target
}

/// Scans forward from the current position for the next plausible record
/// header: a sync byte followed by a catalog type code. With `qualify` the
/// candidate must additionally pass the lookback checksum test, which is
/// what capacity estimation uses to step from one record boundary to the
/// next. Resynchronization after corrupted framing runs unqualified, since
/// the preceding (corrupted) bytes would never validate.
///
/// On a match the cursor is left at the sync byte and `Some((offset, type))`
/// is returned. `None` means the stream ended while seeking.
pub fn find_next_header<R>(
    cursor: &mut ByteCursor<R>,
    qualify: bool,
) -> Result<Option<(u64, RecordType)>>
where
    R: Read + Seek,
{
    let endian = cursor.endian();
    let mut window: Vec<u8> = Vec::new();
    loop {
        let b = match cursor.read_u8() {
            Ok(b) => b,
            Err(Error::TruncatedStream) => return Ok(None),
            Err(err) => return Err(err),
        };
        if b == SYNC {
            let code = match cursor.read_u8() {
                Ok(code) => code,
                Err(Error::TruncatedStream) => return Ok(None),
                Err(err) => return Err(err),
            };
            if let Some(rtype) = RecordType::from_code(code) {
                if !qualify || window_checksum_ok(endian, &window) {
                    cursor.seek_relative(-2)?;
                    return Ok(Some((cursor.position(), rtype)));
                }
            }
            // Not a boundary; resume the scan at the byte after the sync
            // candidate.
            cursor.seek_relative(-1)?;
        }
        if qualify {
            if window.len() >= MAX_WINDOW {
                window.clear();
            }
            window.push(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum;
    use std::io::Cursor;

    fn sysdata_record() -> Vec<u8> {
        let header = [SYNC, 0x11];
        let payload = vec![0u8; 24];
        let ck = checksum(Endian::Little, header, &payload);
        let mut rec = header.to_vec();
        rec.extend_from_slice(&payload);
        rec.extend_from_slice(&ck.to_le_bytes());
        rec
    }

    #[test]
    fn finds_header_after_garbage() {
        let mut dat = vec![0x00, 0xa5, 0xff, 0x37]; // sync byte with bogus code
        dat.extend_from_slice(&sysdata_record());
        let mut cur = ByteCursor::new(Cursor::new(dat)).unwrap();
        let (off, rtype) = find_next_header(&mut cur, false).unwrap().unwrap();
        assert_eq!(off, 4);
        assert_eq!(rtype, RecordType::VecSysData);
        assert_eq!(cur.position(), 4, "cursor parks on the sync byte");
    }

    #[test]
    fn ends_cleanly_without_match() {
        let dat = vec![0x01, 0x02, 0xa5]; // trailing sync with no code byte
        let mut cur = ByteCursor::new(Cursor::new(dat)).unwrap();
        assert!(find_next_header(&mut cur, false).unwrap().is_none());
    }

    #[test]
    fn qualified_scan_steps_record_boundaries() {
        let mut dat = Vec::new();
        for _ in 0..3 {
            dat.extend_from_slice(&sysdata_record());
        }
        let mut cur = ByteCursor::new(Cursor::new(dat)).unwrap();

        // The first boundary has no lookback window, so the scan skips it
        // and locks on the second record.
        let (off, _) = find_next_header(&mut cur, true).unwrap().unwrap();
        assert_eq!(off, 28);
        // Re-scanning from the boundary skips the in-place candidate and
        // finds the next one with a full single-record window.
        let (off, _) = find_next_header(&mut cur, true).unwrap().unwrap();
        assert_eq!(off, 56);
    }

    #[test]
    fn qualified_scan_rejects_sync_bytes_inside_payloads() {
        let header = [SYNC, 0x11];
        let mut payload = vec![0u8; 24];
        payload[4] = SYNC;
        payload[5] = 0x10; // looks like a velocity header
        let ck = checksum(Endian::Little, header, &payload);
        let mut dat = sysdata_record();
        dat.extend_from_slice(&header);
        dat.extend_from_slice(&payload);
        dat.extend_from_slice(&ck.to_le_bytes());
        dat.extend_from_slice(&sysdata_record());

        let mut cur = ByteCursor::new(Cursor::new(dat)).unwrap();
        let (off, _) = find_next_header(&mut cur, true).unwrap().unwrap();
        assert_eq!(off, 28, "first full-window boundary");
        let (off, _) = find_next_header(&mut cur, true).unwrap().unwrap();
        assert_eq!(off, 56, "payload sync byte must not qualify");
    }

    #[test]
    fn window_sum_matches_record_checksum() {
        let rec = sysdata_record();
        // Window is the whole record minus its trailing checksum word plus
        // that word as the target.
        assert!(window_checksum_ok(Endian::Little, &rec));
    }
}
