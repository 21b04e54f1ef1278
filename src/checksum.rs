use crate::bytes::Endian;
use crate::{Error, Result};

/// Protocol checksum seed, per the Nortek system integrator manual.
pub const CHECKSUM_SEED: u16 = 0xb58c;

/// Computes the 16-bit record checksum: the seed plus the wrapping sum of
/// every 16-bit word of the header and payload. A trailing odd byte, which
/// only occurs in records whose payload carries a fill byte, is excluded.
pub fn checksum(endian: Endian, header: [u8; 2], payload: &[u8]) -> u16 {
    let mut sum = CHECKSUM_SEED.wrapping_add(endian.u16(header));
    for pair in payload.chunks_exact(2) {
        sum = sum.wrapping_add(endian.u16([pair[0], pair[1]]));
    }
    sum
}

/// Verifies record checksums, either enforcing or pass-through.
///
/// In pass-through mode the trailing checksum word is still consumed by the
/// caller but never compared.
#[derive(Debug, Clone, Copy)]
pub struct ChecksumVerifier {
    endian: Endian,
    enforce: bool,
}

impl ChecksumVerifier {
    pub fn new(endian: Endian, enforce: bool) -> Self {
        ChecksumVerifier { endian, enforce }
    }

    pub fn enforcing(&self) -> bool {
        self.enforce
    }

    /// Checks the trailing checksum word against the record contents.
    ///
    /// `offset` is the file offset of the record header, used only for the
    /// error report.
    ///
    /// # Errors
    /// [`Error::ChecksumMismatch`] when enforcing and the words differ.
    pub fn verify(&self, header: [u8; 2], payload: &[u8], read: u16, offset: u64) -> Result<()> {
        if !self.enforce {
            return Ok(());
        }
        let computed = checksum(self.endian, header, payload);
        if computed != read {
            return Err(Error::ChecksumMismatch {
                expected: read,
                computed,
                offset,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_only_for_empty_payload() {
        let sum = checksum(Endian::Little, [0, 0], &[]);
        assert_eq!(sum, CHECKSUM_SEED);
    }

    #[test]
    fn sums_header_and_payload_words() {
        let header = [0xa5, 0x10];
        let payload = [0x01, 0x00, 0x02, 0x00];
        let sum = checksum(Endian::Little, header, &payload);
        assert_eq!(sum, CHECKSUM_SEED.wrapping_add(0x10a5).wrapping_add(3));
    }

    #[test]
    fn wraps_at_16_bits() {
        let header = [0xff, 0xff];
        let payload = [0xff, 0xff];
        let sum = checksum(Endian::Little, header, &payload);
        assert_eq!(
            sum,
            CHECKSUM_SEED.wrapping_add(0xffff).wrapping_add(0xffff)
        );
    }

    #[test]
    fn enforcing_rejects_bad_word() {
        let v = ChecksumVerifier::new(Endian::Little, true);
        let header = [0xa5, 0x10];
        let good = checksum(Endian::Little, header, &[1, 2, 3, 4]);
        assert!(v.verify(header, &[1, 2, 3, 4], good, 0).is_ok());
        assert!(matches!(
            v.verify(header, &[1, 2, 3, 4], good.wrapping_add(1), 0),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn pass_through_accepts_anything() {
        let v = ChecksumVerifier::new(Endian::Little, false);
        assert!(v.verify([0xa5, 0x10], &[1, 2], 0xbeef, 0).is_ok());
    }
}
