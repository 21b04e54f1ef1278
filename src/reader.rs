//! The top-level decode loop.
//!
//! A session reads the three leading configuration records, estimates
//! capacity, then walks data records until end-of-file, a fatal error, or
//! the caller's record limit. Framing and type-code anomalies are recovered
//! by resynchronization; checksum and format anomalies abort the decode.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

use crate::bytes::ByteCursor;
use crate::checksum::ChecksumVerifier;
use crate::config::{Config, InstrumentKind};
use crate::estimate::estimate_capacity;
use crate::record::{
    self, RecordType, VecCheckData, VecHeader, AHRS_ID_IMU, AHRS_IMU_LEN, AHRS_PREFIX_LEN,
    CHECK_DATA_PREFIX_LEN, HARDWARE_LEN, HEAD_LEN, SYNC, USER_LEN, VEC_DATA_LEN, VEC_HEADER_LEN,
    VEC_SYSDATA_LEN,
};
use crate::store::{AwacStore, DataStore, VectorStore};
use crate::synchronizer::find_next_header;
use crate::{Error, Result};

/// Decode options.
#[derive(Debug, Clone, TypedBuilder)]
pub struct DecodeOptions {
    /// Verify the trailing checksum word of every record. A mismatch on a
    /// well-framed record aborts the decode.
    #[builder(default = true)]
    pub enforce_checksums: bool,

    /// Stop after this many slots have been decoded.
    #[builder(default)]
    pub record_limit: Option<usize>,

    /// Caps the capacity estimate. Only useful to force store growth in
    /// tests.
    #[builder(default)]
    pub capacity_cap: Option<usize>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions::builder().build()
    }
}

/// Result of a decode session.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub config: Config,
    pub data: DataStore,
    /// Vector burst header (0x12), when the log carries one.
    pub vec_header: Option<VecHeader>,
    /// Vector probe check record (0x07), when the log carries one.
    pub check_data: Option<VecCheckData>,
    /// The stream ended inside a record; everything before it was kept.
    pub truncated: bool,
    /// Number of resynchronization scans performed.
    pub resyncs: usize,
}

/// Interleave-compensation state, owned solely by the driver.
///
/// A sysdata record opens a slot that the following velocity record shares.
/// The instrument firmware sometimes emits a slot's AHRS record after the
/// *next* sysdata record; an AHRS record arriving in `SystemOpened` is
/// therefore retargeted at the previous slot, and the velocity record that
/// follows re-opens the slot the sysdata record created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Idle,
    SystemOpened,
}

/// Decodes a complete Nortek log from `source`.
///
/// On recoverable truncation (the stream ends mid-record) the partial
/// result is returned with [`Decoded::truncated`] set; unreadable files
/// produce an error and no partial data.
///
/// # Errors
/// [`Error::UnrecognizedFormat`] for files that are not Nortek logs and
/// [`Error::ChecksumMismatch`] when enforcement is on and a well-framed
/// record fails verification.
pub fn decode<R>(source: R, opts: &DecodeOptions) -> Result<Decoded>
where
    R: Read + Seek,
{
    let mut cursor = ByteCursor::new(source)?;
    cursor.detect_endian()?;
    let mut driver = Driver::new(cursor, opts)?;
    driver.run()?;
    Ok(driver.finish())
}

/// Decodes a log file. See [decode].
///
/// # Errors
/// As [decode], plus I/O errors opening the file.
pub fn decode_file<P>(path: P, opts: &DecodeOptions) -> Result<Decoded>
where
    P: AsRef<Path>,
{
    let file = BufReader::new(File::open(path)?);
    decode(file, opts)
}

struct Driver<'a, R>
where
    R: Read + Seek,
{
    cursor: ByteCursor<R>,
    opts: &'a DecodeOptions,
    verifier: ChecksumVerifier,
    config: Config,
    data: DataStore,
    /// Slots opened so far; the current slot is `slots - 1`.
    slots: usize,
    slot_state: SlotState,
    vec_header: Option<VecHeader>,
    check_data: Option<VecCheckData>,
    truncated: bool,
    resyncs: usize,
}

impl<'a, R> Driver<'a, R>
where
    R: Read + Seek,
{
    /// Reads the mandatory hardware, head, and user configuration records,
    /// estimates capacity, and allocates the store.
    fn new(mut cursor: ByteCursor<R>, opts: &'a DecodeOptions) -> Result<Self> {
        let verifier = ChecksumVerifier::new(cursor.endian(), opts.enforce_checksums);
        let endian = cursor.endian();

        let hardware = Self::config_record(
            &mut cursor,
            &verifier,
            RecordType::HardwareConfig,
            HARDWARE_LEN,
        )?;
        let head = Self::config_record(&mut cursor, &verifier, RecordType::HeadConfig, HEAD_LEN)?;
        let user = Self::config_record(&mut cursor, &verifier, RecordType::UserConfig, USER_LEN)?;
        let config = Config::new(
            record::decode_hardware(endian, &hardware),
            record::decode_head(endian, &head),
            record::decode_user(endian, &user),
        )?;
        debug!(kind = ?config.kind, fs = config.fs, "configuration read");

        let mut capacity = estimate_capacity(&mut cursor, &config)?;
        if let Some(cap) = opts.capacity_cap {
            capacity = capacity.min(cap);
        }
        let data = match config.kind {
            InstrumentKind::Vector => DataStore::Vector(VectorStore::with_capacity(capacity)),
            InstrumentKind::Awac => DataStore::Awac(AwacStore::with_capacity(
                capacity,
                usize::from(config.user.num_bins),
            )),
        };

        Ok(Driver {
            cursor,
            opts,
            verifier,
            config,
            data,
            slots: 0,
            slot_state: SlotState::Idle,
            vec_header: None,
            check_data: None,
            truncated: false,
            resyncs: 0,
        })
    }

    /// Reads one strictly-ordered configuration record. Any framing or
    /// truncation problem this early means the file is not a Nortek log.
    fn config_record(
        cursor: &mut ByteCursor<R>,
        verifier: &ChecksumVerifier,
        want: RecordType,
        len: usize,
    ) -> Result<Vec<u8>> {
        let offset = cursor.position();
        let not_nortek =
            |_| Error::UnrecognizedFormat("the file does not appear to be a Nortek log".to_string());
        let header = cursor.read_fixed(2).map_err(not_nortek)?;
        if header[0] != SYNC || header[1] != want.code() {
            return Err(Error::UnrecognizedFormat(format!(
                "expected the {want:?} record at offset {offset}"
            )));
        }
        let payload = cursor.read_fixed(len).map_err(not_nortek)?;
        let ck = cursor.read_u16().map_err(not_nortek)?;
        verifier.verify([header[0], header[1]], &payload, ck, offset)?;
        Ok(payload)
    }

    /// Reads `len` payload bytes plus the trailing checksum word, or `None`
    /// at a mid-record end of stream.
    fn body(&mut self, len: usize) -> Result<Option<(Vec<u8>, u16)>> {
        let payload = match self.cursor.read_fixed(len) {
            Ok(payload) => payload,
            Err(Error::TruncatedStream) => {
                self.truncated = true;
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let ck = match self.cursor.read_u16() {
            Ok(ck) => ck,
            Err(Error::TruncatedStream) => {
                self.truncated = true;
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        Ok(Some((payload, ck)))
    }

    /// Reads a fixed-length chunk mid-record, or `None` at end of stream.
    fn chunk(&mut self, len: usize) -> Result<Option<Vec<u8>>> {
        match self.cursor.read_fixed(len) {
            Ok(dat) => Ok(Some(dat)),
            Err(Error::TruncatedStream) => {
                self.truncated = true;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Seeks the next valid header after framing loss. Always unqualified:
    /// the corrupted bytes behind the scan would never sum like a record.
    /// Returns false if the stream ended first.
    fn resync(&mut self) -> Result<bool> {
        self.resyncs += 1;
        match find_next_header(&mut self.cursor, false)? {
            Some((offset, rtype)) => {
                debug!(offset, ?rtype, "resynchronized");
                Ok(true)
            }
            None => {
                debug!("stream ended while seeking a record header");
                Ok(false)
            }
        }
    }

    /// Steps past a well-framed record whose type code this decode does
    /// not handle. With checksum enforcement on, the scan rewinds to the
    /// record's header and the next boundary must pass the lookback
    /// checksum test, so the skipped record is validated like any other;
    /// without enforcement it scans unqualified from the current position.
    fn skip_unknown(&mut self) -> Result<bool> {
        self.resyncs += 1;
        let qualify = self.opts.enforce_checksums;
        if qualify {
            self.cursor.seek_relative(-2)?;
        }
        match find_next_header(&mut self.cursor, qualify)? {
            Some((offset, rtype)) => {
                debug!(offset, ?rtype, "skipped unhandled record");
                Ok(true)
            }
            None => {
                debug!("stream ended while skipping an unhandled record");
                Ok(false)
            }
        }
    }

    fn run(&mut self) -> Result<()> {
        let endian = self.cursor.endian();
        'records: loop {
            if let Some(limit) = self.opts.record_limit {
                if self.slots >= limit {
                    debug!(limit, "record limit reached");
                    break;
                }
            }

            let offset = self.cursor.position();
            let header = match self.cursor.read_fixed(2) {
                Ok(header) => header,
                Err(Error::TruncatedStream) => {
                    // A clean end lands exactly on a record boundary; a
                    // lone trailing byte is a cut-off header. The short
                    // read parks the cursor at the end, so compare against
                    // the offset the read started from.
                    self.truncated = self.cursor.len() > offset;
                    break;
                }
                Err(err) => return Err(err),
            };

            if header[0] != SYNC {
                debug!(offset, byte = header[0], "corrupt framing");
                if self.resync()? {
                    continue;
                }
                break;
            }
            let Some(rtype) = RecordType::from_code(header[1]) else {
                warn!(offset, code = header[1], "unrecognized record type");
                if self.skip_unknown()? {
                    continue;
                }
                break;
            };
            if !rtype.supported_by(self.config.kind) {
                warn!(offset, ?rtype, kind = ?self.config.kind, "record type not in this instrument's catalog");
                if self.skip_unknown()? {
                    continue;
                }
                break;
            }

            let header = [header[0], header[1]];
            trace!(offset, ?rtype, slot = self.slots, "record");
            match rtype {
                RecordType::HardwareConfig | RecordType::HeadConfig | RecordType::UserConfig => {
                    // Configuration is read-only once data records begin;
                    // wrap-mode logs can repeat these headers mid-file.
                    let len = match rtype {
                        RecordType::HardwareConfig => HARDWARE_LEN,
                        RecordType::HeadConfig => HEAD_LEN,
                        _ => USER_LEN,
                    };
                    let Some((payload, ck)) = self.body(len)? else {
                        break;
                    };
                    self.verifier.verify(header, &payload, ck, offset)?;
                    warn!(offset, ?rtype, "configuration record inside data phase ignored");
                }
                RecordType::VecHeader => {
                    let Some((payload, ck)) = self.body(VEC_HEADER_LEN)? else {
                        break;
                    };
                    self.verifier.verify(header, &payload, ck, offset)?;
                    self.vec_header = Some(record::decode_vec_header(endian, &payload));
                }
                RecordType::VecCheckData => {
                    let Some(prefix) = self.chunk(CHECK_DATA_PREFIX_LEN)? else {
                        break;
                    };
                    let samples = usize::from(endian.u16_at(&prefix, 2));
                    let Some((rest, ck)) = self.body(3 * samples)? else {
                        break;
                    };
                    let mut payload = prefix;
                    payload.extend_from_slice(&rest);
                    self.verifier.verify(header, &payload, ck, offset)?;
                    self.check_data = Some(record::decode_check_data(endian, &payload));
                }
                RecordType::VecData => {
                    let Some((payload, ck)) = self.body(VEC_DATA_LEN)? else {
                        // The velocity half of the pair was cut off; the
                        // slot its sysdata record opened goes with it.
                        if self.slot_state == SlotState::SystemOpened {
                            self.slots -= 1;
                            self.slot_state = SlotState::Idle;
                        }
                        break;
                    };
                    self.verifier.verify(header, &payload, ck, offset)?;
                    let d = record::decode_vec_data(endian, &payload);
                    // Shares the slot its sysdata record opened; opens a
                    // fresh one otherwise.
                    if self.slot_state == SlotState::Idle {
                        self.slots += 1;
                        self.data.grow_to(self.slots);
                    }
                    self.slot_state = SlotState::Idle;
                    if let DataStore::Vector(store) = &mut self.data {
                        store.set_vecdata(self.slots - 1, &d);
                    }
                }
                RecordType::VecSysData => {
                    let Some((payload, ck)) = self.body(VEC_SYSDATA_LEN)? else {
                        break;
                    };
                    self.verifier.verify(header, &payload, ck, offset)?;
                    let d = record::decode_vec_sysdata(endian, &payload);
                    self.slots += 1;
                    self.data.grow_to(self.slots);
                    self.slot_state = SlotState::SystemOpened;
                    if let DataStore::Vector(store) = &mut self.data {
                        store.set_sysdata(self.slots - 1, &d);
                    }
                }
                RecordType::Ahrs => {
                    let Some(prefix) = self.chunk(AHRS_PREFIX_LEN)? else {
                        break;
                    };
                    let sensor_id = prefix[AHRS_PREFIX_LEN - 1];
                    if sensor_id != AHRS_ID_IMU {
                        warn!(offset, sensor_id, "unsupported AHRS sensor id");
                        if self.resync()? {
                            continue 'records;
                        }
                        break;
                    }
                    let Some((rest, ck)) = self.body(AHRS_IMU_LEN)? else {
                        break;
                    };
                    let mut payload = prefix;
                    payload.extend_from_slice(&rest);
                    self.verifier.verify(header, &payload, ck, offset)?;
                    let d = record::decode_ahrs(endian, &payload);
                    if self.slot_state == SlotState::SystemOpened {
                        // Firmware quirk: this AHRS record belongs to the
                        // slot before the sysdata record that just opened;
                        // the velocity record that follows re-opens it.
                        self.slot_state = SlotState::Idle;
                        self.slots = self.slots.saturating_sub(1);
                    }
                    if self.slots == 0 {
                        warn!(offset, "AHRS record before any slot; dropped");
                        continue;
                    }
                    if let DataStore::Vector(store) = &mut self.data {
                        store.set_ahrs(self.slots - 1, &d);
                    }
                }
                RecordType::AwacProfile => {
                    let num_bins = usize::from(self.config.user.num_bins);
                    let Some((payload, ck)) = self.body(record::awac_profile_len(num_bins))? else {
                        break;
                    };
                    self.verifier.verify(header, &payload, ck, offset)?;
                    let d = record::decode_awac_profile(endian, &payload, num_bins);
                    self.slots += 1;
                    self.data.grow_to(self.slots);
                    if let DataStore::Awac(store) = &mut self.data {
                        store.set_profile(self.slots - 1, &d);
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Decoded {
        self.data.truncate(self.slots);
        debug!(
            slots = self.slots,
            truncated = self.truncated,
            resyncs = self.resyncs,
            "decode finished"
        );
        Decoded {
            config: self.config,
            data: self.data,
            vec_header: self.vec_header,
            check_data: self.check_data,
            truncated: self.truncated,
            resyncs: self.resyncs,
        }
    }
}
