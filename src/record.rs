//! The record catalog and per-type payload decoders.
//!
//! Decoders are pure: fixed-size payload bytes in, typed fields out. They
//! never scale values into physical units; raw integers and bitfields are
//! preserved for the downstream science pass.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::bytes::Endian;
use crate::config::{
    CoordSystem, HardwareConfig, HeadConfig, InstrumentKind, Transmit, UserConfig,
};
use crate::time::clock_to_unix;

/// Sync byte leading every record header.
pub const SYNC: u8 = 0xa5;

/// AHRS sensor id for the inertial unit with orientation matrix output.
pub const AHRS_ID_IMU: u8 = 0xcc;

/// Whether a record belongs to the leading configuration phase or the data
/// phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Config,
    Data,
}

/// Closed catalog of record type codes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    UserConfig,
    HeadConfig,
    HardwareConfig,
    VecCheckData,
    VecData,
    VecSysData,
    VecHeader,
    Ahrs,
    AwacProfile,
}

impl RecordType {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => RecordType::UserConfig,
            0x04 => RecordType::HeadConfig,
            0x05 => RecordType::HardwareConfig,
            0x07 => RecordType::VecCheckData,
            0x10 => RecordType::VecData,
            0x11 => RecordType::VecSysData,
            0x12 => RecordType::VecHeader,
            0x71 => RecordType::Ahrs,
            0x20 => RecordType::AwacProfile,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        match self {
            RecordType::UserConfig => 0x00,
            RecordType::HeadConfig => 0x04,
            RecordType::HardwareConfig => 0x05,
            RecordType::VecCheckData => 0x07,
            RecordType::VecData => 0x10,
            RecordType::VecSysData => 0x11,
            RecordType::VecHeader => 0x12,
            RecordType::Ahrs => 0x71,
            RecordType::AwacProfile => 0x20,
        }
    }

    pub fn phase(self) -> Phase {
        match self {
            RecordType::UserConfig | RecordType::HeadConfig | RecordType::HardwareConfig => {
                Phase::Config
            }
            _ => Phase::Data,
        }
    }

    /// Whether the record type occurs in logs from the given instrument.
    pub fn supported_by(self, kind: InstrumentKind) -> bool {
        match self.phase() {
            Phase::Config => true,
            Phase::Data => match kind {
                InstrumentKind::Vector => self != RecordType::AwacProfile,
                InstrumentKind::Awac => self == RecordType::AwacProfile,
            },
        }
    }
}

/// Fixed payload sizes (including the leading size word where the wire
/// format carries one).
pub const HARDWARE_LEN: usize = 44;
pub const HEAD_LEN: usize = 220;
pub const USER_LEN: usize = 508;
pub const VEC_DATA_LEN: usize = 20;
pub const VEC_SYSDATA_LEN: usize = 24;
pub const VEC_HEADER_LEN: usize = 38;
/// Check-data prefix; three per-beam amplitude arrays follow.
pub const CHECK_DATA_PREFIX_LEN: usize = 6;
/// AHRS prefix carrying the size word, counter, and sensor id.
pub const AHRS_PREFIX_LEN: usize = 4;
/// AHRS inertial payload: 18 f32 values plus a DWORD and the sensor's own
/// checksum, both skipped.
pub const AHRS_IMU_LEN: usize = 78;

/// AWAC profile payload length for a given bin count. The spare block ends
/// at byte 116 and a fill byte pads odd bin counts.
pub fn awac_profile_len(num_bins: usize) -> usize {
    116 + 9 * num_bins + num_bins % 2
}

/// Raw sysdata status byte with named bit accessors.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags(pub u8);

impl StatusFlags {
    pub fn orientation_down(self) -> bool {
        self.0 & 0x01 != 0
    }

    /// Velocity scaling bit: set means 0.1 mm/s, clear means 1 mm/s.
    pub fn scaling_fine(self) -> bool {
        self.0 & 0x02 != 0
    }

    pub fn pitch_out_of_range(self) -> bool {
        self.0 & 0x04 != 0
    }

    pub fn roll_out_of_range(self) -> bool {
        self.0 & 0x08 != 0
    }

    pub fn wakeup_state(self) -> u8 {
        (self.0 >> 4) & 0x03
    }

    pub fn power_level(self) -> u8 {
        (self.0 >> 6) & 0x03
    }
}

/// Raw sysdata error byte with named bit accessors.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorFlags(pub u8);

impl ErrorFlags {
    pub fn compass(self) -> bool {
        self.0 & 0x01 != 0
    }

    pub fn measurement_data(self) -> bool {
        self.0 & 0x02 != 0
    }

    pub fn sensor_data(self) -> bool {
        self.0 & 0x04 != 0
    }

    pub fn tag(self) -> bool {
        self.0 & 0x08 != 0
    }

    pub fn flash(self) -> bool {
        self.0 & 0x10 != 0
    }

    pub fn ct_sensor(self) -> bool {
        self.0 & 0x40 != 0
    }
}

/// Vector velocity record (0x10).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VecData {
    pub ana_in2_lsb: u8,
    pub count: u8,
    pub pressure_msb: u8,
    pub ana_in2_msb: u8,
    pub pressure_lsw: u16,
    pub ana_in1: u16,
    pub vel: [i16; 3],
    pub amp: [u8; 3],
    pub corr: [u8; 3],
}

impl VecData {
    /// Unscaled pressure composed from the raw MSB/LSW pair.
    pub fn pressure_raw(&self) -> u32 {
        u32::from(self.pressure_msb) * 65536 + u32::from(self.pressure_lsw)
    }
}

/// Vector system record (0x11): environmental and attitude snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VecSysData {
    /// Unix seconds decoded from the BCD clock; NaN if the clock bytes are
    /// not a valid date.
    pub time: f64,
    pub battery: u16,
    pub sound_speed: u16,
    pub heading: i16,
    pub pitch: i16,
    pub roll: i16,
    pub temperature: u16,
    pub error: ErrorFlags,
    pub status: StatusFlags,
    pub ana_in: u16,
}

/// Vector burst header (0x12).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct VecHeader {
    pub time: f64,
    pub num_records: u16,
    pub noise: [u8; 3],
    pub spare: u8,
    pub corr: [u8; 3],
}

/// Vector probe check record (0x07).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VecCheckData {
    pub samples: u16,
    pub first_sample: u16,
    pub amp: [Vec<u8>; 3],
}

/// AHRS orientation record (0x71, sensor id 0xcc).
#[derive(Debug, Clone, PartialEq)]
pub struct AhrsData {
    pub accel: [f32; 3],
    pub ang_rate: [f32; 3],
    pub mag: [f32; 3],
    pub orientmat: Array2<f32>,
}

/// AWAC profile record (0x20).
#[derive(Debug, Clone, PartialEq)]
pub struct AwacProfile {
    pub time: f64,
    pub error: u16,
    pub ana_in1: u16,
    pub battery: u16,
    pub sound_speed: u16,
    pub heading: u16,
    pub pitch: u16,
    pub roll: u16,
    pub pressure_msb: u8,
    pub status: StatusFlags,
    pub pressure_lsw: u16,
    pub temperature: u16,
    /// Per-bin velocities, shape (3, num_bins).
    pub vel: Array2<i16>,
    /// Per-bin amplitudes, shape (3, num_bins).
    pub amp: Array2<u8>,
}

impl AwacProfile {
    pub fn pressure_raw(&self) -> u32 {
        u32::from(self.pressure_msb) * 65536 + u32::from(self.pressure_lsw)
    }
}

/// Bytes up to the first NUL as a string.
fn cstr(dat: &[u8]) -> String {
    let end = dat.iter().position(|&b| b == 0).unwrap_or(dat.len());
    String::from_utf8_lossy(&dat[..end]).into_owned()
}

fn clock(dat: &[u8]) -> f64 {
    clock_to_unix(&[dat[0], dat[1], dat[2], dat[3], dat[4], dat[5]])
}

pub fn decode_hardware(endian: Endian, dat: &[u8]) -> HardwareConfig {
    debug_assert_eq!(dat.len(), HARDWARE_LEN);
    HardwareConfig {
        serial_number: cstr(&dat[2..10]),
        prolog_id: dat[10],
        prolog_fw_version: cstr(&dat[12..16]),
        config: endian.u16_at(dat, 16),
        frequency: endian.u16_at(dat, 18),
        pic_version: endian.u16_at(dat, 20),
        hw_revision: endian.u16_at(dat, 22),
        recorder_size: u32::from(endian.u16_at(dat, 24)) * 65536,
        status: endian.u16_at(dat, 26),
        fw_version: endian.u32_at(dat, 40),
    }
}

pub fn decode_head(endian: Endian, dat: &[u8]) -> HeadConfig {
    debug_assert_eq!(dat.len(), HEAD_LEN);
    let system = dat[20..196].to_vec();
    // The transformation matrix lives inside the system block, as nine
    // signed words scaled by 4096.
    let mut transform_matrix = Array2::zeros((3, 3));
    for (i, cell) in transform_matrix.iter_mut().enumerate() {
        *cell = f64::from(endian.i16_at(&system, 8 + 2 * i)) / 4096.0;
    }
    HeadConfig {
        config: endian.u16_at(dat, 2),
        frequency: endian.u16_at(dat, 4),
        head_type: endian.u16_at(dat, 6),
        serial_number: cstr(&dat[8..20]),
        system,
        transform_matrix,
        num_beams: endian.u16_at(dat, 218),
    }
}

pub fn decode_user(endian: Endian, dat: &[u8]) -> UserConfig {
    debug_assert_eq!(dat.len(), USER_LEN);
    let mut velocity_adjustment_table = Vec::with_capacity(90);
    for i in 0..90 {
        velocity_adjustment_table.push(endian.u16_at(dat, 74 + 2 * i));
    }
    let mut qual_const = [0u16; 8];
    for (i, q) in qual_const.iter_mut().enumerate() {
        *q = endian.u16_at(dat, 492 + 2 * i);
    }
    UserConfig {
        transmit: Transmit {
            pulse_length: endian.u16_at(dat, 2),
            blank_distance: endian.u16_at(dat, 4),
            receive_length: endian.u16_at(dat, 6),
            time_between_pings: endian.u16_at(dat, 8),
            time_between_bursts: endian.u16_at(dat, 10),
        },
        num_pings: endian.u16_at(dat, 12),
        avg_interval: endian.u16_at(dat, 14),
        num_beams: endian.u16_at(dat, 16),
        timing_ctrl_reg: endian.u16_at(dat, 18),
        power_ctrl_reg: endian.u16_at(dat, 20),
        a1: endian.u16_at(dat, 22),
        b0: endian.u16_at(dat, 24),
        b1: endian.u16_at(dat, 26),
        compass_update_rate: endian.u16_at(dat, 28),
        coord_system: CoordSystem::from_code(endian.u16_at(dat, 30)),
        num_bins: endian.u16_at(dat, 32),
        bin_length: endian.u16_at(dat, 34),
        measurement_interval: endian.u16_at(dat, 36),
        deployment_name: cstr(&dat[38..44]),
        wrap_mode: endian.u16_at(dat, 44),
        clock_deploy: [
            endian.u16_at(dat, 46),
            endian.u16_at(dat, 48),
            endian.u16_at(dat, 50),
        ],
        diagnostics_interval: endian.u32_at(dat, 52),
        mode0: endian.u16_at(dat, 56),
        adj_sound_speed: endian.u16_at(dat, 58),
        num_samples_diag: endian.u16_at(dat, 60),
        num_beams_cell_diag: endian.u16_at(dat, 62),
        num_pings_diag: endian.u16_at(dat, 64),
        mode_test: endian.u16_at(dat, 66),
        ana_in_addr: endian.u16_at(dat, 68),
        sw_version: endian.u16_at(dat, 70),
        velocity_adjustment_table,
        comments: cstr(&dat[254..434]),
        mode1: endian.u16_at(dat, 434),
        dyn_perc_pos: endian.u16_at(dat, 436),
        t1w: endian.u16_at(dat, 438),
        t2w: endian.u16_at(dat, 440),
        t3w: endian.u16_at(dat, 442),
        num_samples: endian.u16_at(dat, 444),
        num_bursts: endian.u16_at(dat, 450),
        ana_out_scale: endian.u16_at(dat, 454),
        corr_threshold: endian.u16_at(dat, 456),
        ti_lag2: endian.u16_at(dat, 460),
        qual_const,
    }
}

pub fn decode_vec_data(endian: Endian, dat: &[u8]) -> VecData {
    debug_assert_eq!(dat.len(), VEC_DATA_LEN);
    VecData {
        ana_in2_lsb: dat[0],
        count: dat[1],
        pressure_msb: dat[2],
        ana_in2_msb: dat[3],
        pressure_lsw: endian.u16_at(dat, 4),
        ana_in1: endian.u16_at(dat, 6),
        vel: [
            endian.i16_at(dat, 8),
            endian.i16_at(dat, 10),
            endian.i16_at(dat, 12),
        ],
        amp: [dat[14], dat[15], dat[16]],
        corr: [dat[17], dat[18], dat[19]],
    }
}

pub fn decode_vec_sysdata(endian: Endian, dat: &[u8]) -> VecSysData {
    debug_assert_eq!(dat.len(), VEC_SYSDATA_LEN);
    VecSysData {
        time: clock(&dat[2..8]),
        battery: endian.u16_at(dat, 8),
        sound_speed: endian.u16_at(dat, 10),
        heading: endian.i16_at(dat, 12),
        pitch: endian.i16_at(dat, 14),
        roll: endian.i16_at(dat, 16),
        temperature: endian.u16_at(dat, 18),
        error: ErrorFlags(dat[20]),
        status: StatusFlags(dat[21]),
        ana_in: endian.u16_at(dat, 22),
    }
}

pub fn decode_vec_header(endian: Endian, dat: &[u8]) -> VecHeader {
    debug_assert_eq!(dat.len(), VEC_HEADER_LEN);
    VecHeader {
        time: clock(&dat[2..8]),
        num_records: endian.u16_at(dat, 8),
        noise: [dat[10], dat[11], dat[12]],
        spare: dat[13],
        corr: [dat[14], dat[15], dat[16]],
    }
}

pub fn decode_check_data(endian: Endian, dat: &[u8]) -> VecCheckData {
    debug_assert!(dat.len() >= CHECK_DATA_PREFIX_LEN);
    let samples = endian.u16_at(dat, 2);
    let n = usize::from(samples);
    let amp = [
        dat[6..6 + n].to_vec(),
        dat[6 + n..6 + 2 * n].to_vec(),
        dat[6 + 2 * n..6 + 3 * n].to_vec(),
    ];
    VecCheckData {
        samples,
        first_sample: endian.u16_at(dat, 4),
        amp,
    }
}

/// Decodes the inertial AHRS payload (prefix and sensor block concatenated).
pub fn decode_ahrs(endian: Endian, dat: &[u8]) -> AhrsData {
    debug_assert_eq!(dat.len(), AHRS_PREFIX_LEN + AHRS_IMU_LEN);
    let f = |i: usize| endian.f32_at(dat, AHRS_PREFIX_LEN + 4 * i);
    let mut orientmat = Array2::zeros((3, 3));
    for r in 0..3 {
        for c in 0..3 {
            orientmat[[r, c]] = f(9 + 3 * r + c);
        }
    }
    AhrsData {
        accel: [f(0), f(1), f(2)],
        ang_rate: [f(3), f(4), f(5)],
        mag: [f(6), f(7), f(8)],
        orientmat,
    }
}

pub fn decode_awac_profile(endian: Endian, dat: &[u8], num_bins: usize) -> AwacProfile {
    debug_assert_eq!(dat.len(), awac_profile_len(num_bins));
    let mut vel = Array2::zeros((3, num_bins));
    let mut amp = Array2::zeros((3, num_bins));
    for beam in 0..3 {
        for bin in 0..num_bins {
            vel[[beam, bin]] = endian.i16_at(dat, 116 + 2 * (beam * num_bins + bin));
            amp[[beam, bin]] = dat[116 + 6 * num_bins + beam * num_bins + bin];
        }
    }
    AwacProfile {
        time: clock(&dat[2..8]),
        error: endian.u16_at(dat, 8),
        ana_in1: endian.u16_at(dat, 10),
        battery: endian.u16_at(dat, 12),
        sound_speed: endian.u16_at(dat, 14),
        heading: endian.u16_at(dat, 16),
        pitch: endian.u16_at(dat, 18),
        roll: endian.u16_at(dat, 20),
        pressure_msb: dat[22],
        status: StatusFlags(dat[23]),
        pressure_lsw: endian.u16_at(dat, 24),
        temperature: endian.u16_at(dat, 26),
        vel,
        amp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_round_trips_codes() {
        for code in [0x00u8, 0x04, 0x05, 0x07, 0x10, 0x11, 0x12, 0x71, 0x20] {
            let rt = RecordType::from_code(code).unwrap();
            assert_eq!(rt.code(), code);
        }
        assert!(RecordType::from_code(0x42).is_none());
    }

    #[test]
    fn phases_split_config_from_data() {
        assert_eq!(RecordType::HardwareConfig.phase(), Phase::Config);
        assert_eq!(RecordType::UserConfig.phase(), Phase::Config);
        assert_eq!(RecordType::VecData.phase(), Phase::Data);
        assert_eq!(RecordType::AwacProfile.phase(), Phase::Data);
    }

    #[test]
    fn variant_catalogs() {
        assert!(RecordType::VecData.supported_by(InstrumentKind::Vector));
        assert!(!RecordType::VecData.supported_by(InstrumentKind::Awac));
        assert!(RecordType::AwacProfile.supported_by(InstrumentKind::Awac));
        assert!(!RecordType::AwacProfile.supported_by(InstrumentKind::Vector));
        assert!(RecordType::HeadConfig.supported_by(InstrumentKind::Awac));
    }

    #[test]
    fn vec_data_layout() {
        let mut dat = vec![0u8; VEC_DATA_LEN];
        dat[0] = 9; // AnaIn2 LSB
        dat[1] = 42; // ensemble counter
        dat[2] = 1; // pressure MSB
        dat[4..6].copy_from_slice(&100u16.to_le_bytes());
        dat[8..10].copy_from_slice(&(-5i16).to_le_bytes());
        dat[10..12].copy_from_slice(&7i16.to_le_bytes());
        dat[14] = 80;
        dat[17] = 95;
        let d = decode_vec_data(Endian::Little, &dat);
        assert_eq!(d.ana_in2_lsb, 9);
        assert_eq!(d.count, 42);
        assert_eq!(d.vel, [-5, 7, 0]);
        assert_eq!(d.amp[0], 80);
        assert_eq!(d.corr[0], 95);
        assert_eq!(d.pressure_raw(), 65536 + 100);
    }

    #[test]
    fn sysdata_layout_and_flags() {
        let mut dat = vec![0u8; VEC_SYSDATA_LEN];
        dat[2..8].copy_from_slice(&[0x30, 0x15, 0x12, 0x08, 0x12, 0x06]);
        dat[8..10].copy_from_slice(&131u16.to_le_bytes()); // battery
        dat[12..14].copy_from_slice(&(-900i16).to_le_bytes()); // heading
        dat[20] = 0x02; // measurement data error
        dat[21] = 0x01; // orientation down
        let d = decode_vec_sysdata(Endian::Little, &dat);
        assert_eq!(d.battery, 131);
        assert_eq!(d.heading, -900);
        assert!(d.error.measurement_data());
        assert!(!d.error.compass());
        assert!(d.status.orientation_down());
        assert!(!d.status.scaling_fine());
        assert!(d.time > 0.0);
    }

    #[test]
    fn head_transform_matrix_is_scaled() {
        let mut dat = vec![0u8; HEAD_LEN];
        // Identity matrix, diagonal stored as 4096.
        for i in [0usize, 4, 8] {
            dat[28 + 2 * i..30 + 2 * i].copy_from_slice(&4096i16.to_le_bytes());
        }
        dat[8..11].copy_from_slice(b"VEC");
        let h = decode_head(Endian::Little, &dat);
        assert_eq!(h.serial_number, "VEC");
        assert_eq!(h.transform_matrix[[0, 0]], 1.0);
        assert_eq!(h.transform_matrix[[0, 1]], 0.0);
        assert_eq!(h.transform_matrix[[2, 2]], 1.0);
    }

    #[test]
    fn awac_profile_pages() {
        let n = 3;
        let mut dat = vec![0u8; awac_profile_len(n)];
        // beam 1, bin 2
        let off = 116 + 2 * (n + 2);
        dat[off..off + 2].copy_from_slice(&(-123i16).to_le_bytes());
        dat[116 + 6 * n + 2 * n + 1] = 77; // beam 2, bin 1 amplitude
        let p = decode_awac_profile(Endian::Little, &dat, n);
        assert_eq!(p.vel[[1, 2]], -123);
        assert_eq!(p.amp[[2, 1]], 77);
        assert_eq!(p.vel[[0, 0]], 0);
    }

    #[test]
    fn ahrs_fields() {
        let mut dat = vec![0u8; AHRS_PREFIX_LEN + AHRS_IMU_LEN];
        dat[3] = AHRS_ID_IMU;
        dat[4..8].copy_from_slice(&1.5f32.to_le_bytes()); // accel x
        let base = AHRS_PREFIX_LEN + 4 * 9;
        dat[base..base + 4].copy_from_slice(&1.0f32.to_le_bytes()); // orientmat[0,0]
        let a = decode_ahrs(Endian::Little, &dat);
        assert_eq!(a.accel[0], 1.5);
        assert_eq!(a.orientmat[[0, 0]], 1.0);
        assert_eq!(a.orientmat[[1, 1]], 0.0);
    }
}
