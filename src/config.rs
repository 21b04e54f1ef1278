use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The two instrument families this reader supports, selected by the
/// hardware serial number prefix.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    /// Vector velocimeter (ADV)
    Vector,
    /// AWAC current profiler
    Awac,
}

/// Velocity coordinate system selected at deployment time.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordSystem {
    Enu,
    Xyz,
    Beam,
    Unknown(u16),
}

impl CoordSystem {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => CoordSystem::Enu,
            1 => CoordSystem::Xyz,
            2 => CoordSystem::Beam,
            other => CoordSystem::Unknown(other),
        }
    }
}

/// Hardware configuration record contents (type code 0x05).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HardwareConfig {
    pub serial_number: String,
    pub prolog_id: u8,
    pub prolog_fw_version: String,
    pub config: u16,
    pub frequency: u16,
    pub pic_version: u16,
    pub hw_revision: u16,
    /// Recorder size in bytes (stored on the wire in 65536-byte units).
    pub recorder_size: u32,
    pub status: u16,
    pub fw_version: u32,
}

/// Head configuration record contents (type code 0x04).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HeadConfig {
    pub config: u16,
    pub frequency: u16,
    pub head_type: u16,
    pub serial_number: String,
    /// Raw 176-byte system block; the transformation matrix is carved out of
    /// it but downstream calibration may want the rest.
    pub system: Vec<u8>,
    /// Beam-to-instrument transformation matrix, scaled by 1/4096.
    pub transform_matrix: Array2<f64>,
    pub num_beams: u16,
}

/// Transmit setup carried at the front of the user configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Transmit {
    pub pulse_length: u16,
    pub blank_distance: u16,
    pub receive_length: u16,
    pub time_between_pings: u16,
    pub time_between_bursts: u16,
}

/// User (deployment) configuration record contents (type code 0x00).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserConfig {
    pub transmit: Transmit,
    pub num_pings: u16,
    pub avg_interval: u16,
    pub num_beams: u16,
    pub timing_ctrl_reg: u16,
    pub power_ctrl_reg: u16,
    pub a1: u16,
    pub b0: u16,
    pub b1: u16,
    pub compass_update_rate: u16,
    pub coord_system: CoordSystem,
    pub num_bins: u16,
    pub bin_length: u16,
    pub measurement_interval: u16,
    pub deployment_name: String,
    pub wrap_mode: u16,
    pub clock_deploy: [u16; 3],
    pub diagnostics_interval: u32,
    pub mode0: u16,
    pub adj_sound_speed: u16,
    pub num_samples_diag: u16,
    pub num_beams_cell_diag: u16,
    pub num_pings_diag: u16,
    pub mode_test: u16,
    pub ana_in_addr: u16,
    pub sw_version: u16,
    pub velocity_adjustment_table: Vec<u16>,
    pub comments: String,
    pub mode1: u16,
    pub dyn_perc_pos: u16,
    pub t1w: u16,
    pub t2w: u16,
    pub t3w: u16,
    pub num_samples: u16,
    pub num_bursts: u16,
    pub ana_out_scale: u16,
    pub corr_threshold: u16,
    pub ti_lag2: u16,
    pub qual_const: [u16; 8],
}

/// Accumulated configuration tree, populated by the three configuration
/// records that lead every well-formed file and read-only once data records
/// begin.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub hardware: HardwareConfig,
    pub head: HeadConfig,
    pub user: UserConfig,
    pub kind: InstrumentKind,
    /// Sampling frequency in Hz, derived from the averaging interval.
    pub fs: f64,
}

impl Config {
    /// Assembles the configuration from the three decoded records, deriving
    /// the instrument kind and sampling rate.
    ///
    /// # Errors
    /// [`Error::UnrecognizedFormat`] if the hardware serial prefix names an
    /// unsupported instrument.
    pub fn new(hardware: HardwareConfig, head: HeadConfig, user: UserConfig) -> Result<Self> {
        let prefix: String = hardware
            .serial_number
            .chars()
            .take(3)
            .collect::<String>()
            .to_uppercase();
        let kind = match prefix.as_str() {
            "VEC" => InstrumentKind::Vector,
            "WPR" => InstrumentKind::Awac,
            other => {
                return Err(Error::UnrecognizedFormat(format!(
                    "unsupported instrument serial prefix {other:?}"
                )))
            }
        };
        let fs = 512.0 / f64::from(user.avg_interval.max(1));
        Ok(Config {
            hardware,
            head,
            user,
            kind,
            fs,
        })
    }
}
