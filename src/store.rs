//! Growable columnar storage for decoded data records.
//!
//! Every column shares one length, addressed by the driver's slot cursor.
//! The capacity estimate is a pre-allocation hint only; writes beyond it
//! reallocate rather than drop records.

use ndarray::Array2;

use crate::record::{AhrsData, AwacProfile, ErrorFlags, StatusFlags, VecData, VecSysData};

/// Columns for Vector (ADV) logs.
///
/// Sysdata and AHRS records arrive less often than velocity records, so
/// their columns carry validity indexes (`sys_index`, `ahrs_index`) marking
/// the slots that were actually written; numeric defaults are zero and the
/// float columns default to NaN.
#[derive(Debug, Clone, Default)]
pub struct VectorStore {
    len: usize,

    // sysdata columns
    pub time: Vec<f64>,
    pub battery: Vec<u16>,
    pub sound_speed: Vec<u16>,
    pub heading: Vec<i16>,
    pub pitch: Vec<i16>,
    pub roll: Vec<i16>,
    pub temperature: Vec<u16>,
    pub error: Vec<ErrorFlags>,
    pub status: Vec<StatusFlags>,
    pub ana_in: Vec<u16>,
    pub sys_index: Vec<bool>,

    // velocity columns
    pub ana_in2_lsb: Vec<u8>,
    pub count: Vec<u8>,
    pub pressure_msb: Vec<u8>,
    pub ana_in2_msb: Vec<u8>,
    pub pressure_lsw: Vec<u16>,
    pub ana_in1: Vec<u16>,
    pub vel: [Vec<i16>; 3],
    pub amp: [Vec<u8>; 3],
    pub corr: [Vec<u8>; 3],

    // AHRS columns
    pub accel: Vec<[f32; 3]>,
    pub ang_rate: Vec<[f32; 3]>,
    pub mag: Vec<[f32; 3]>,
    pub orientmat: Vec<Array2<f32>>,
    pub ahrs_index: Vec<bool>,
}

impl VectorStore {
    pub fn with_capacity(cap: usize) -> Self {
        let mut s = VectorStore::default();
        s.reserve(cap);
        s
    }

    fn reserve(&mut self, cap: usize) {
        self.time.reserve(cap);
        self.battery.reserve(cap);
        self.sound_speed.reserve(cap);
        self.heading.reserve(cap);
        self.pitch.reserve(cap);
        self.roll.reserve(cap);
        self.temperature.reserve(cap);
        self.error.reserve(cap);
        self.status.reserve(cap);
        self.ana_in.reserve(cap);
        self.sys_index.reserve(cap);
        self.ana_in2_lsb.reserve(cap);
        self.count.reserve(cap);
        self.pressure_msb.reserve(cap);
        self.ana_in2_msb.reserve(cap);
        self.pressure_lsw.reserve(cap);
        self.ana_in1.reserve(cap);
        for i in 0..3 {
            self.vel[i].reserve(cap);
            self.amp[i].reserve(cap);
            self.corr[i].reserve(cap);
        }
        self.accel.reserve(cap);
        self.ang_rate.reserve(cap);
        self.mag.reserve(cap);
        self.orientmat.reserve(cap);
        self.ahrs_index.reserve(cap);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Extends every column to length `n` with defaults. A no-op if the
    /// store is already that long.
    pub fn grow_to(&mut self, n: usize) {
        if n <= self.len {
            return;
        }
        self.time.resize(n, f64::NAN);
        self.battery.resize(n, 0);
        self.sound_speed.resize(n, 0);
        self.heading.resize(n, 0);
        self.pitch.resize(n, 0);
        self.roll.resize(n, 0);
        self.temperature.resize(n, 0);
        self.error.resize(n, ErrorFlags::default());
        self.status.resize(n, StatusFlags::default());
        self.ana_in.resize(n, 0);
        self.sys_index.resize(n, false);
        self.ana_in2_lsb.resize(n, 0);
        self.count.resize(n, 0);
        self.pressure_msb.resize(n, 0);
        self.ana_in2_msb.resize(n, 0);
        self.pressure_lsw.resize(n, 0);
        self.ana_in1.resize(n, 0);
        for i in 0..3 {
            self.vel[i].resize(n, 0);
            self.amp[i].resize(n, 0);
            self.corr[i].resize(n, 0);
        }
        self.accel.resize(n, [f32::NAN; 3]);
        self.ang_rate.resize(n, [f32::NAN; 3]);
        self.mag.resize(n, [f32::NAN; 3]);
        self.orientmat
            .resize(n, Array2::from_elem((3, 3), f32::NAN));
        self.ahrs_index.resize(n, false);
        self.len = n;
    }

    /// Trims every column to the number of slots actually written.
    pub fn truncate(&mut self, n: usize) {
        if n >= self.len {
            return;
        }
        self.time.truncate(n);
        self.battery.truncate(n);
        self.sound_speed.truncate(n);
        self.heading.truncate(n);
        self.pitch.truncate(n);
        self.roll.truncate(n);
        self.temperature.truncate(n);
        self.error.truncate(n);
        self.status.truncate(n);
        self.ana_in.truncate(n);
        self.sys_index.truncate(n);
        self.ana_in2_lsb.truncate(n);
        self.count.truncate(n);
        self.pressure_msb.truncate(n);
        self.ana_in2_msb.truncate(n);
        self.pressure_lsw.truncate(n);
        self.ana_in1.truncate(n);
        for i in 0..3 {
            self.vel[i].truncate(n);
            self.amp[i].truncate(n);
            self.corr[i].truncate(n);
        }
        self.accel.truncate(n);
        self.ang_rate.truncate(n);
        self.mag.truncate(n);
        self.orientmat.truncate(n);
        self.ahrs_index.truncate(n);
        self.len = n;
    }

    pub fn set_sysdata(&mut self, i: usize, d: &VecSysData) {
        self.time[i] = d.time;
        self.battery[i] = d.battery;
        self.sound_speed[i] = d.sound_speed;
        self.heading[i] = d.heading;
        self.pitch[i] = d.pitch;
        self.roll[i] = d.roll;
        self.temperature[i] = d.temperature;
        self.error[i] = d.error;
        self.status[i] = d.status;
        self.ana_in[i] = d.ana_in;
        self.sys_index[i] = true;
    }

    pub fn set_vecdata(&mut self, i: usize, d: &VecData) {
        self.ana_in2_lsb[i] = d.ana_in2_lsb;
        self.count[i] = d.count;
        self.pressure_msb[i] = d.pressure_msb;
        self.ana_in2_msb[i] = d.ana_in2_msb;
        self.pressure_lsw[i] = d.pressure_lsw;
        self.ana_in1[i] = d.ana_in1;
        for b in 0..3 {
            self.vel[b][i] = d.vel[b];
            self.amp[b][i] = d.amp[b];
            self.corr[b][i] = d.corr[b];
        }
    }

    pub fn set_ahrs(&mut self, i: usize, d: &AhrsData) {
        self.accel[i] = d.accel;
        self.ang_rate[i] = d.ang_rate;
        self.mag[i] = d.mag;
        self.orientmat[i] = d.orientmat.clone();
        self.ahrs_index[i] = true;
    }

    /// Unscaled pressure for slot `i` from the raw MSB/LSW pair.
    pub fn pressure_raw(&self, i: usize) -> u32 {
        u32::from(self.pressure_msb[i]) * 65536 + u32::from(self.pressure_lsw[i])
    }
}

/// Columns for AWAC profiler logs. One profile record per slot.
#[derive(Debug, Clone, Default)]
pub struct AwacStore {
    len: usize,

    pub time: Vec<f64>,
    pub error: Vec<u16>,
    pub ana_in1: Vec<u16>,
    pub battery: Vec<u16>,
    pub sound_speed: Vec<u16>,
    pub heading: Vec<u16>,
    pub pitch: Vec<u16>,
    pub roll: Vec<u16>,
    pub pressure_msb: Vec<u8>,
    pub status: Vec<StatusFlags>,
    pub pressure_lsw: Vec<u16>,
    pub temperature: Vec<u16>,
    /// Per-slot velocity pages, each shaped (3, num_bins).
    pub vel: Vec<Array2<i16>>,
    /// Per-slot amplitude pages, each shaped (3, num_bins).
    pub amp: Vec<Array2<u8>>,

    num_bins: usize,
}

impl AwacStore {
    pub fn with_capacity(cap: usize, num_bins: usize) -> Self {
        let mut s = AwacStore {
            num_bins,
            ..AwacStore::default()
        };
        s.time.reserve(cap);
        s.vel.reserve(cap);
        s.amp.reserve(cap);
        s
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn grow_to(&mut self, n: usize) {
        if n <= self.len {
            return;
        }
        self.time.resize(n, f64::NAN);
        self.error.resize(n, 0);
        self.ana_in1.resize(n, 0);
        self.battery.resize(n, 0);
        self.sound_speed.resize(n, 0);
        self.heading.resize(n, 0);
        self.pitch.resize(n, 0);
        self.roll.resize(n, 0);
        self.pressure_msb.resize(n, 0);
        self.status.resize(n, StatusFlags::default());
        self.pressure_lsw.resize(n, 0);
        self.temperature.resize(n, 0);
        self.vel.resize(n, Array2::zeros((3, self.num_bins)));
        self.amp.resize(n, Array2::zeros((3, self.num_bins)));
        self.len = n;
    }

    pub fn truncate(&mut self, n: usize) {
        if n >= self.len {
            return;
        }
        self.time.truncate(n);
        self.error.truncate(n);
        self.ana_in1.truncate(n);
        self.battery.truncate(n);
        self.sound_speed.truncate(n);
        self.heading.truncate(n);
        self.pitch.truncate(n);
        self.roll.truncate(n);
        self.pressure_msb.truncate(n);
        self.status.truncate(n);
        self.pressure_lsw.truncate(n);
        self.temperature.truncate(n);
        self.vel.truncate(n);
        self.amp.truncate(n);
        self.len = n;
    }

    pub fn set_profile(&mut self, i: usize, d: &AwacProfile) {
        self.time[i] = d.time;
        self.error[i] = d.error;
        self.ana_in1[i] = d.ana_in1;
        self.battery[i] = d.battery;
        self.sound_speed[i] = d.sound_speed;
        self.heading[i] = d.heading;
        self.pitch[i] = d.pitch;
        self.roll[i] = d.roll;
        self.pressure_msb[i] = d.pressure_msb;
        self.status[i] = d.status;
        self.pressure_lsw[i] = d.pressure_lsw;
        self.temperature[i] = d.temperature;
        self.vel[i] = d.vel.clone();
        self.amp[i] = d.amp.clone();
    }

    pub fn pressure_raw(&self, i: usize) -> u32 {
        u32::from(self.pressure_msb[i]) * 65536 + u32::from(self.pressure_lsw[i])
    }
}

/// Decoded data arrays for either instrument layout.
#[derive(Debug, Clone)]
pub enum DataStore {
    Vector(VectorStore),
    Awac(AwacStore),
}

impl DataStore {
    pub fn len(&self) -> usize {
        match self {
            DataStore::Vector(s) => s.len(),
            DataStore::Awac(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn grow_to(&mut self, n: usize) {
        match self {
            DataStore::Vector(s) => s.grow_to(n),
            DataStore::Awac(s) => s.grow_to(n),
        }
    }

    pub fn truncate(&mut self, n: usize) {
        match self {
            DataStore::Vector(s) => s.truncate(n),
            DataStore::Awac(s) => s.truncate(n),
        }
    }

    pub fn as_vector(&self) -> Option<&VectorStore> {
        match self {
            DataStore::Vector(s) => Some(s),
            DataStore::Awac(_) => None,
        }
    }

    pub fn as_awac(&self) -> Option<&AwacStore> {
        match self {
            DataStore::Awac(s) => Some(s),
            DataStore::Vector(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grow_keeps_columns_in_step() {
        let mut s = VectorStore::with_capacity(4);
        s.grow_to(6);
        assert_eq!(s.len(), 6);
        assert_eq!(s.time.len(), 6);
        assert_eq!(s.vel[2].len(), 6);
        assert_eq!(s.orientmat.len(), 6);
        assert!(s.time[0].is_nan());
        assert!(!s.sys_index[5]);
    }

    #[test]
    fn growth_past_capacity_hint() {
        let mut s = VectorStore::with_capacity(2);
        s.grow_to(100);
        assert_eq!(s.len(), 100);
        assert_eq!(s.ahrs_index.len(), 100);
    }

    #[test]
    fn truncate_trims_every_column() {
        let mut s = VectorStore::with_capacity(8);
        s.grow_to(8);
        s.truncate(3);
        assert_eq!(s.len(), 3);
        assert_eq!(s.battery.len(), 3);
        assert_eq!(s.corr[1].len(), 3);
    }

    #[test]
    fn sysdata_marks_index() {
        let mut s = VectorStore::with_capacity(1);
        s.grow_to(1);
        let d = crate::record::VecSysData {
            time: 123.0,
            battery: 9,
            sound_speed: 1500,
            heading: 100,
            pitch: -5,
            roll: 3,
            temperature: 2000,
            error: ErrorFlags(0),
            status: StatusFlags(1),
            ana_in: 0,
        };
        s.set_sysdata(0, &d);
        assert!(s.sys_index[0]);
        assert_eq!(s.time[0], 123.0);
        assert!(s.status[0].orientation_down());
    }

    #[test]
    fn awac_pages_sized_by_bins() {
        let mut s = AwacStore::with_capacity(2, 5);
        s.grow_to(2);
        assert_eq!(s.vel[0].dim(), (3, 5));
        assert_eq!(s.amp[1].dim(), (3, 5));
        s.truncate(1);
        assert_eq!(s.len(), 1);
    }
}
