//! Synthetic stream construction for the integration tests.

use nortek::bytes::Endian;
use nortek::checksum::checksum;

pub const SYNC: u8 = 0xa5;

pub fn w16(endian: Endian, v: u16) -> [u8; 2] {
    match endian {
        Endian::Little => v.to_le_bytes(),
        Endian::Big => v.to_be_bytes(),
    }
}

pub fn put16(dat: &mut [u8], off: usize, endian: Endian, v: u16) {
    dat[off..off + 2].copy_from_slice(&w16(endian, v));
}

pub fn put_i16(dat: &mut [u8], off: usize, endian: Endian, v: i16) {
    put16(dat, off, endian, v as u16);
}

pub fn put_f32(dat: &mut [u8], off: usize, endian: Endian, v: f32) {
    let b = match endian {
        Endian::Little => v.to_bits().to_le_bytes(),
        Endian::Big => v.to_bits().to_be_bytes(),
    };
    dat[off..off + 4].copy_from_slice(&b);
}

pub struct StreamBuilder {
    pub endian: Endian,
    buf: Vec<u8>,
}

impl StreamBuilder {
    pub fn new(endian: Endian) -> Self {
        StreamBuilder {
            endian,
            buf: Vec::new(),
        }
    }

    /// Appends a framed record: header, payload, valid checksum word.
    pub fn push_record(&mut self, code: u8, payload: &[u8]) {
        let header = [SYNC, code];
        let ck = checksum(self.endian, header, payload);
        self.buf.extend_from_slice(&header);
        self.buf.extend_from_slice(payload);
        self.buf.extend_from_slice(&w16(self.endian, ck));
    }

    pub fn push_raw(&mut self, dat: &[u8]) {
        self.buf.extend_from_slice(dat);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Payload with the leading size word set to the full record word count.
fn sized_payload(endian: Endian, len: usize) -> Vec<u8> {
    let mut dat = vec![0u8; len];
    put16(&mut dat, 0, endian, ((len + 4) / 2) as u16);
    dat
}

pub fn hardware_payload(endian: Endian, serial: &str) -> Vec<u8> {
    let mut dat = sized_payload(endian, 44);
    dat[2..2 + serial.len()].copy_from_slice(serial.as_bytes());
    put16(&mut dat, 18, endian, 6000); // frequency
    dat
}

pub fn head_payload(endian: Endian) -> Vec<u8> {
    let mut dat = sized_payload(endian, 220);
    dat[8..12].copy_from_slice(b"H123");
    // Identity transformation matrix, diagonal stored as 4096.
    for i in [0usize, 4, 8] {
        put_i16(&mut dat, 28 + 2 * i, endian, 4096);
    }
    put16(&mut dat, 218, endian, 3);
    dat
}

pub fn user_payload(endian: Endian, avg_interval: u16, num_bins: u16) -> Vec<u8> {
    let mut dat = sized_payload(endian, 508);
    put16(&mut dat, 14, endian, avg_interval);
    put16(&mut dat, 32, endian, num_bins);
    dat
}

/// A valid BCD clock for 2012-06-12 08:30:15.
pub const CLOCK: [u8; 6] = [0x30, 0x15, 0x12, 0x08, 0x12, 0x06];

pub fn sysdata_payload(endian: Endian, battery: u16, heading: i16, status: u8) -> Vec<u8> {
    let mut dat = sized_payload(endian, 24);
    dat[2..8].copy_from_slice(&CLOCK);
    put16(&mut dat, 8, endian, battery);
    put16(&mut dat, 10, endian, 1500); // sound speed
    put_i16(&mut dat, 12, endian, heading);
    dat[21] = status;
    dat
}

pub fn vecdata_payload(endian: Endian, count: u8, vel: [i16; 3]) -> Vec<u8> {
    let mut dat = vec![0u8; 20];
    dat[1] = count;
    for (i, v) in vel.iter().enumerate() {
        put_i16(&mut dat, 8 + 2 * i, endian, *v);
    }
    dat
}

pub fn ahrs_payload(endian: Endian, accel: [f32; 3]) -> Vec<u8> {
    let mut dat = sized_payload(endian, 4 + 78);
    dat[3] = 0xcc;
    for (i, a) in accel.iter().enumerate() {
        put_f32(&mut dat, 4 + 4 * i, endian, *a);
    }
    // Identity orientation matrix.
    for i in 0..3 {
        put_f32(&mut dat, 4 + 4 * (9 + 3 * i + i), endian, 1.0);
    }
    dat
}

pub fn awac_profile_payload(endian: Endian, num_bins: usize, battery: u16) -> Vec<u8> {
    let len = 116 + 9 * num_bins + num_bins % 2;
    let mut dat = sized_payload(endian, len);
    dat[2..8].copy_from_slice(&CLOCK);
    put16(&mut dat, 12, endian, battery);
    for bin in 0..num_bins {
        // beam 0 velocities ramp with the bin index
        put_i16(&mut dat, 116 + 2 * bin, endian, 10 * bin as i16);
        dat[116 + 6 * num_bins + bin] = 100 + bin as u8;
    }
    dat
}

/// Builder pre-loaded with a Vector configuration phase
/// (avg_interval 32, so fs = 16 Hz).
pub fn vector_stream(endian: Endian) -> StreamBuilder {
    let mut b = StreamBuilder::new(endian);
    b.push_record(0x05, &hardware_payload(endian, "VEC 8181"));
    b.push_record(0x04, &head_payload(endian));
    b.push_record(0x00, &user_payload(endian, 32, 0));
    b
}

/// Builder pre-loaded with an AWAC configuration phase.
pub fn awac_stream(endian: Endian, num_bins: u16) -> StreamBuilder {
    let mut b = StreamBuilder::new(endian);
    b.push_record(0x05, &hardware_payload(endian, "WPR 0401"));
    b.push_record(0x04, &head_payload(endian));
    b.push_record(0x00, &user_payload(endian, 60, num_bins));
    b
}
