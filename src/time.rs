use chrono::{NaiveDate, NaiveDateTime};

/// Decodes a single BCD byte, per the example program in the Nortek system
/// integrator manual.
pub(crate) fn bcd2char(bcd: u8) -> u8 {
    let bcd = bcd.min(153);
    (bcd & 15) + 10 * (bcd >> 4)
}

fn full_year(year: u8) -> i32 {
    // Two-digit years; the instruments predate 1990.
    if year >= 90 {
        1900 + i32::from(year)
    } else {
        2000 + i32::from(year)
    }
}

/// Decodes the 6-byte BCD clock carried by sysdata, header, and profile
/// records. Byte order is minute, second, day, hour, year, month.
///
/// Returns `None` for field values that do not form a valid date, which
/// happens when a corrupted payload is decoded on a resync path.
pub fn decode_clock(dat: &[u8; 6]) -> Option<NaiveDateTime> {
    let minute = bcd2char(dat[0]);
    let second = bcd2char(dat[1]);
    let day = bcd2char(dat[2]);
    let hour = bcd2char(dat[3]);
    let year = bcd2char(dat[4]);
    let month = bcd2char(dat[5]);
    NaiveDate::from_ymd_opt(full_year(year), u32::from(month), u32::from(day))?
        .and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second))
}

/// Clock words as f64 unix seconds, NaN when the clock does not decode.
pub fn clock_to_unix(dat: &[u8; 6]) -> f64 {
    match decode_clock(dat) {
        Some(dt) => dt.and_utc().timestamp() as f64,
        None => f64::NAN,
    }
}
