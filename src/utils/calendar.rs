//! Regional (Solar Hijri) calendar arithmetic.
//!
//! Attendance records are partitioned by a `YYYY/MM/DD` day key in the
//! institutional calendar, while check-in/check-out stay UTC instants.
//! Conversion uses the standard 33-year-cycle arithmetic.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Timelike, Utc};

use crate::error::AppError;

const G_DAYS_IN_MONTH: [i32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const J_DAYS_IN_MONTH: [i32; 12] = [31, 31, 31, 31, 31, 31, 30, 30, 30, 30, 30, 29];

fn gregorian_is_leap(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn gregorian_to_jalali(gy: i32, gm: u32, gd: u32) -> (i32, u32, u32) {
    let gy2 = gy - 1600;
    let gm2 = gm as i32 - 1;
    let gd2 = gd as i32 - 1;

    let mut g_day_no = 365 * gy2 + (gy2 + 3) / 4 - (gy2 + 99) / 100 + (gy2 + 399) / 400;
    for month in 0..gm2 as usize {
        g_day_no += G_DAYS_IN_MONTH[month];
    }
    if gm2 > 1 && gregorian_is_leap(gy) {
        g_day_no += 1;
    }
    g_day_no += gd2;

    let mut j_day_no = g_day_no - 79;
    let j_np = j_day_no / 12053;
    j_day_no %= 12053;

    let mut jy = 979 + 33 * j_np + 4 * (j_day_no / 1461);
    j_day_no %= 1461;

    if j_day_no >= 366 {
        jy += (j_day_no - 1) / 365;
        j_day_no = (j_day_no - 1) % 365;
    }

    let mut jm = 0usize;
    while jm < 11 && j_day_no >= J_DAYS_IN_MONTH[jm] {
        j_day_no -= J_DAYS_IN_MONTH[jm];
        jm += 1;
    }

    (jy, jm as u32 + 1, j_day_no as u32 + 1)
}

pub fn jalali_to_gregorian(jy: i32, jm: u32, jd: u32) -> (i32, u32, u32) {
    let jy2 = jy - 979;
    let mut j_day_no = 365 * jy2 + (jy2 / 33) * 8 + ((jy2 % 33) + 3) / 4;
    for month in 0..(jm as usize - 1) {
        j_day_no += J_DAYS_IN_MONTH[month];
    }
    j_day_no += jd as i32 - 1;

    let mut g_day_no = j_day_no + 79;

    let mut gy = 1600 + 400 * (g_day_no / 146097);
    g_day_no %= 146097;

    let mut leap = true;
    if g_day_no >= 36525 {
        g_day_no -= 1;
        gy += 100 * (g_day_no / 36524);
        g_day_no %= 36524;
        if g_day_no >= 365 {
            g_day_no += 1;
        } else {
            leap = false;
        }
    }

    gy += 4 * (g_day_no / 1461);
    g_day_no %= 1461;

    if g_day_no >= 366 {
        leap = false;
        g_day_no -= 1;
        gy += g_day_no / 365;
        g_day_no %= 365;
    }

    let mut gm = 0usize;
    loop {
        let len = G_DAYS_IN_MONTH[gm] + if gm == 1 && leap { 1 } else { 0 };
        if g_day_no < len {
            break;
        }
        g_day_no -= len;
        gm += 1;
    }

    (gy, gm as u32 + 1, g_day_no as u32 + 1)
}

pub fn format_day_key(jy: i32, jm: u32, jd: u32) -> String {
    format!("{jy:04}/{jm:02}/{jd:02}")
}

/// Parses a `YYYY/MM/DD` day key; month and day ranges are checked.
pub fn parse_day_key(key: &str) -> Result<(i32, u32, u32), AppError> {
    let parts: Vec<&str> = key.split('/').collect();
    let invalid = || AppError::validation(format!("Invalid calendar date: {key}"));
    if parts.len() != 3 {
        return Err(invalid());
    }
    let jy: i32 = parts[0].parse().map_err(|_| invalid())?;
    let jm: u32 = parts[1].parse().map_err(|_| invalid())?;
    let jd: u32 = parts[2].parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&jm) || jd < 1 || jd as i32 > month_length(jy, jm) {
        return Err(invalid());
    }
    Ok((jy, jm, jd))
}

/// Days in a regional month; the 12th month gains a day in leap years.
pub fn month_length(jy: i32, jm: u32) -> i32 {
    if jm == 12 && is_jalali_leap(jy) {
        30
    } else {
        J_DAYS_IN_MONTH[jm as usize - 1]
    }
}

pub fn is_jalali_leap(jy: i32) -> bool {
    // Leap iff the arithmetic new-year offset advances between jy and jy+1.
    let days = |y: i32| {
        let y2 = y - 979;
        365 * y2 + (y2 / 33) * 8 + ((y2 % 33) + 3) / 4
    };
    days(jy + 1) - days(jy) == 366
}

/// Calendar-day key for an instant, evaluated in institutional local time.
pub fn day_key(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = instant.with_timezone(&offset);
    let (jy, jm, jd) = gregorian_to_jalali(local.year(), local.month(), local.day());
    format_day_key(jy, jm, jd)
}

pub fn today_key(offset: FixedOffset) -> String {
    day_key(Utc::now(), offset)
}

/// Local time-of-day of an instant, for lateness evaluation.
pub fn local_time(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveTime {
    instant.with_timezone(&offset).time()
}

/// Local `HH:MM` rendering of an instant.
pub fn local_hhmm(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = instant.with_timezone(&offset);
    format!("{:02}:{:02}", local.hour(), local.minute())
}

/// Inclusive first/last day keys of a regional month.
pub fn month_bounds(jy: i32, jm: u32) -> Result<(String, String), AppError> {
    if !(1..=12).contains(&jm) {
        return Err(AppError::validation(format!("Invalid month: {jm}")));
    }
    let first = format_day_key(jy, jm, 1);
    let last = format_day_key(jy, jm, month_length(jy, jm) as u32);
    Ok((first, last))
}

pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes * 60).expect("local offset out of range")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn known_conversion_vectors() {
        // Nowruz 1403 and the Unix epoch are well-documented anchors.
        assert_eq!(gregorian_to_jalali(2024, 3, 20), (1403, 1, 1));
        assert_eq!(gregorian_to_jalali(1970, 1, 1), (1348, 10, 11));
        // 1403 is a leap year, so its last day is the 30th of month 12.
        assert_eq!(gregorian_to_jalali(2025, 3, 20), (1403, 12, 30));
        assert_eq!(gregorian_to_jalali(2025, 3, 21), (1404, 1, 1));
    }

    #[test]
    fn reverse_conversion_vectors() {
        assert_eq!(jalali_to_gregorian(1403, 1, 1), (2024, 3, 20));
        assert_eq!(jalali_to_gregorian(1348, 10, 11), (1970, 1, 1));
        assert_eq!(jalali_to_gregorian(1403, 12, 30), (2025, 3, 20));
    }

    #[test]
    fn round_trip_across_a_decade() {
        for year in 2016..=2026 {
            for (month, day) in [(1, 1), (3, 21), (7, 4), (12, 31)] {
                let (jy, jm, jd) = gregorian_to_jalali(year, month, day);
                assert_eq!(jalali_to_gregorian(jy, jm, jd), (year, month, day));
            }
        }
    }

    #[test]
    fn leap_years_in_the_33_year_cycle() {
        assert!(is_jalali_leap(1403));
        assert!(!is_jalali_leap(1404));
        assert_eq!(month_length(1403, 12), 30);
        assert_eq!(month_length(1404, 12), 29);
        assert_eq!(month_length(1404, 6), 31);
        assert_eq!(month_length(1404, 7), 30);
    }

    #[test]
    fn day_key_respects_local_offset() {
        // 21:30 UTC on Mar 19 is already Mar 20 at +03:30.
        let instant = Utc.with_ymd_and_hms(2024, 3, 19, 21, 30, 0).unwrap();
        let offset = offset_from_minutes(210);
        assert_eq!(day_key(instant, offset), "1403/01/01");
        assert_eq!(local_time(instant, offset), NaiveTime::from_hms_opt(1, 0, 0).unwrap());
        assert_eq!(local_hhmm(instant, offset), "01:00");
    }

    #[test]
    fn month_bounds_are_inclusive_strings() {
        let (first, last) = month_bounds(1403, 12).unwrap();
        assert_eq!(first, "1403/12/01");
        assert_eq!(last, "1403/12/30");
        assert!(month_bounds(1403, 13).is_err());
    }

    #[test]
    fn parse_day_key_validates() {
        assert_eq!(parse_day_key("1403/05/01").unwrap(), (1403, 5, 1));
        assert!(parse_day_key("1403-05-01").is_err());
        assert!(parse_day_key("1404/12/30").is_err());
        assert!(parse_day_key("garbage").is_err());
    }
}
