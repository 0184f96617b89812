use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime};

pub type JulianDay = f64;

/// Julian day of the Unix epoch, 1970-01-01T00:00 UT.
const UNIX_EPOCH_JD: JulianDay = 2440587.5;
/// Days between the chrono CE day count and the Julian day number.
const CE_TO_JDN: i64 = 1721425;
const J2000: JulianDay = 2451545.0;
const TROPICAL_YEAR_DAYS: f64 = 365.242189;

// Utility Functions
pub fn date_to_julian_day(date_time: NaiveDateTime) -> JulianDay {
    let utc = date_time.and_utc();
    let seconds = utc.timestamp() as f64 + utc.timestamp_subsec_nanos() as f64 / 1_000_000_000.0;
    UNIX_EPOCH_JD + seconds / 86400.0
}

pub fn julian_day_to_date(jd: JulianDay) -> Option<NaiveDateTime> {
    let millis = ((jd - UNIX_EPOCH_JD) * 86_400_000.0).round() as i64;
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Integer Julian day number of a civil (proleptic Gregorian) date.
pub fn julian_day_number(date: NaiveDate) -> i64 {
    date.num_days_from_ce() as i64 + CE_TO_JDN
}

/// Apparent geocentric ecliptic longitude of the Sun in degrees, [0, 360).
///
/// Low-precision solar theory (Meeus, Astronomical Algorithms ch. 25):
/// good to about 0.01 degree, which places a solar term within a quarter hour.
pub fn sun_apparent_longitude(jd: JulianDay) -> f64 {
    let t = (jd - J2000) / 36525.0;
    let l0 = 280.46646 + 36000.76983 * t + 0.0003032 * t * t;
    let m = (357.52911 + 35999.05029 * t - 0.0001537 * t * t).to_radians();
    let c = (1.914602 - 0.004817 * t - 0.000014 * t * t) * m.sin()
        + (0.019993 - 0.000101 * t) * (2.0 * m).sin()
        + 0.000289 * (3.0 * m).sin();
    let omega = (125.04 - 1934.136 * t).to_radians();
    let apparent = l0 + c - 0.00569 - 0.00478 * omega.sin();
    apparent.rem_euclid(360.0)
}

/// Signed difference `target - actual` folded into (-180, 180].
fn longitude_gap(target: f64, actual: f64) -> f64 {
    let gap = (target - actual).rem_euclid(360.0);
    if gap > 180.0 {
        gap - 360.0
    } else {
        gap
    }
}

/// Julian day (UT) at which the Sun reaches `target_longitude`, searching
/// from the initial guess `near`. Newton steps on the mean solar motion.
pub fn find_solar_longitude(target_longitude: f64, near: JulianDay) -> JulianDay {
    let mut jd = near;
    for _ in 0..50 {
        let gap = longitude_gap(target_longitude, sun_apparent_longitude(jd));
        let step = gap * TROPICAL_YEAR_DAYS / 360.0;
        jd += step;
        if step.abs() < 1e-7 {
            break;
        }
    }
    jd
}

/// Local wall-clock instant at which the Sun reaches `target_longitude`
/// within Gregorian `year`. `approx_day_of_year` seeds the search.
pub fn solar_longitude_instant(
    year: i32,
    target_longitude: f64,
    approx_day_of_year: u32,
    utc_offset_minutes: i32,
) -> Option<NaiveDateTime> {
    let seed = NaiveDate::from_yo_opt(year, approx_day_of_year.clamp(1, 365))?.and_hms_opt(0, 0, 0)?;
    let jd = find_solar_longitude(target_longitude, date_to_julian_day(seed));
    let utc = julian_day_to_date(jd)?;
    let local = utc + ChronoDuration::minutes(utc_offset_minutes as i64);
    // Drop seconds so generated tables match minute-resolution data files.
    local.date().and_hms_opt(chrono::Timelike::hour(&local), chrono::Timelike::minute(&local), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn test_julian_day_round_trip() {
        let j2000 = at(2000, 1, 1, 12, 0);
        assert_relative_eq!(date_to_julian_day(j2000), 2451545.0, epsilon = 1e-9);
        let back = julian_day_to_date(2451545.0).unwrap();
        assert_eq!(back, j2000);
    }

    #[test]
    fn test_julian_day_number() {
        assert_eq!(julian_day_number(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()), 2451545);
        assert_eq!(julian_day_number(NaiveDate::from_ymd_opt(1858, 11, 17).unwrap()), 2400001);
        // Proleptic dates before the common era still count continuously.
        let before = julian_day_number(NaiveDate::from_ymd_opt(-100, 3, 1).unwrap());
        let after = julian_day_number(NaiveDate::from_ymd_opt(-100, 3, 2).unwrap());
        assert_eq!(after - before, 1);
    }

    #[test]
    fn test_sun_longitude_at_equinox() {
        // March equinox 2024: 2024-03-20 03:06 UT.
        let jd = date_to_julian_day(at(2024, 3, 20, 3, 6));
        let longitude = sun_apparent_longitude(jd);
        let gap = longitude_gap(0.0, longitude);
        assert!(gap.abs() < 0.02, "gap was {}", gap);
    }

    #[test]
    fn test_start_of_spring_2024() {
        // 입춘 2024 fell at 17:27 KST on February 4.
        let instant = solar_longitude_instant(2024, 315.0, 35, 540).unwrap();
        let expected = at(2024, 2, 4, 17, 27);
        let drift = (instant - expected).num_minutes().abs();
        assert!(drift <= 20, "drift was {} minutes", drift);
    }

    #[test]
    fn test_longitude_gap_wraps() {
        assert_relative_eq!(longitude_gap(5.0, 355.0), 10.0, epsilon = 1e-9);
        assert_relative_eq!(longitude_gap(355.0, 5.0), -10.0, epsilon = 1e-9);
    }
}
