//! Time-bucketed file rotation.
//!
//! A day is split into buckets `width` hours wide, starting at midnight.
//! A log file belongs to exactly one (date, bucket) pair and its name
//! carries both.

use chrono::{Datelike, Timelike};

/// Bucket width meaning "one file per day".
pub const FULL_DAY: u32 = 24;

/// First hour of the bucket `hour` falls into: the largest multiple of
/// `width` not exceeding `hour`. Widths that do not divide 24 leave a
/// short last bucket (width 23 puts hour 23 into bucket 23).
pub fn bucket_of(hour: u32, width: u32) -> u32 {
    if width == 0 || width >= FULL_DAY {
        return 0;
    }
    hour - hour % width
}

/// Whether `old` and `now` belong to the same file: same calendar date and
/// same bucket. A date change always rotates, whatever the width.
pub fn same_bucket<T>(old: &T, now: &T, width: u32) -> bool
where
    T: Datelike + Timelike,
{
    old.year() == now.year()
        && old.month() == now.month()
        && old.day() == now.day()
        && bucket_of(old.hour(), width) == bucket_of(now.hour(), width)
}

/// `<service>_<kind>_<YYYY>-<MM>-<DD>_<HH>.log` for the bucket `at` falls
/// into.
pub fn file_name<T>(service: &str, kind: &str, at: &T, width: u32) -> String
where
    T: Datelike + Timelike,
{
    format!(
        "{}_{}_{}-{:02}-{:02}_{:02}.log",
        service,
        kind,
        at.year(),
        at.month(),
        at.day(),
        bucket_of(at.hour(), width)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 30, 0)
            .unwrap()
    }

    #[test]
    fn six_hour_buckets() {
        let expected = [0, 0, 0, 0, 0, 0, 6, 6, 6, 6, 6, 6, 12, 12, 12, 12, 12, 12, 18, 18, 18, 18, 18, 18];
        for (hour, bucket) in expected.iter().enumerate() {
            assert_eq!(bucket_of(hour as u32, 6), *bucket, "hour {hour}");
        }
    }

    #[test]
    fn uneven_width_leaves_short_last_bucket() {
        for hour in 0..23 {
            assert_eq!(bucket_of(hour, 23), 0);
        }
        assert_eq!(bucket_of(23, 23), 23);
        assert_eq!(bucket_of(23, 5), 20);
        assert_eq!(bucket_of(19, 5), 15);
    }

    #[test]
    fn full_day_is_single_bucket() {
        for hour in 0..24 {
            assert_eq!(bucket_of(hour, FULL_DAY), 0);
        }
    }

    #[test]
    fn bucket_never_exceeds_hour_and_is_monotonic() {
        for width in 1..=24 {
            let mut previous = 0;
            for hour in 0..24 {
                let bucket = bucket_of(hour, width);
                assert!(bucket <= hour, "width {width} hour {hour}");
                assert!(bucket >= previous, "width {width} hour {hour}");
                previous = bucket;
            }
        }
    }

    #[test]
    fn date_change_always_rotates() {
        let pairs = [
            (at(2024, 1, 15, 23), at(2024, 1, 16, 23)),
            (at(2024, 1, 31, 10), at(2024, 2, 1, 10)),
            (at(2023, 12, 31, 5), at(2024, 12, 31, 5)),
        ];
        for width in 1..=24 {
            for (old, now) in &pairs {
                assert!(!same_bucket(old, now, width), "width {width}");
            }
        }
    }

    #[test]
    fn same_date_compares_buckets() {
        assert!(same_bucket(&at(2024, 1, 15, 6), &at(2024, 1, 15, 11), 6));
        assert!(!same_bucket(&at(2024, 1, 15, 5), &at(2024, 1, 15, 6), 6));
        assert!(same_bucket(&at(2024, 1, 15, 0), &at(2024, 1, 15, 23), 24));
        assert!(!same_bucket(&at(2024, 1, 15, 0), &at(2024, 1, 15, 1), 1));
    }

    #[test]
    fn file_name_carries_date_and_bucket() {
        assert_eq!(
            file_name("billing", "default", &at(2024, 3, 7, 14), 6),
            "billing_default_2024-03-07_12.log"
        );
        assert_eq!(
            file_name("billing", "query", &at(2024, 3, 7, 14), 24),
            "billing_query_2024-03-07_00.log"
        );
    }
}
