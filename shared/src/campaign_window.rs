//! Campaign date window.
//!
//! Creators type campaign dates by hand, so only unambiguous shapes are
//! accepted: day-first `D-M-YY(YY)` and ISO `YYYY-M-D`, with `-`, `.` or `/`
//! as separators. Month-first US dates are rejected.

use chrono::{DateTime, Datelike, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::UnixTimeMs;

/// Two-digit years at or above this pivot are read as 19xx, below as 20xx.
pub const TWO_DIGIT_YEAR_PIVOT: i32 = 70;

const SEPARATORS: [char; 3] = ['-', '.', '/'];

/// Parses a hand-written campaign date. Returns `None` for anything that is
/// not a real calendar day in one of the accepted shapes.
#[must_use]
pub fn parse(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let parts: Vec<&str> = s.split(SEPARATORS).collect();
    let [a, b, c] = parts.as_slice() else {
        return None;
    };
    if ![a, b, c].iter().all(|p| !p.is_empty() && p.bytes().all(|ch| ch.is_ascii_digit())) {
        return None;
    }

    let (year, month, day) = if a.len() == 4 && (1..=2).contains(&b.len()) && (1..=2).contains(&c.len()) {
        (a.parse::<i32>().ok()?, b.parse::<u32>().ok()?, c.parse::<u32>().ok()?)
    } else if (1..=2).contains(&a.len()) && (1..=2).contains(&b.len()) && matches!(c.len(), 2 | 4) {
        let year = expand_year(c.parse::<i32>().ok()?);
        (year, b.parse::<u32>().ok()?, a.parse::<u32>().ok()?)
    } else {
        return None;
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

fn expand_year(year: i32) -> i32 {
    match year {
        0..=99 if year >= TWO_DIGIT_YEAR_PIVOT => 1900 + year,
        0..=99 => 2000 + year,
        _ => year,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryKind {
    Start,
    End,
}

/// An inclusive edge of the campaign window, pinned to local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignBoundary {
    date: NaiveDate,
    kind: BoundaryKind,
    at: DateTime<Local>,
}

impl CampaignBoundary {
    /// First instant of `date`: `00:00:00.000` local.
    #[must_use]
    pub fn start_of(date: NaiveDate) -> Self {
        Self::new(date, BoundaryKind::Start, NaiveTime::MIN)
    }

    /// Last instant of `date`: `23:59:59.999` local.
    #[must_use]
    pub fn end_of(date: NaiveDate) -> Self {
        let last_ms = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        Self::new(date, BoundaryKind::End, last_ms)
    }

    fn new(date: NaiveDate, kind: BoundaryKind, time: NaiveTime) -> Self {
        let naive = NaiveDateTime::new(date, time);
        Self {
            date,
            kind,
            at: resolve_local(naive),
        }
    }

    #[must_use]
    pub fn parse_start(raw: &str) -> Option<Self> {
        parse(raw).map(Self::start_of)
    }

    #[must_use]
    pub fn parse_end(raw: &str) -> Option<Self> {
        parse(raw).map(Self::end_of)
    }

    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub const fn kind(&self) -> BoundaryKind {
        self.kind
    }

    #[must_use]
    pub fn local_time(&self) -> NaiveTime {
        self.at.time()
    }

    #[must_use]
    pub fn timestamp_ms(&self) -> i64 {
        self.at.timestamp_millis()
    }

    #[must_use]
    pub fn is_later_than(&self, now: UnixTimeMs) -> bool {
        now.as_signed_millis() < self.timestamp_ms()
    }

    #[must_use]
    pub fn is_earlier_than(&self, now: UnixTimeMs) -> bool {
        now.as_signed_millis() > self.timestamp_ms()
    }

    /// `March 5th`, with the ordinal taken from the day alone (21 → `21th`).
    #[must_use]
    pub fn month_day(&self) -> String {
        let day = self.at.day();
        format!("{} {day}{}", self.at.format("%B"), ordinal_suffix(day))
    }

    /// `12:00 AM` / `11:59 PM`.
    #[must_use]
    pub fn clock_time(&self) -> String {
        self.at.format("%I:%M %p").to_string()
    }
}

/// DST gaps have no local midnight; take the earliest valid mapping, then
/// fall back to reading the wall time as UTC.
fn resolve_local(naive: NaiveDateTime) -> DateTime<Local> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(at) => at,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => Local.from_utc_datetime(&naive),
    }
}

const fn ordinal_suffix(day: u32) -> &'static str {
    match day {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// The window a dispenser accepts claims in. Either edge may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignWindow {
    pub start: Option<CampaignBoundary>,
    pub end: Option<CampaignBoundary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCheck {
    Open,
    NotStarted(CampaignBoundary),
    Ended(CampaignBoundary),
}

impl CampaignWindow {
    #[must_use]
    pub fn new(start: Option<CampaignBoundary>, end: Option<CampaignBoundary>) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn check(&self, now: UnixTimeMs) -> WindowCheck {
        if let Some(start) = self.start.filter(|s| s.is_later_than(now)) {
            return WindowCheck::NotStarted(start);
        }
        if let Some(end) = self.end.filter(|e| e.is_earlier_than(now)) {
            return WindowCheck::Ended(end);
        }
        WindowCheck::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_day_first_and_iso_agree() {
            assert_eq!(parse("05-03-2024"), Some(ymd(2024, 3, 5)));
            assert_eq!(parse("2024-03-05"), Some(ymd(2024, 3, 5)));
        }

        #[test]
        fn test_separators_and_single_digits() {
            assert_eq!(parse("5.3.2024"), Some(ymd(2024, 3, 5)));
            assert_eq!(parse("5/3/2024"), Some(ymd(2024, 3, 5)));
            assert_eq!(parse("2024/3/5"), Some(ymd(2024, 3, 5)));
            assert_eq!(parse("  2024.03.05 "), Some(ymd(2024, 3, 5)));
        }

        #[test]
        fn test_two_digit_years() {
            assert_eq!(parse("01-01-70"), Some(ymd(1970, 1, 1)));
            assert_eq!(parse("31-12-99"), Some(ymd(1999, 12, 31)));
            assert_eq!(parse("01-01-00"), Some(ymd(2000, 1, 1)));
            assert_eq!(parse("15-06-69"), Some(ymd(2069, 6, 15)));
        }

        #[test]
        fn test_rejects_impossible_dates() {
            assert_eq!(parse("31-02-2024"), None);
            assert_eq!(parse("31-04-2024"), None);
            assert_eq!(parse("29-02-2023"), None);
            assert_eq!(parse("00-01-2024"), None);
            assert_eq!(parse("01-13-2024"), None);
            assert_eq!(parse("29-02-2024"), Some(ymd(2024, 2, 29)));
        }

        #[test]
        fn test_rejects_other_shapes() {
            assert_eq!(parse(""), None);
            assert_eq!(parse("tomorrow"), None);
            assert_eq!(parse("2024-03"), None);
            assert_eq!(parse("05-03-024"), None);
            assert_eq!(parse("005-03-2024"), None);
            assert_eq!(parse("2024-03-05T10:00"), None);
            assert_eq!(parse("05 03 2024"), None);
            assert_eq!(parse("+5-03-2024"), None);
        }

        #[test]
        fn test_month_first_is_read_day_first() {
            // 12/25/2024 would be December 25th in the US; day-first it has month 25.
            assert_eq!(parse("12/25/2024"), None);
        }
    }

    mod boundary_tests {
        use super::*;

        #[test]
        fn test_start_is_local_midnight() {
            let start = CampaignBoundary::parse_start("05-03-2024").unwrap();
            assert_eq!(start.local_time(), NaiveTime::from_hms_milli_opt(0, 0, 0, 0).unwrap());
            assert_eq!(start.date(), ymd(2024, 3, 5));
            assert_eq!(start.kind(), BoundaryKind::Start);
        }

        #[test]
        fn test_end_is_last_millisecond() {
            let end = CampaignBoundary::parse_end("05-03-2024").unwrap();
            assert_eq!(end.local_time(), NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap());
            assert_eq!(end.kind(), BoundaryKind::End);
        }

        #[test]
        fn test_unparseable_yields_none() {
            assert!(CampaignBoundary::parse_start("not a date").is_none());
            assert!(CampaignBoundary::parse_end("31-02-2024").is_none());
        }

        #[test]
        fn test_formatting() {
            let start = CampaignBoundary::start_of(ymd(2024, 3, 1));
            assert_eq!(start.month_day(), "March 1st");
            assert_eq!(start.clock_time(), "12:00 AM");

            let end = CampaignBoundary::end_of(ymd(2024, 12, 22));
            assert_eq!(end.month_day(), "December 22th");
            assert_eq!(end.clock_time(), "11:59 PM");

            assert_eq!(CampaignBoundary::start_of(ymd(2024, 1, 3)).month_day(), "January 3rd");
            assert_eq!(CampaignBoundary::start_of(ymd(2024, 1, 2)).month_day(), "January 2nd");
        }
    }

    mod window_tests {
        use super::*;

        fn at(boundary: &CampaignBoundary, offset_ms: i64) -> UnixTimeMs {
            UnixTimeMs(u64::try_from(boundary.timestamp_ms() + offset_ms).unwrap())
        }

        #[test]
        fn test_unconstrained_is_open() {
            assert_eq!(CampaignWindow::default().check(UnixTimeMs(0)), WindowCheck::Open);
        }

        #[test]
        fn test_start_edge_is_inclusive() {
            let start = CampaignBoundary::start_of(ymd(2030, 6, 1));
            let window = CampaignWindow::new(Some(start), None);
            assert_eq!(window.check(at(&start, -1)), WindowCheck::NotStarted(start));
            assert_eq!(window.check(at(&start, 0)), WindowCheck::Open);
        }

        #[test]
        fn test_end_edge_is_inclusive() {
            let end = CampaignBoundary::end_of(ymd(2030, 6, 1));
            let window = CampaignWindow::new(None, Some(end));
            assert_eq!(window.check(at(&end, 0)), WindowCheck::Open);
            assert_eq!(window.check(at(&end, 1)), WindowCheck::Ended(end));
        }

        #[test]
        fn test_far_future_start() {
            let window = CampaignWindow::new(CampaignBoundary::parse_start("01-01-2099"), None);
            assert!(matches!(window.check(UnixTimeMs::now()), WindowCheck::NotStarted(_)));
        }
    }

    proptest! {
        #[test]
        fn prop_valid_dates_parse_in_both_shapes(
            year in 1000i32..9999,
            month in 1u32..=12,
            day in 1u32..=28,
        ) {
            let expected = NaiveDate::from_ymd_opt(year, month, day);
            prop_assert_eq!(parse(&format!("{year:04}-{month:02}-{day:02}")), expected);
            prop_assert_eq!(parse(&format!("{day}/{month}/{year:04}")), expected);
        }
    }
}
