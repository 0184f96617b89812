use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use tracing::debug;

use super::annotations::{HiddenRole, HiddenStems};
use super::ephemeris::julian_day_number;
use super::solar_terms::{SolarTerm, SolarTermEntry, SolarTermRepository};
use super::{Branch, Chart, Pillar, Result, Stem};

/// Julian day number of 1899-12-22, a 甲子 day.
pub const DAY_CYCLE_EPOCH_JDN: i64 = 2415011;

/// Wall-clock time from which a birth counts toward the following day.
pub fn late_night_cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 30, 0).unwrap_or(NaiveTime::MIN)
}

/// Calendar day whose pillar applies at `instant`.
pub fn effective_date(instant: NaiveDateTime) -> NaiveDate {
    if instant.time() >= late_night_cutoff() {
        instant.date() + ChronoDuration::days(1)
    } else {
        instant.date()
    }
}

pub fn day_pillar(date: NaiveDate) -> Pillar {
    Pillar::from_cycle_index((julian_day_number(date) - DAY_CYCLE_EPOCH_JDN).rem_euclid(60))
}

/// Year pillar of a cycle year (the year as counted from Start of Spring).
pub fn year_pillar(cycle_year: i32) -> Pillar {
    Pillar::from_cycle_index(cycle_year as i64 - 4)
}

/// Stem of the month whose branch is `month_branch`, in a year headed by `year_stem`.
/// 甲己 years open 寅 with 丙, 乙庚 with 戊, 丙辛 with 庚, 丁壬 with 壬, 戊癸 with 甲.
pub fn month_stem(year_stem: Stem, month_branch: Branch) -> Stem {
    let first = Stem::cyclic(2 * (year_stem.index() as i64 % 5) + 2);
    first.offset(Branch::In.distance_to(month_branch) as i64)
}

/// Stem of the hour `hour_branch` on a day headed by `day_stem`.
/// 甲己 days open 子 with 甲, 乙庚 with 丙, 丙辛 with 戊, 丁壬 with 庚, 戊癸 with 壬.
pub fn hour_stem(day_stem: Stem, hour_branch: Branch) -> Stem {
    let first = Stem::cyclic(2 * (day_stem.index() as i64 % 5));
    first.offset(hour_branch.index() as i64)
}

fn month_branch_of(term: SolarTerm) -> Branch {
    Branch::cyclic(term.index() as i64 / 2 + 1)
}

/// Hidden stem of the month branch that governs the birth day (사령).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct CommandingStem {
    pub stem: Stem,
    pub role: HiddenRole,
    /// Whole days since the month-opening term.
    pub days_elapsed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarResult {
    pub chart: Chart,
    pub commanding_stem: CommandingStem,
    /// Month-opening term in effect at the birth instant.
    pub governing_term: SolarTermEntry,
    /// Year counted from Start of Spring.
    pub cycle_year: i32,
}

pub struct CalendarEngine<'a> {
    repository: &'a SolarTermRepository,
}

impl<'a> CalendarEngine<'a> {
    pub fn new(repository: &'a SolarTermRepository) -> Self {
        CalendarEngine { repository }
    }

    /// Four pillars of a local wall-clock instant. Any missing solar term
    /// year is reported instead of guessed.
    pub fn compute(&self, instant: NaiveDateTime) -> Result<CalendarResult> {
        let spring = self.repository.term_at(instant.year(), SolarTerm::StartOfSpring)?;
        let cycle_year = if instant < spring {
            instant.year() - 1
        } else {
            instant.year()
        };
        let year = year_pillar(cycle_year);

        let governing_term = self
            .repository
            .last_at_or_before(instant, SolarTerm::is_major)?;
        let month_branch = month_branch_of(governing_term.term);
        let month = Pillar {
            stem: month_stem(year.stem, month_branch),
            branch: month_branch,
        };

        let day = day_pillar(effective_date(instant));
        let hour_branch = Branch::from_clock(instant.hour(), instant.minute());
        let hour = Pillar {
            stem: hour_stem(day.stem, hour_branch),
            branch: hour_branch,
        };

        let days_elapsed = (instant - governing_term.at).num_days().max(0) as u32;
        let (role, stem) = HiddenStems::of(month_branch).commanding(days_elapsed);
        debug!(
            term = %governing_term.term,
            days_elapsed,
            commanding = %stem,
            "resolved month command"
        );

        Ok(CalendarResult {
            chart: Chart::new(year, month, day, hour),
            commanding_stem: CommandingStem {
                stem,
                role,
                days_elapsed,
            },
            governing_term,
            cycle_year,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solar_terms::{EphemerisSource, JsonDirectorySource};
    use crate::SajuError;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    fn repository() -> SolarTermRepository {
        SolarTermRepository::new(EphemerisSource::new(540))
    }

    #[test]
    fn test_day_cycle_epoch() {
        let epoch = NaiveDate::from_ymd_opt(1899, 12, 22).unwrap();
        assert_eq!(day_pillar(epoch).cycle_index(), 0);
        assert_eq!(day_pillar(epoch.pred_opt().unwrap()).cycle_index(), 59);
        assert_eq!(day_pillar(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()).hanja(), "戊午");
        assert_eq!(day_pillar(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).hanja(), "甲子");
    }

    #[test]
    fn test_day_index_matches_day_count() {
        let epoch = NaiveDate::from_ymd_opt(1899, 12, 22).unwrap();
        for offset in [-100_000i64, -61, -1, 0, 1, 59, 60, 12_345, 200_000] {
            let date = epoch + ChronoDuration::days(offset);
            assert_eq!(day_pillar(date).cycle_index() as i64, offset.rem_euclid(60));
        }
    }

    #[test]
    fn test_start_tables() {
        assert_eq!(month_stem(Stem::Gap, Branch::In), Stem::Byeong);
        assert_eq!(month_stem(Stem::Gi, Branch::In), Stem::Byeong);
        assert_eq!(month_stem(Stem::Gye, Branch::In), Stem::Gap);
        assert_eq!(month_stem(Stem::Gye, Branch::Chuk), Stem::Eul);
        assert_eq!(hour_stem(Stem::Gap, Branch::Ja), Stem::Gap);
        assert_eq!(hour_stem(Stem::Eul, Branch::Ja), Stem::Byeong);
        assert_eq!(hour_stem(Stem::Gye, Branch::Ja), Stem::Im);
        assert_eq!(hour_stem(Stem::Gap, Branch::O), Stem::Gyeong);
    }

    #[test]
    fn test_chart_after_start_of_spring() {
        let result = CalendarEngine::new(&repository())
            .compute(at(2024, 2, 10, 12, 0))
            .unwrap();
        assert_eq!(result.cycle_year, 2024);
        assert_eq!(result.chart.year.hanja(), "甲辰");
        assert_eq!(result.chart.month.hanja(), "丙寅");
        assert_eq!(result.chart.day.hanja(), "甲辰");
        assert_eq!(result.chart.hour.hanja(), "庚午");
        assert_eq!(result.governing_term.term, SolarTerm::StartOfSpring);
    }

    #[test]
    fn test_chart_before_start_of_spring() {
        let result = CalendarEngine::new(&repository())
            .compute(at(2024, 2, 3, 12, 0))
            .unwrap();
        assert_eq!(result.cycle_year, 2023);
        assert_eq!(result.chart.year.hanja(), "癸卯");
        assert_eq!(result.chart.month.hanja(), "乙丑");
    }

    #[test]
    fn test_month_falls_back_to_previous_year() {
        let result = CalendarEngine::new(&repository())
            .compute(at(2024, 1, 3, 8, 0))
            .unwrap();
        assert_eq!(result.governing_term.term, SolarTerm::MajorSnow);
        assert_eq!(result.chart.month.branch, Branch::Ja);
        assert_eq!(result.chart.month.hanja(), "甲子");
    }

    #[test]
    fn test_late_night_birth_uses_next_day() {
        let result = CalendarEngine::new(&repository())
            .compute(at(2023, 12, 31, 23, 45))
            .unwrap();
        assert_eq!(result.chart.day.hanja(), "甲子");
        assert_eq!(result.chart.hour.hanja(), "甲子");

        let before = CalendarEngine::new(&repository())
            .compute(at(2023, 12, 31, 23, 29))
            .unwrap();
        assert_eq!(before.chart.day.hanja(), "癸亥");
        assert_eq!(before.chart.hour.branch, Branch::Hae);
    }

    #[test]
    fn test_frost_descent_commands_mu() {
        // Frost descent 2023 began on October 24.
        let result = CalendarEngine::new(&repository())
            .compute(at(2023, 10, 30, 12, 0))
            .unwrap();
        assert_eq!(result.chart.month.hanja(), "壬戌");
        assert_eq!(result.governing_term.term, SolarTerm::ColdDew);
        assert_eq!(result.commanding_stem.stem, Stem::Mu);
        assert_eq!(result.commanding_stem.role, HiddenRole::Main);
    }

    #[test]
    fn test_missing_year_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let repository = SolarTermRepository::new(JsonDirectorySource::new(dir.path()));
        let err = CalendarEngine::new(&repository)
            .compute(at(1990, 5, 5, 5, 5))
            .unwrap_err();
        assert!(matches!(err, SajuError::MissingCalendarData { year: 1990 }));
    }
}
