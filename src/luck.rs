use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use super::annotations::{AnnotatedPillar, Basis};
use super::calendar::day_pillar;
use super::solar_terms::{SolarTerm, SolarTermRepository};
use super::{Chart, Gender, Horizon, Pillar, Polarity, Result, Slot};

/// Cycle index of the January 1900 month pillar, 丁丑.
const MONTH_ANCHOR_INDEX: i64 = 13;
const MONTH_ANCHOR_YEAR: i64 = 1900;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum LuckDirection {
    Forward,
    Backward,
}

impl LuckDirection {
    /// Yang year stems walk forward for men, yin year stems for women.
    pub fn for_chart(chart: &Chart, gender: Gender) -> LuckDirection {
        match (chart.year.stem.polarity(), gender) {
            (Polarity::Yang, Gender::Male) | (Polarity::Yin, Gender::Female) => {
                LuckDirection::Forward
            }
            _ => LuckDirection::Backward,
        }
    }

    pub fn step(self) -> i64 {
        match self {
            LuckDirection::Forward => 1,
            LuckDirection::Backward => -1,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum LuckPeriod {
    Decade { start_age: u32, start_year: i32 },
    Year(i32),
    Month { year: i32, month: u32 },
    Day(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LuckPillar {
    pub horizon: Horizon,
    pub pillar: Pillar,
    pub period: LuckPeriod,
    pub annotation: AnnotatedPillar,
}

impl LuckPillar {
    fn new(basis: &Basis, horizon: Horizon, pillar: Pillar, period: LuckPeriod) -> Self {
        LuckPillar {
            horizon,
            pillar,
            period,
            annotation: AnnotatedPillar::new(basis, Slot::Luck(horizon), pillar),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecadeLuck {
    pub direction: LuckDirection,
    pub start_age: u32,
    /// Whole days between birth and the solar term the count runs to.
    pub days_to_boundary: i64,
    pub pillars: Vec<LuckPillar>,
}

impl DecadeLuck {
    /// Decade pillar running in the year of `date`; `None` before the first starts.
    pub fn current_at(&self, date: NaiveDate) -> Option<&LuckPillar> {
        self.pillars
            .iter()
            .take_while(|p| match p.period {
                LuckPeriod::Decade { start_year, .. } => start_year <= date.year(),
                _ => false,
            })
            .last()
    }
}

/// Decade start age from the day distance to the boundary: three days make one year.
pub fn start_age(days: i64) -> u32 {
    ((days.abs() / 3) as u32).clamp(1, 10)
}

pub struct LuckCycleEngine<'a> {
    repository: &'a SolarTermRepository,
}

impl<'a> LuckCycleEngine<'a> {
    pub fn new(repository: &'a SolarTermRepository) -> Self {
        LuckCycleEngine { repository }
    }

    pub fn decade(&self, birth: NaiveDateTime, gender: Gender, chart: &Chart) -> Result<DecadeLuck> {
        let direction = LuckDirection::for_chart(chart, gender);
        let boundary = match direction {
            LuckDirection::Forward => self.repository.first_after(birth, SolarTerm::is_major)?,
            LuckDirection::Backward => {
                self.repository.last_at_or_before(birth, SolarTerm::is_major)?
            }
        };
        let days_to_boundary = (boundary.at - birth).num_days().abs();
        let start_age = start_age(days_to_boundary);
        debug!(?direction, term = %boundary.term, days_to_boundary, start_age, "decade luck start");

        let basis = Basis::from_chart(chart);
        let pillars = (1..=10u32)
            .map(|i| {
                let age = start_age + 10 * (i - 1);
                LuckPillar::new(
                    &basis,
                    Horizon::Decade,
                    chart.month.offset(direction.step() * i as i64),
                    LuckPeriod::Decade {
                        start_age: age,
                        start_year: birth.year() + age as i32,
                    },
                )
            })
            .collect();

        Ok(DecadeLuck {
            direction,
            start_age,
            days_to_boundary,
            pillars,
        })
    }

    /// The year's own pillar, independent of the chart.
    pub fn year_luck(&self, basis: &Basis, year: i32) -> LuckPillar {
        LuckPillar::new(
            basis,
            Horizon::Year,
            Pillar::from_cycle_index(year as i64 - 4),
            LuckPeriod::Year(year),
        )
    }

    pub fn month_luck(&self, basis: &Basis, year: i32, month: u32) -> LuckPillar {
        let months = (year as i64 - MONTH_ANCHOR_YEAR) * 12 + (month as i64 - 1);
        LuckPillar::new(
            basis,
            Horizon::Month,
            Pillar::from_cycle_index(MONTH_ANCHOR_INDEX + months),
            LuckPeriod::Month { year, month },
        )
    }

    pub fn day_luck(&self, basis: &Basis, date: NaiveDate) -> LuckPillar {
        LuckPillar::new(basis, Horizon::Day, day_pillar(date), LuckPeriod::Day(date))
    }

    pub fn year_range(&self, basis: &Basis, first_year: i32, span: usize) -> Vec<LuckPillar> {
        (0..span as i32)
            .map(|i| self.year_luck(basis, first_year + i))
            .collect()
    }

    /// `span` consecutive months starting at `year`/`month`.
    pub fn month_range(&self, basis: &Basis, year: i32, month: u32, span: usize) -> Vec<LuckPillar> {
        let first = year * 12 + month.clamp(1, 12) as i32 - 1;
        (0..span as i32)
            .map(|i| {
                let absolute = first + i;
                self.month_luck(basis, absolute.div_euclid(12), absolute.rem_euclid(12) as u32 + 1)
            })
            .collect()
    }
}
