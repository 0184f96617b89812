use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::info;

use super::calendar::{day_pillar, effective_date};
use super::solar_terms::{SolarTerm, SolarTermRepository};
use super::{Branch, Pillar, Result, Stem};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum GuardianSpirit {
    Noble,
    FlyingSerpent,
    VermilionBird,
    SixHarmony,
    HookedArray,
    AzureDragon,
    HeavenlyVoid,
    WhiteTiger,
    GreatConstancy,
    DarkWarrior,
    GreatYin,
    HeavenlyEmpress,
}

impl GuardianSpirit {
    /// Placement order, starting from the noble.
    pub const ALL: [GuardianSpirit; 12] = [
        GuardianSpirit::Noble,
        GuardianSpirit::FlyingSerpent,
        GuardianSpirit::VermilionBird,
        GuardianSpirit::SixHarmony,
        GuardianSpirit::HookedArray,
        GuardianSpirit::AzureDragon,
        GuardianSpirit::HeavenlyVoid,
        GuardianSpirit::WhiteTiger,
        GuardianSpirit::GreatConstancy,
        GuardianSpirit::DarkWarrior,
        GuardianSpirit::GreatYin,
        GuardianSpirit::HeavenlyEmpress,
    ];

    pub fn hanja(self) -> &'static str {
        [
            "貴人", "螣蛇", "朱雀", "六合", "勾陳", "青龍", "天空", "白虎", "太常", "玄武", "太陰", "天后",
        ][self as usize]
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Overlay {
    Stem(Stem),
    Void,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RingPosition {
    pub earth: Branch,
    pub sky: Branch,
    pub spirit: GuardianSpirit,
    pub overlay: Overlay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    pub lower: Branch,
    pub upper: Branch,
    pub spirit: GuardianSpirit,
    pub overlay: Overlay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LukimBoard {
    pub query: NaiveDateTime,
    pub day: Pillar,
    pub governing_term: SolarTerm,
    pub month_general: Branch,
    pub query_branch: Branch,
    pub daytime: bool,
    /// Twelve positions clockwise from the query branch.
    pub positions: Vec<RingPosition>,
    pub courses: Vec<Course>,
}

impl LukimBoard {
    pub fn position_under(&self, earth: Branch) -> &RingPosition {
        &self.positions[self.query_branch.distance_to(earth)]
    }
}

fn general_of(term: SolarTerm) -> Branch {
    Branch::cyclic(-((term.index() as i64 - 1) / 2))
}

/// Month general of a mid-month term: 雨水 亥, 春分 戌, and so on back to 大寒 子.
pub fn month_general(term: SolarTerm) -> Option<Branch> {
    if term.is_major() {
        None
    } else {
        Some(general_of(term))
    }
}

/// (daytime, night-time) noble branch of a day stem.
pub fn noble_branches(day_stem: Stem) -> (Branch, Branch) {
    match day_stem {
        Stem::Gap | Stem::Mu | Stem::Gyeong => (Branch::Chuk, Branch::Mi),
        Stem::Eul | Stem::Gi => (Branch::Ja, Branch::Shin),
        Stem::Byeong | Stem::Jeong => (Branch::Hae, Branch::Yu),
        Stem::Im | Stem::Gye => (Branch::Sa, Branch::Myo),
        Stem::Sin => (Branch::O, Branch::In),
    }
}

/// Branch a day stem lodges in for the first course.
pub fn base_palace(day_stem: Stem) -> Branch {
    match day_stem {
        Stem::Gap => Branch::In,
        Stem::Eul => Branch::Jin,
        Stem::Byeong | Stem::Mu => Branch::Sa,
        Stem::Jeong | Stem::Gi => Branch::Mi,
        Stem::Gyeong => Branch::Shin,
        Stem::Sin => Branch::Sul,
        Stem::Im => Branch::Hae,
        Stem::Gye => Branch::Chuk,
    }
}

pub fn is_daytime(query_branch: Branch) -> bool {
    (Branch::Myo.index()..=Branch::Shin.index()).contains(&query_branch.index())
}

pub struct DivinationEngine<'a> {
    repository: &'a SolarTermRepository,
}

impl<'a> DivinationEngine<'a> {
    pub fn new(repository: &'a SolarTermRepository) -> Self {
        DivinationEngine { repository }
    }

    /// Lays out the board for a query instant. Missing solar term data fails
    /// the whole board.
    pub fn board(&self, query: NaiveDateTime) -> Result<LukimBoard> {
        let governing = self
            .repository
            .last_at_or_before(query, |term| !term.is_major())?;
        let general = general_of(governing.term);
        let query_branch = Branch::from_clock(query.hour(), query.minute());
        let day = day_pillar(effective_date(query));
        let daytime = is_daytime(query_branch);

        let sky_over = |earth: Branch| general.offset(query_branch.distance_to(earth) as i64);

        let (day_noble, night_noble) = noble_branches(day.stem);
        let noble = if daytime { day_noble } else { night_noble };
        // Ring index whose sky branch carries the noble.
        let noble_index = general.distance_to(noble);
        let noble_earth = query_branch.offset(noble_index as i64);
        let clockwise = Branch::Hae.distance_to(noble_earth) < 6;

        let decade_start = day.branch.offset(-(day.stem.index() as i64));
        let overlay = |sky: Branch| {
            let distance = decade_start.distance_to(sky);
            if distance >= 10 {
                Overlay::Void
            } else {
                Overlay::Stem(Stem::cyclic(distance as i64))
            }
        };

        let positions: Vec<RingPosition> = (0..12usize)
            .map(|i| {
                let earth = query_branch.offset(i as i64);
                let sky = general.offset(i as i64);
                let steps = if clockwise {
                    (i + 12 - noble_index) % 12
                } else {
                    (noble_index + 12 - i) % 12
                };
                RingPosition {
                    earth,
                    sky,
                    spirit: GuardianSpirit::ALL[steps],
                    overlay: overlay(sky),
                }
            })
            .collect();

        let course = |lower: Branch| {
            let position = &positions[query_branch.distance_to(lower)];
            Course {
                lower,
                upper: sky_over(lower),
                spirit: position.spirit,
                overlay: position.overlay,
            }
        };
        let first = course(base_palace(day.stem));
        let second = course(first.upper);
        let third = course(day.branch);
        let fourth = course(third.upper);

        info!(
            %query,
            %day,
            general = %general,
            query_branch = %query_branch,
            "laid out divination board"
        );

        Ok(LukimBoard {
            query,
            day,
            governing_term: governing.term,
            month_general: general,
            query_branch,
            daytime,
            courses: vec![first, second, third, fourth],
            positions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solar_terms::{EphemerisSource, JsonDirectorySource};
    use crate::SajuError;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn test_month_generals() {
        let expected = [
            (SolarTerm::MajorCold, Branch::Ja),
            (SolarTerm::RainWater, Branch::Hae),
            (SolarTerm::SpringEquinox, Branch::Sul),
            (SolarTerm::GrainRain, Branch::Yu),
            (SolarTerm::GrainBuds, Branch::Shin),
            (SolarTerm::SummerSolstice, Branch::Mi),
            (SolarTerm::MajorHeat, Branch::O),
            (SolarTerm::EndOfHeat, Branch::Sa),
            (SolarTerm::AutumnEquinox, Branch::Jin),
            (SolarTerm::FrostDescent, Branch::Myo),
            (SolarTerm::MinorSnow, Branch::In),
            (SolarTerm::WinterSolstice, Branch::Chuk),
        ];
        for (term, branch) in expected {
            assert_eq!(month_general(term), Some(branch), "term {}", term);
        }
        assert_eq!(month_general(SolarTerm::StartOfSpring), None);
    }

    #[test]
    fn test_daytime_range() {
        assert!(!is_daytime(Branch::In));
        assert!(is_daytime(Branch::Myo));
        assert!(is_daytime(Branch::Shin));
        assert!(!is_daytime(Branch::Yu));
    }

    #[test]
    fn test_board_layout() {
        let repository = SolarTermRepository::new(EphemerisSource::new(540));
        let board = DivinationEngine::new(&repository)
            .board(at(2024, 3, 25, 10, 0))
            .unwrap();
        assert_eq!(board.governing_term, SolarTerm::SpringEquinox);
        assert_eq!(board.month_general, Branch::Sul);
        assert_eq!(board.query_branch, Branch::Sa);
        assert_eq!(board.day.hanja(), "戊子");
        assert!(board.daytime);

        assert_eq!(board.positions.len(), 12);
        assert_eq!(board.positions[0].earth, Branch::Sa);
        assert_eq!(board.positions[0].sky, Branch::Sul);
        assert_eq!(board.position_under(Branch::Ja).sky, Branch::Sa);

        // 戊 by day honours 丑, which sits over 申: spirits run counter-clockwise.
        let noble = board.position_under(Branch::Shin);
        assert_eq!(noble.sky, Branch::Chuk);
        assert_eq!(noble.spirit, GuardianSpirit::Noble);
        assert_eq!(board.position_under(Branch::Mi).spirit, GuardianSpirit::FlyingSerpent);
        assert_eq!(board.position_under(Branch::Yu).spirit, GuardianSpirit::HeavenlyEmpress);

        // 戊子 belongs to the 甲申 decade: 丑 carries 己, 午未 are void.
        assert_eq!(noble.overlay, Overlay::Stem(Stem::Gi));
        let void: Vec<Branch> = board
            .positions
            .iter()
            .filter(|p| p.overlay == Overlay::Void)
            .map(|p| p.sky)
            .collect();
        assert_eq!(void.len(), 2);
        assert!(void.contains(&Branch::O) && void.contains(&Branch::Mi));

        let courses: Vec<(Branch, Branch)> = board.courses.iter().map(|c| (c.lower, c.upper)).collect();
        assert_eq!(
            courses,
            vec![
                (Branch::Sa, Branch::Sul),
                (Branch::Sul, Branch::Myo),
                (Branch::Ja, Branch::Sa),
                (Branch::Sa, Branch::Sul),
            ]
        );
    }

    #[test]
    fn test_every_spirit_placed_once() {
        let repository = SolarTermRepository::new(EphemerisSource::new(540));
        for hour in [0, 5, 9, 14, 20, 23] {
            let board = DivinationEngine::new(&repository)
                .board(at(2023, 8, 17, hour, 40))
                .unwrap();
            for spirit in GuardianSpirit::ALL {
                assert_eq!(board.positions.iter().filter(|p| p.spirit == spirit).count(), 1);
            }
        }
    }

    #[test]
    fn test_missing_data_gives_no_board() {
        let dir = tempfile::tempdir().unwrap();
        let repository = SolarTermRepository::new(JsonDirectorySource::new(dir.path()));
        let err = DivinationEngine::new(&repository)
            .board(at(2024, 3, 25, 10, 0))
            .unwrap_err();
        assert!(matches!(err, SajuError::MissingCalendarData { .. }));
    }
}
