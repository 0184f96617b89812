use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

pub mod annotations;
pub mod calendar;
pub mod config;
pub mod ephemeris;
pub mod fortune;
pub mod luck;
pub mod lukim;
pub mod pattern;
pub mod relations;
pub mod solar_terms;
pub mod strength;
pub mod useful;

pub use annotations::{AnnotatedPillar, HiddenStems, SpiritMarker, TenGod, TwelveStage};
pub use calendar::{CalendarEngine, CalendarResult, CommandingStem};
pub use config::EngineConfig;
pub use fortune::{FortuneGrade, FortuneScore, FortuneScoreAggregator};
pub use luck::{DecadeLuck, LuckCycleEngine, LuckDirection, LuckPillar};
pub use lukim::{DivinationEngine, LukimBoard};
pub use pattern::{Pattern, PatternResult};
pub use relations::{RelationHit, RelationKind, RelationshipComposer};
pub use solar_terms::{SolarTerm, SolarTermRepository};
pub use strength::{StrengthBand, StrengthResult, StrengthStrategy};
pub use useful::{ElementCensus, Role, RoleMap, UsefulElementResolver, UsefulElementResult};

// ---------------------------
// ## Enumerations
// ---------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Element {
    Wood,
    Fire,
    Earth,
    Metal,
    Water,
}

impl Element {
    pub const ALL: [Element; 5] = [
        Element::Wood,
        Element::Fire,
        Element::Earth,
        Element::Metal,
        Element::Water,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Element {
        Element::ALL[index % 5]
    }

    /// The element this one feeds in the generating cycle.
    pub fn generates(self) -> Element {
        Element::from_index(self.index() + 1)
    }

    pub fn generated_by(self) -> Element {
        Element::from_index(self.index() + 4)
    }

    /// The element this one suppresses in the controlling cycle.
    pub fn controls(self) -> Element {
        Element::from_index(self.index() + 2)
    }

    pub fn controlled_by(self) -> Element {
        Element::from_index(self.index() + 3)
    }

    /// Same element or its generator: the two relations that strengthen `other`.
    pub fn supports(self, other: Element) -> bool {
        self == other || self.generates() == other
    }

    pub fn hanja(self) -> char {
        ['木', '火', '土', '金', '水'][self.index()]
    }

    pub fn hangul(self) -> char {
        ['목', '화', '토', '금', '수'][self.index()]
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Element::Wood => "Wood",
            Element::Fire => "Fire",
            Element::Earth => "Earth",
            Element::Metal => "Metal",
            Element::Water => "Water",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    Yang,
    Yin,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stem {
    Gap,
    Eul,
    Byeong,
    Jeong,
    Mu,
    Gi,
    Gyeong,
    Sin,
    Im,
    Gye,
}

const STEM_HANJA: [char; 10] = ['甲', '乙', '丙', '丁', '戊', '己', '庚', '辛', '壬', '癸'];
const STEM_HANGUL: [char; 10] = ['갑', '을', '병', '정', '무', '기', '경', '신', '임', '계'];

impl Stem {
    pub const ALL: [Stem; 10] = [
        Stem::Gap,
        Stem::Eul,
        Stem::Byeong,
        Stem::Jeong,
        Stem::Mu,
        Stem::Gi,
        Stem::Gyeong,
        Stem::Sin,
        Stem::Im,
        Stem::Gye,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Indexes outside the ten-symbol space yield `None` rather than wrapping.
    pub fn from_index(index: usize) -> Option<Stem> {
        Stem::ALL.get(index).copied()
    }

    pub fn cyclic(index: i64) -> Stem {
        Stem::ALL[index.rem_euclid(10) as usize]
    }

    pub fn offset(self, steps: i64) -> Stem {
        Stem::cyclic(self.index() as i64 + steps)
    }

    pub fn element(self) -> Element {
        Element::from_index(self.index() / 2)
    }

    pub fn polarity(self) -> Polarity {
        if self.index() % 2 == 0 {
            Polarity::Yang
        } else {
            Polarity::Yin
        }
    }

    pub fn hanja(self) -> char {
        STEM_HANJA[self.index()]
    }

    pub fn hangul(self) -> char {
        STEM_HANGUL[self.index()]
    }

    pub fn from_hanja(symbol: char) -> Option<Stem> {
        STEM_HANJA.iter().position(|&c| c == symbol).and_then(Stem::from_index)
    }

    pub fn from_hangul(symbol: char) -> Option<Stem> {
        STEM_HANGUL.iter().position(|&c| c == symbol).and_then(Stem::from_index)
    }
}

impl fmt::Display for Stem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.hanja())
    }
}

impl FromStr for Stem {
    type Err = SajuError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Stem::from_hanja(c).or_else(|| Stem::from_hangul(c)),
            _ => None,
        }
        .ok_or_else(|| SajuError::InvalidInput(format!("unknown stem symbol: {}", s)))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Branch {
    Ja,
    Chuk,
    In,
    Myo,
    Jin,
    Sa,
    O,
    Mi,
    Shin,
    Yu,
    Sul,
    Hae,
}

const BRANCH_HANJA: [char; 12] = ['子', '丑', '寅', '卯', '辰', '巳', '午', '未', '申', '酉', '戌', '亥'];
const BRANCH_HANGUL: [char; 12] = ['자', '축', '인', '묘', '진', '사', '오', '미', '신', '유', '술', '해'];

impl Branch {
    pub const ALL: [Branch; 12] = [
        Branch::Ja,
        Branch::Chuk,
        Branch::In,
        Branch::Myo,
        Branch::Jin,
        Branch::Sa,
        Branch::O,
        Branch::Mi,
        Branch::Shin,
        Branch::Yu,
        Branch::Sul,
        Branch::Hae,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Branch> {
        Branch::ALL.get(index).copied()
    }

    pub fn cyclic(index: i64) -> Branch {
        Branch::ALL[index.rem_euclid(12) as usize]
    }

    pub fn offset(self, steps: i64) -> Branch {
        Branch::cyclic(self.index() as i64 + steps)
    }

    /// Clockwise distance from `self` to `other` on the twelve-branch ring.
    pub fn distance_to(self, other: Branch) -> usize {
        (other.index() + 12 - self.index()) % 12
    }

    pub fn element(self) -> Element {
        match self {
            Branch::In | Branch::Myo => Element::Wood,
            Branch::Sa | Branch::O => Element::Fire,
            Branch::Shin | Branch::Yu => Element::Metal,
            Branch::Hae | Branch::Ja => Element::Water,
            Branch::Jin | Branch::Sul | Branch::Chuk | Branch::Mi => Element::Earth,
        }
    }

    pub fn polarity(self) -> Polarity {
        if self.index() % 2 == 0 {
            Polarity::Yang
        } else {
            Polarity::Yin
        }
    }

    pub fn hanja(self) -> char {
        BRANCH_HANJA[self.index()]
    }

    pub fn hangul(self) -> char {
        BRANCH_HANGUL[self.index()]
    }

    pub fn from_hanja(symbol: char) -> Option<Branch> {
        BRANCH_HANJA.iter().position(|&c| c == symbol).and_then(Branch::from_index)
    }

    pub fn from_hangul(symbol: char) -> Option<Branch> {
        BRANCH_HANGUL.iter().position(|&c| c == symbol).and_then(Branch::from_index)
    }

    /// Two-hour slot of a wall-clock time. Slots are shifted by thirty minutes,
    /// so `Ja` spans 23:30 to 01:29.
    pub fn from_clock(hour: u32, minute: u32) -> Branch {
        let minutes = (hour * 60 + minute + 30) % 1440;
        Branch::cyclic((minutes / 120) as i64)
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.hanja())
    }
}

impl FromStr for Branch {
    type Err = SajuError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Branch::from_hanja(c).or_else(|| Branch::from_hangul(c)),
            _ => None,
        }
        .ok_or_else(|| SajuError::InvalidInput(format!("unknown branch symbol: {}", s)))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl FromStr for Gender {
    type Err = SajuError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(SajuError::InvalidInput(format!("unknown gender: {}", other))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalendarType {
    Solar,
    Lunar { leap_month: bool },
}

/// Chart column or luck horizon a pillar occupies.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Slot {
    Year,
    Month,
    Day,
    Hour,
    Luck(Horizon),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    Decade,
    Year,
    Month,
    Day,
}

// ---------------------------
// ## Structures
// ---------------------------

/// A stem/branch pair of matching polarity, one of the sixty cycle positions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pillar {
    pub stem: Stem,
    pub branch: Branch,
}

impl Pillar {
    /// Pairs of mismatched polarity never occur in the sixty cycle.
    pub fn try_new(stem: Stem, branch: Branch) -> Option<Pillar> {
        if stem.index() % 2 == branch.index() % 2 {
            Some(Pillar { stem, branch })
        } else {
            None
        }
    }

    pub fn from_cycle_index(index: i64) -> Pillar {
        let index = index.rem_euclid(60);
        Pillar {
            stem: Stem::cyclic(index),
            branch: Branch::cyclic(index),
        }
    }

    /// Position in the sixty cycle, 0 for 甲子.
    pub fn cycle_index(&self) -> usize {
        (6 * self.stem.index() as i64 - 5 * self.branch.index() as i64).rem_euclid(60) as usize
    }

    pub fn offset(&self, steps: i64) -> Pillar {
        Pillar::from_cycle_index(self.cycle_index() as i64 + steps)
    }

    /// The two branches left without a stem in this pillar's ten-day decade.
    pub fn void_branches(&self) -> [Branch; 2] {
        let decade_start = self.branch.offset(-(self.stem.index() as i64));
        [decade_start.offset(10), decade_start.offset(11)]
    }

    pub fn hanja(&self) -> String {
        format!("{}{}", self.stem.hanja(), self.branch.hanja())
    }

    pub fn hangul(&self) -> String {
        format!("{}{}", self.stem.hangul(), self.branch.hangul())
    }
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.stem.hanja(), self.branch.hanja())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chart {
    pub year: Pillar,
    pub month: Pillar,
    pub day: Pillar,
    pub hour: Pillar,
}

impl Chart {
    pub fn new(year: Pillar, month: Pillar, day: Pillar, hour: Pillar) -> Self {
        Chart { year, month, day, hour }
    }

    pub fn day_stem(&self) -> Stem {
        self.day.stem
    }

    pub fn pillars(&self) -> [(Slot, Pillar); 4] {
        [
            (Slot::Year, self.year),
            (Slot::Month, self.month),
            (Slot::Day, self.day),
            (Slot::Hour, self.hour),
        ]
    }

    pub fn pillar(&self, slot: Slot) -> Option<Pillar> {
        self.pillars().iter().find(|(s, _)| *s == slot).map(|(_, p)| *p)
    }

    pub fn stems(&self) -> [Stem; 4] {
        [self.year.stem, self.month.stem, self.day.stem, self.hour.stem]
    }

    pub fn branches(&self) -> [Branch; 4] {
        [self.year.branch, self.month.branch, self.day.branch, self.hour.branch]
    }

    /// Stem elements visible outside the day stem itself.
    pub fn is_transparent(&self, element: Element) -> bool {
        [self.year.stem, self.month.stem, self.hour.stem]
            .iter()
            .any(|s| s.element() == element)
    }
}

impl fmt::Display for Chart {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {} {}", self.year, self.month, self.day, self.hour)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirthInfo {
    /// Local wall-clock birth instant.
    pub date_time: NaiveDateTime,
    pub gender: Gender,
    pub calendar: CalendarType,
}

impl BirthInfo {
    pub fn solar(date_time: NaiveDateTime, gender: Gender) -> Self {
        BirthInfo {
            date_time,
            gender,
            calendar: CalendarType::Solar,
        }
    }
}

/// Converts lunar calendar dates to the solar calendar. Supplied by the caller;
/// this crate carries no lunar tables.
pub trait LunarConverter {
    fn to_solar(&self, lunar: NaiveDate, leap_month: bool) -> Option<NaiveDate>;
}

#[derive(Debug, Clone, Serialize)]
pub struct LuckCycles {
    pub decade: DecadeLuck,
    pub years: Vec<LuckPillar>,
    pub months: Vec<LuckPillar>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SajuReport {
    pub birth_info: BirthInfo,
    /// Birth instant after any lunar conversion.
    pub solar_date_time: NaiveDateTime,
    pub chart: Chart,
    pub pillars: Vec<AnnotatedPillar>,
    pub commanding_stem: CommandingStem,
    pub census: ElementCensus,
    pub relations: Vec<RelationHit>,
    pub strength: StrengthResult,
    pub pattern: PatternResult,
    pub useful_element: UsefulElementResult,
    pub luck: LuckCycles,
    pub fortune: FortuneScore,
}

impl SajuReport {
    pub fn calculate(
        birth_info: &BirthInfo,
        as_of: NaiveDateTime,
        repository: &SolarTermRepository,
        config: &EngineConfig,
    ) -> Result<Self> {
        Self::calculate_with(birth_info, as_of, repository, config, None)
    }

    pub fn calculate_with(
        birth_info: &BirthInfo,
        as_of: NaiveDateTime,
        repository: &SolarTermRepository,
        config: &EngineConfig,
        converter: Option<&dyn LunarConverter>,
    ) -> Result<Self> {
        let solar_date_time = match birth_info.calendar {
            CalendarType::Solar => birth_info.date_time,
            CalendarType::Lunar { leap_month } => {
                let converter = converter.ok_or_else(|| {
                    SajuError::InvalidInput(
                        "lunar birth dates need a converter to the solar calendar".to_string(),
                    )
                })?;
                let date = converter
                    .to_solar(birth_info.date_time.date(), leap_month)
                    .ok_or_else(|| {
                        SajuError::InvalidInput(format!(
                            "lunar date {} has no solar equivalent",
                            birth_info.date_time.date()
                        ))
                    })?;
                date.and_time(birth_info.date_time.time())
            }
        };

        let calendar = CalendarEngine::new(repository);
        let calendar_result = calendar.compute(solar_date_time)?;
        let chart = calendar_result.chart;
        info!(%chart, birth = %solar_date_time, "computed four pillars");

        let basis = annotations::Basis::from_chart(&chart);
        let pillars = chart
            .pillars()
            .iter()
            .map(|&(slot, pillar)| AnnotatedPillar::new(&basis, slot, pillar))
            .collect();

        let relations = RelationshipComposer::compose(&chart, None);
        let strategy = strength::SeasonalRootStrategy::new(config.strength.relation_discount);
        let strength = strategy.score(&chart, &relations);
        let pattern = pattern::classify(&chart);
        let resolver = UsefulElementResolver::new(&config.useful);
        let useful_element = resolver.resolve(&chart, &strength, &pattern);
        debug!(
            band = ?strength.band,
            pattern = ?pattern.pattern,
            primary = ?useful_element.primary,
            "analysed chart"
        );

        let luck_engine = LuckCycleEngine::new(repository);
        let decade = luck_engine.decade(solar_date_time, birth_info.gender, &chart)?;
        let as_of_year = chrono::Datelike::year(&as_of);
        let as_of_month = chrono::Datelike::month(&as_of);
        let years = luck_engine.year_range(&basis, as_of_year, config.luck.year_span);
        let months =
            luck_engine.month_range(&basis, as_of_year, as_of_month, config.luck.month_span);

        let mut horizons = Vec::with_capacity(4);
        if let Some(current) = decade.current_at(as_of.date()) {
            horizons.push((Horizon::Decade, current.pillar));
        }
        horizons.push((Horizon::Year, luck_engine.year_luck(&basis, as_of_year).pillar));
        horizons.push((
            Horizon::Month,
            luck_engine.month_luck(&basis, as_of_year, as_of_month).pillar,
        ));
        let as_of_day = calendar::effective_date(as_of);
        horizons.push((Horizon::Day, luck_engine.day_luck(&basis, as_of_day).pillar));

        let aggregator = FortuneScoreAggregator::new(&config.fortune);
        let fortune = aggregator.score(&chart, useful_element.role_map.as_ref(), &horizons);

        Ok(SajuReport {
            birth_info: birth_info.clone(),
            solar_date_time,
            chart,
            pillars,
            commanding_stem: calendar_result.commanding_stem,
            census: ElementCensus::visible(&chart),
            relations,
            strength,
            pattern,
            useful_element,
            luck: LuckCycles {
                decade,
                years,
                months,
            },
            fortune,
        })
    }
}

// ---------------------------
// ## Error Handling
// ---------------------------

#[derive(Error, Debug)]
pub enum SajuError {
    #[error("no solar term data for year {year}")]
    MissingCalendarData { year: i32 },

    #[error("failed to read solar term data {path}: {source}")]
    DataLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed solar term data {path}: {source}")]
    DataFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SajuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_round_trip() {
        for stem in Stem::ALL {
            assert_eq!(Stem::from_hanja(stem.hanja()), Some(stem));
            assert_eq!(Stem::from_hangul(stem.hangul()), Some(stem));
        }
        for branch in Branch::ALL {
            assert_eq!(Branch::from_hanja(branch.hanja()), Some(branch));
            assert_eq!(Branch::from_hangul(branch.hangul()), Some(branch));
        }
        assert_eq!("庚".parse::<Stem>().unwrap(), Stem::Gyeong);
        assert_eq!("해".parse::<Branch>().unwrap(), Branch::Hae);
        assert!("X".parse::<Stem>().is_err());
    }

    #[test]
    fn test_unknown_symbols() {
        assert_eq!(Stem::from_index(10), None);
        assert_eq!(Branch::from_index(12), None);
        assert_eq!(Stem::from_hanja('子'), None);
    }

    #[test]
    fn test_element_cycles() {
        assert_eq!(Element::Wood.generates(), Element::Fire);
        assert_eq!(Element::Water.generates(), Element::Wood);
        assert_eq!(Element::Wood.controls(), Element::Earth);
        assert_eq!(Element::Metal.controls(), Element::Wood);
        for element in Element::ALL {
            assert_eq!(element.generates().generated_by(), element);
            assert_eq!(element.controls().controlled_by(), element);
        }
        assert!(Element::Water.supports(Element::Wood));
        assert!(!Element::Fire.supports(Element::Wood));
    }

    #[test]
    fn test_sixty_cycle() {
        for index in 0..60 {
            let pillar = Pillar::from_cycle_index(index);
            assert_eq!(pillar.cycle_index() as i64, index);
            assert_eq!(Pillar::try_new(pillar.stem, pillar.branch), Some(pillar));
        }
        assert_eq!(Pillar::try_new(Stem::Gap, Branch::Chuk), None);
        assert_eq!(Pillar::from_cycle_index(-1).hanja(), "癸亥");
        assert_eq!(Pillar::from_cycle_index(10).hanja(), "甲戌");
    }

    #[test]
    fn test_void_branches() {
        let gap_ja = Pillar::from_cycle_index(0);
        assert_eq!(gap_ja.void_branches(), [Branch::Sul, Branch::Hae]);
        let gap_sul = Pillar::from_cycle_index(10);
        assert_eq!(gap_sul.void_branches(), [Branch::Shin, Branch::Yu]);
    }

    fn birth() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn as_of() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2045, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_full_report() {
        let repository = SolarTermRepository::new(solar_terms::EphemerisSource::new(540));
        let config = EngineConfig::default();
        let report = SajuReport::calculate(
            &BirthInfo::solar(birth(), Gender::Male),
            as_of(),
            &repository,
            &config,
        )
        .unwrap();

        assert_eq!(report.chart.to_string(), "甲辰 丙寅 甲辰 庚午");
        assert_eq!(report.pillars.len(), 4);
        assert_eq!(report.pillars[2].stem_god, None);
        assert_eq!(report.census.total(), 8.0);
        assert_eq!(report.luck.decade.direction, LuckDirection::Forward);
        assert_eq!(report.luck.years.len(), config.luck.year_span);
        assert_eq!(report.luck.months.len(), config.luck.month_span);
        assert_eq!(report.fortune.horizons.len(), 4);
        assert_eq!(report.fortune.horizons[0].horizon, Horizon::Decade);
        assert!((0.0..=10.0).contains(&report.fortune.final_score));
        assert!(serde_json::to_string(&report).is_ok());
    }

    #[test]
    fn test_day_horizon_rolls_over_late_at_night() {
        let repository = SolarTermRepository::new(solar_terms::EphemerisSource::new(540));
        let config = EngineConfig::default();
        let late = NaiveDate::from_ymd_opt(2045, 6, 1)
            .unwrap()
            .and_hms_opt(23, 45, 0)
            .unwrap();
        let report = SajuReport::calculate(
            &BirthInfo::solar(birth(), Gender::Male),
            late,
            &repository,
            &config,
        )
        .unwrap();
        let day = report
            .fortune
            .horizons
            .iter()
            .find(|h| h.horizon == Horizon::Day)
            .unwrap();
        let next = NaiveDate::from_ymd_opt(2045, 6, 2).unwrap();
        assert_eq!(day.pillar, calendar::day_pillar(next));
        assert_ne!(day.pillar, calendar::day_pillar(late.date()));
    }

    struct FixedConverter;

    impl LunarConverter for FixedConverter {
        fn to_solar(&self, lunar: NaiveDate, leap_month: bool) -> Option<NaiveDate> {
            // 2024 lunar 1/1 fell on 2024-02-10.
            if lunar == NaiveDate::from_ymd_opt(2024, 1, 1)? && !leap_month {
                NaiveDate::from_ymd_opt(2024, 2, 10)
            } else {
                None
            }
        }
    }

    #[test]
    fn test_lunar_birth_needs_converter() {
        let repository = SolarTermRepository::new(solar_terms::EphemerisSource::new(540));
        let config = EngineConfig::default();
        let lunar = BirthInfo {
            date_time: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            gender: Gender::Female,
            calendar: CalendarType::Lunar { leap_month: false },
        };

        let err = SajuReport::calculate(&lunar, as_of(), &repository, &config).unwrap_err();
        assert!(matches!(err, SajuError::InvalidInput(_)));

        let report =
            SajuReport::calculate_with(&lunar, as_of(), &repository, &config, Some(&FixedConverter))
                .unwrap();
        assert_eq!(report.solar_date_time, birth());
        assert_eq!(report.chart.day.hanja(), "甲辰");
        assert_eq!(report.luck.decade.direction, LuckDirection::Backward);

        let leap = BirthInfo {
            calendar: CalendarType::Lunar { leap_month: true },
            ..lunar
        };
        let err = SajuReport::calculate_with(&leap, as_of(), &repository, &config, Some(&FixedConverter))
            .unwrap_err();
        assert!(matches!(err, SajuError::InvalidInput(_)));
    }

    #[test]
    fn test_gender_parsing() {
        assert_eq!("M".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!("female".parse::<Gender>().unwrap(), Gender::Female);
        assert!("other".parse::<Gender>().is_err());
    }

    #[test]
    fn test_branch_from_clock() {
        assert_eq!(Branch::from_clock(23, 30), Branch::Ja);
        assert_eq!(Branch::from_clock(23, 29), Branch::Hae);
        assert_eq!(Branch::from_clock(1, 29), Branch::Ja);
        assert_eq!(Branch::from_clock(1, 30), Branch::Chuk);
        assert_eq!(Branch::from_clock(12, 0), Branch::O);
    }
}
