use chrono::{Datelike, NaiveDateTime};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

use super::config::SolarTermConfig;
use super::ephemeris::solar_longitude_instant;
use super::{Branch, Result, SajuError};

/// The 24 solar terms in Gregorian order, starting with Minor Cold in early
/// January. Even-indexed terms open a month; odd-indexed terms fall mid-month.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SolarTerm {
    MinorCold,
    MajorCold,
    StartOfSpring,
    RainWater,
    AwakeningOfInsects,
    SpringEquinox,
    PureBrightness,
    GrainRain,
    StartOfSummer,
    GrainBuds,
    GrainInEar,
    SummerSolstice,
    MinorHeat,
    MajorHeat,
    StartOfAutumn,
    EndOfHeat,
    WhiteDew,
    AutumnEquinox,
    ColdDew,
    FrostDescent,
    StartOfWinter,
    MinorSnow,
    MajorSnow,
    WinterSolstice,
}

impl SolarTerm {
    pub const ALL: [SolarTerm; 24] = [
        SolarTerm::MinorCold,
        SolarTerm::MajorCold,
        SolarTerm::StartOfSpring,
        SolarTerm::RainWater,
        SolarTerm::AwakeningOfInsects,
        SolarTerm::SpringEquinox,
        SolarTerm::PureBrightness,
        SolarTerm::GrainRain,
        SolarTerm::StartOfSummer,
        SolarTerm::GrainBuds,
        SolarTerm::GrainInEar,
        SolarTerm::SummerSolstice,
        SolarTerm::MinorHeat,
        SolarTerm::MajorHeat,
        SolarTerm::StartOfAutumn,
        SolarTerm::EndOfHeat,
        SolarTerm::WhiteDew,
        SolarTerm::AutumnEquinox,
        SolarTerm::ColdDew,
        SolarTerm::FrostDescent,
        SolarTerm::StartOfWinter,
        SolarTerm::MinorSnow,
        SolarTerm::MajorSnow,
        SolarTerm::WinterSolstice,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<SolarTerm> {
        SolarTerm::ALL.get(index).copied()
    }

    /// Month-opening term (절기).
    pub fn is_major(self) -> bool {
        self.index() % 2 == 0
    }

    /// Apparent solar longitude at which the term begins, in degrees.
    pub fn solar_longitude(self) -> f64 {
        ((285 + 15 * self.index()) % 360) as f64
    }

    /// Rough day of year, used only to seed the ephemeris search.
    pub fn approx_day_of_year(self) -> u32 {
        (5.0 + 15.22 * self.index() as f64).round() as u32
    }

    /// Branch of the solar month a major term opens.
    pub fn month_branch(self) -> Option<Branch> {
        if self.is_major() {
            Some(Branch::cyclic(self.index() as i64 / 2 + 1))
        } else {
            None
        }
    }

    pub fn hangul(self) -> &'static str {
        [
            "소한", "대한", "입춘", "우수", "경칩", "춘분", "청명", "곡우", "입하", "소만", "망종",
            "하지", "소서", "대서", "입추", "처서", "백로", "추분", "한로", "상강", "입동", "소설",
            "대설", "동지",
        ][self.index()]
    }
}

impl fmt::Display for SolarTerm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.hangul())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolarTermEntry {
    pub term: SolarTerm,
    /// Local wall-clock instant the term begins.
    pub at: NaiveDateTime,
}

/// The 24 ordered boundaries of one Gregorian year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolarTermTable {
    pub year: i32,
    pub entries: Vec<SolarTermEntry>,
}

impl SolarTermTable {
    /// Accepts only complete, ordered tables.
    pub fn new(year: i32, entries: Vec<SolarTermEntry>) -> Option<Self> {
        let complete = entries.len() == 24
            && entries.iter().enumerate().all(|(i, e)| e.term.index() == i)
            && entries.windows(2).all(|w| w[0].at < w[1].at);
        if complete {
            Some(SolarTermTable { year, entries })
        } else {
            None
        }
    }

    pub fn entry(&self, term: SolarTerm) -> SolarTermEntry {
        self.entries[term.index()]
    }

    pub fn major_terms(&self) -> impl Iterator<Item = &SolarTermEntry> {
        self.entries.iter().filter(|e| e.term.is_major())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecadeTable {
    pub decade: i32,
    pub years: BTreeMap<i32, Arc<SolarTermTable>>,
}

impl DecadeTable {
    pub fn empty(decade: i32) -> Self {
        DecadeTable {
            decade,
            years: BTreeMap::new(),
        }
    }
}

/// On-disk shape of a decade file.
#[derive(Debug, Serialize, Deserialize)]
struct DecadeFile {
    decade: i32,
    years: BTreeMap<i32, Vec<SolarTermEntry>>,
}

impl DecadeFile {
    fn into_table(self, path: &Path) -> DecadeTable {
        let mut table = DecadeTable::empty(self.decade);
        for (year, entries) in self.years {
            match SolarTermTable::new(year, entries) {
                Some(year_table) => {
                    table.years.insert(year, Arc::new(year_table));
                }
                None => warn!(year, path = %path.display(), "skipping incomplete solar term year"),
            }
        }
        table
    }
}

pub fn decade_of(year: i32) -> i32 {
    year.div_euclid(10) * 10
}

// ---------------------------
// ## Sources
// ---------------------------

pub trait SolarTermSource: Send + Sync {
    /// Loads every year available for `decade`. Absent years are simply left
    /// out; only unreadable data is an error.
    fn load_decade(&self, decade: i32) -> Result<DecadeTable>;
}

#[derive(Debug, Clone)]
pub struct JsonDirectorySource {
    dir: PathBuf,
}

impl JsonDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonDirectorySource { dir: dir.into() }
    }

    pub fn path_for(&self, decade: i32) -> PathBuf {
        self.dir.join(format!("solar_terms_{}.json", decade))
    }
}

impl SolarTermSource for JsonDirectorySource {
    fn load_decade(&self, decade: i32) -> Result<DecadeTable> {
        let path = self.path_for(decade);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(decade, path = %path.display(), "no solar term file for decade");
                return Ok(DecadeTable::empty(decade));
            }
            Err(source) => return Err(SajuError::DataLoad { path, source }),
        };
        let file: DecadeFile = serde_json::from_str(&text)
            .map_err(|source| SajuError::DataFormat { path: path.clone(), source })?;
        Ok(file.into_table(&path))
    }
}

/// Computes boundaries from the apparent solar longitude.
#[derive(Debug, Clone)]
pub struct EphemerisSource {
    pub utc_offset_minutes: i32,
    pub first_year: i32,
    pub last_year: i32,
}

impl EphemerisSource {
    pub fn new(utc_offset_minutes: i32) -> Self {
        EphemerisSource {
            utc_offset_minutes,
            first_year: 1000,
            last_year: 3000,
        }
    }

    pub fn year_table(&self, year: i32) -> Option<SolarTermTable> {
        if year < self.first_year || year > self.last_year {
            return None;
        }
        let entries = SolarTerm::ALL
            .iter()
            .map(|&term| {
                solar_longitude_instant(
                    year,
                    term.solar_longitude(),
                    term.approx_day_of_year(),
                    self.utc_offset_minutes,
                )
                .map(|at| SolarTermEntry { term, at })
            })
            .collect::<Option<Vec<_>>>()?;
        SolarTermTable::new(year, entries)
    }
}

impl SolarTermSource for EphemerisSource {
    fn load_decade(&self, decade: i32) -> Result<DecadeTable> {
        let mut table = DecadeTable::empty(decade);
        for year in decade..decade + 10 {
            if let Some(year_table) = self.year_table(year) {
                table.years.insert(year, Arc::new(year_table));
            }
        }
        Ok(table)
    }
}

// ---------------------------
// ## Repository
// ---------------------------

/// Decade-partitioned, lazily filled cache of solar term tables. Each decade
/// is loaded at most once, even when first requested from many threads.
pub struct SolarTermRepository {
    source: Box<dyn SolarTermSource>,
    decades: DashMap<i32, Arc<OnceCell<Arc<DecadeTable>>>>,
}

impl SolarTermRepository {
    pub fn new(source: impl SolarTermSource + 'static) -> Self {
        SolarTermRepository {
            source: Box::new(source),
            decades: DashMap::new(),
        }
    }

    pub fn from_config(config: &SolarTermConfig) -> Self {
        match &config.data_dir {
            Some(dir) => SolarTermRepository::new(JsonDirectorySource::new(dir)),
            None => SolarTermRepository::new(EphemerisSource::new(config.utc_offset_minutes)),
        }
    }

    /// Process-wide repository backed by the ephemeris at Korean Standard Time.
    pub fn global() -> &'static SolarTermRepository {
        static GLOBAL: OnceLock<SolarTermRepository> = OnceLock::new();
        GLOBAL.get_or_init(|| SolarTermRepository::from_config(&SolarTermConfig::default()))
    }

    fn decade(&self, decade: i32) -> Result<Arc<DecadeTable>> {
        let cell = self.decades.entry(decade).or_default().clone();
        cell.get_or_try_init(|| {
            info!(decade, "loading solar term decade");
            self.source.load_decade(decade).map(Arc::new)
        })
        .cloned()
    }

    pub fn loaded_decades(&self) -> usize {
        self.decades.iter().filter(|entry| entry.value().get().is_some()).count()
    }

    /// Boundaries of `year`, falling back to the adjacent decades when the
    /// year's own decade does not carry it.
    pub fn get(&self, year: i32) -> Result<Arc<SolarTermTable>> {
        let home = decade_of(year);
        for decade in [home, home + 10, home - 10] {
            if let Some(table) = self.decade(decade)?.years.get(&year) {
                if decade != home {
                    debug!(year, decade, "solar term year served from adjacent decade");
                }
                return Ok(Arc::clone(table));
            }
        }
        warn!(year, "solar term year unavailable");
        Err(SajuError::MissingCalendarData { year })
    }

    pub fn term_at(&self, year: i32, term: SolarTerm) -> Result<NaiveDateTime> {
        Ok(self.get(year)?.entry(term).at)
    }

    /// The term in effect at `instant` and the one that follows it.
    pub fn boundaries_around(
        &self,
        instant: NaiveDateTime,
    ) -> Result<(SolarTermEntry, SolarTermEntry)> {
        Ok((
            self.last_at_or_before(instant, |_| true)?,
            self.first_after(instant, |_| true)?,
        ))
    }

    /// Latest boundary at or before `instant` among terms accepted by `filter`,
    /// looking back into the previous year when needed.
    pub fn last_at_or_before(
        &self,
        instant: NaiveDateTime,
        filter: impl Fn(SolarTerm) -> bool,
    ) -> Result<SolarTermEntry> {
        let year = instant.year();
        for table_year in [year, year - 1] {
            let table = self.get(table_year)?;
            if let Some(entry) = table
                .entries
                .iter()
                .rev()
                .find(|e| filter(e.term) && e.at <= instant)
            {
                return Ok(*entry);
            }
        }
        Err(SajuError::MissingCalendarData { year: year - 1 })
    }

    /// Earliest boundary strictly after `instant` among terms accepted by `filter`.
    pub fn first_after(
        &self,
        instant: NaiveDateTime,
        filter: impl Fn(SolarTerm) -> bool,
    ) -> Result<SolarTermEntry> {
        let year = instant.year();
        for table_year in [year, year + 1] {
            let table = self.get(table_year)?;
            if let Some(entry) = table.entries.iter().find(|e| filter(e.term) && e.at > instant) {
                return Ok(*entry);
            }
        }
        Err(SajuError::MissingCalendarData { year: year + 1 })
    }
}

/// Writes `solar_terms_<decade>.json` into `dir` from the given source.
pub fn export_decade(source: &dyn SolarTermSource, decade: i32, dir: &Path) -> Result<PathBuf> {
    let table = source.load_decade(decade)?;
    let file = DecadeFile {
        decade,
        years: table
            .years
            .iter()
            .map(|(&year, t)| (year, t.entries.clone()))
            .collect(),
    };
    let path = dir.join(format!("solar_terms_{}.json", decade));
    let text = serde_json::to_string_pretty(&file)
        .map_err(|source| SajuError::DataFormat { path: path.clone(), source })?;
    fs::write(&path, text).map_err(|source| SajuError::DataLoad { path: path.clone(), source })?;
    Ok(path)
}
