use serde::Serialize;

use super::annotations::{HiddenRole, HiddenStems, TenGod, TwelveStage};
use super::relations::triad_partners;
use super::{Branch, Chart, Element, Polarity, Slot, Stem};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Pattern {
    EatingGod,
    HurtingOfficer,
    IndirectWealth,
    DirectWealth,
    SevenKillings,
    DirectOfficer,
    IndirectResource,
    DirectResource,
    Prosperity,
    Blade,
}

impl Pattern {
    pub fn hangul(self) -> &'static str {
        match self {
            Pattern::EatingGod => "식신격",
            Pattern::HurtingOfficer => "상관격",
            Pattern::IndirectWealth => "편재격",
            Pattern::DirectWealth => "정재격",
            Pattern::SevenKillings => "편관격",
            Pattern::DirectOfficer => "정관격",
            Pattern::IndirectResource => "편인격",
            Pattern::DirectResource => "정인격",
            Pattern::Prosperity => "건록격",
            Pattern::Blade => "양인격",
        }
    }

    /// Element that nominally completes the pattern for a day stem of element `me`.
    pub fn remedy(self, me: Element) -> Element {
        match self {
            Pattern::EatingGod => me.controls(),
            Pattern::HurtingOfficer | Pattern::DirectOfficer => me.generated_by(),
            Pattern::SevenKillings => me.generates(),
            Pattern::IndirectWealth
            | Pattern::DirectWealth
            | Pattern::IndirectResource
            | Pattern::DirectResource
            | Pattern::Prosperity
            | Pattern::Blade => me.controlled_by(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum BranchKind {
    /// 子午卯酉
    Peak,
    /// 寅申巳亥
    Growth,
    /// 辰戌丑未
    Storage,
}

impl BranchKind {
    pub fn of(branch: Branch) -> BranchKind {
        match branch.index() % 3 {
            0 => BranchKind::Peak,
            2 => BranchKind::Growth,
            _ => BranchKind::Storage,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum SelectionReason {
    PeakMain,
    TransparentMain,
    TransparentSecondary,
    TriadMiddle,
    DefaultMain,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternResult {
    pub pattern: Option<Pattern>,
    pub branch_kind: BranchKind,
    pub selected_stem: Stem,
    pub selected_role: HiddenRole,
    pub reason: SelectionReason,
    pub ten_god: TenGod,
    pub confidence: f64,
    pub remedy: Option<Element>,
}

/// Picks the month branch's hidden stem that sets the chart's pattern.
pub fn select_stem(chart: &Chart) -> (HiddenRole, Stem, SelectionReason, f64) {
    let month = chart.month.branch;
    let hidden = HiddenStems::of(month);
    let main = (HiddenRole::Main, hidden.main.stem);
    let transparent = |stem: Stem| chart.is_transparent(stem.element());

    match BranchKind::of(month) {
        BranchKind::Peak => (main.0, main.1, SelectionReason::PeakMain, 1.0),
        BranchKind::Growth => {
            if transparent(hidden.main.stem) {
                return (main.0, main.1, SelectionReason::TransparentMain, 0.9);
            }
            let middle = hidden.middle.filter(|m| transparent(m.stem));
            let early = Some(hidden.early).filter(|e| transparent(e.stem));
            match (early, middle) {
                (_, Some(m)) => (HiddenRole::Middle, m.stem, SelectionReason::TransparentSecondary, 0.8),
                (Some(e), None) => (HiddenRole::Early, e.stem, SelectionReason::TransparentSecondary, 0.8),
                (None, None) => (main.0, main.1, SelectionReason::DefaultMain, 0.6),
            }
        }
        BranchKind::Storage => {
            if transparent(hidden.main.stem) {
                return (main.0, main.1, SelectionReason::TransparentMain, 0.9);
            }
            let in_triad = chart
                .pillars()
                .iter()
                .any(|(slot, p)| *slot != Slot::Month && triad_partners(month, p.branch));
            match hidden.middle {
                Some(m) if in_triad => (HiddenRole::Middle, m.stem, SelectionReason::TriadMiddle, 0.75),
                _ => (main.0, main.1, SelectionReason::DefaultMain, 0.6),
            }
        }
    }
}

fn pattern_for(chart: &Chart, ten_god: TenGod) -> Option<Pattern> {
    let day = chart.day_stem();
    let stage = TwelveStage::of(day, chart.month.branch);
    match ten_god {
        TenGod::EatingGod => Some(Pattern::EatingGod),
        TenGod::HurtingOfficer => Some(Pattern::HurtingOfficer),
        TenGod::IndirectWealth => Some(Pattern::IndirectWealth),
        TenGod::DirectWealth => Some(Pattern::DirectWealth),
        TenGod::SevenKillings => Some(Pattern::SevenKillings),
        TenGod::DirectOfficer => Some(Pattern::DirectOfficer),
        TenGod::IndirectResource => Some(Pattern::IndirectResource),
        TenGod::DirectResource => Some(Pattern::DirectResource),
        TenGod::Companion if stage == TwelveStage::Office => Some(Pattern::Prosperity),
        TenGod::RobWealth if day.polarity() == Polarity::Yang && stage == TwelveStage::Peak => {
            Some(Pattern::Blade)
        }
        TenGod::Companion | TenGod::RobWealth => None,
    }
}

pub fn classify(chart: &Chart) -> PatternResult {
    let (selected_role, selected_stem, reason, confidence) = select_stem(chart);
    let ten_god = TenGod::of(chart.day_stem(), selected_stem);
    let pattern = pattern_for(chart, ten_god);
    PatternResult {
        pattern,
        branch_kind: BranchKind::of(chart.month.branch),
        selected_stem,
        selected_role,
        reason,
        ten_god,
        confidence: if pattern.is_some() { confidence } else { 0.0 },
        remedy: pattern.map(|p| p.remedy(chart.day_stem().element())),
    }
}
