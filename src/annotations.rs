use serde::Serialize;
use std::fmt;

use super::{Branch, Chart, Element, Pillar, Polarity, Slot, Stem};

// ---------------------------
// ## Ten Gods
// ---------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TenGod {
    Companion,
    RobWealth,
    EatingGod,
    HurtingOfficer,
    IndirectWealth,
    DirectWealth,
    SevenKillings,
    DirectOfficer,
    IndirectResource,
    DirectResource,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TenGodGroup {
    Peer,
    Output,
    Wealth,
    Officer,
    Resource,
}

impl TenGod {
    /// Role of `target` seen from the day stem `day`.
    pub fn of(day: Stem, target: Stem) -> TenGod {
        let same_polarity = day.polarity() == target.polarity();
        let (me, other) = (day.element(), target.element());
        let group = if other == me {
            TenGodGroup::Peer
        } else if me.generates() == other {
            TenGodGroup::Output
        } else if me.controls() == other {
            TenGodGroup::Wealth
        } else if other.controls() == me {
            TenGodGroup::Officer
        } else {
            TenGodGroup::Resource
        };
        match (group, same_polarity) {
            (TenGodGroup::Peer, true) => TenGod::Companion,
            (TenGodGroup::Peer, false) => TenGod::RobWealth,
            (TenGodGroup::Output, true) => TenGod::EatingGod,
            (TenGodGroup::Output, false) => TenGod::HurtingOfficer,
            (TenGodGroup::Wealth, true) => TenGod::IndirectWealth,
            (TenGodGroup::Wealth, false) => TenGod::DirectWealth,
            (TenGodGroup::Officer, true) => TenGod::SevenKillings,
            (TenGodGroup::Officer, false) => TenGod::DirectOfficer,
            (TenGodGroup::Resource, true) => TenGod::IndirectResource,
            (TenGodGroup::Resource, false) => TenGod::DirectResource,
        }
    }

    /// Branches are read through their main hidden stem.
    pub fn of_branch(day: Stem, target: Branch) -> TenGod {
        TenGod::of(day, HiddenStems::of(target).main.stem)
    }

    pub fn group(self) -> TenGodGroup {
        match self {
            TenGod::Companion | TenGod::RobWealth => TenGodGroup::Peer,
            TenGod::EatingGod | TenGod::HurtingOfficer => TenGodGroup::Output,
            TenGod::IndirectWealth | TenGod::DirectWealth => TenGodGroup::Wealth,
            TenGod::SevenKillings | TenGod::DirectOfficer => TenGodGroup::Officer,
            TenGod::IndirectResource | TenGod::DirectResource => TenGodGroup::Resource,
        }
    }

    pub fn hangul(self) -> &'static str {
        match self {
            TenGod::Companion => "비견",
            TenGod::RobWealth => "겁재",
            TenGod::EatingGod => "식신",
            TenGod::HurtingOfficer => "상관",
            TenGod::IndirectWealth => "편재",
            TenGod::DirectWealth => "정재",
            TenGod::SevenKillings => "편관",
            TenGod::DirectOfficer => "정관",
            TenGod::IndirectResource => "편인",
            TenGod::DirectResource => "정인",
        }
    }
}

impl fmt::Display for TenGod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.hangul())
    }
}

// ---------------------------
// ## Twelve Stages
// ---------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TwelveStage {
    Birth,
    Bath,
    Cap,
    Office,
    Peak,
    Decline,
    Sickness,
    Death,
    Tomb,
    Extinction,
    Conception,
    Nurture,
}

impl TwelveStage {
    pub const ALL: [TwelveStage; 12] = [
        TwelveStage::Birth,
        TwelveStage::Bath,
        TwelveStage::Cap,
        TwelveStage::Office,
        TwelveStage::Peak,
        TwelveStage::Decline,
        TwelveStage::Sickness,
        TwelveStage::Death,
        TwelveStage::Tomb,
        TwelveStage::Extinction,
        TwelveStage::Conception,
        TwelveStage::Nurture,
    ];

    /// Branch where `stem` is born. Yang stems then walk the ring forward,
    /// yin stems backward.
    pub fn birth_branch(stem: Stem) -> Branch {
        match stem {
            Stem::Gap => Branch::Hae,
            Stem::Eul => Branch::O,
            Stem::Byeong | Stem::Mu => Branch::In,
            Stem::Jeong | Stem::Gi => Branch::Yu,
            Stem::Gyeong => Branch::Sa,
            Stem::Sin => Branch::Ja,
            Stem::Im => Branch::Shin,
            Stem::Gye => Branch::Myo,
        }
    }

    pub fn of(stem: Stem, branch: Branch) -> TwelveStage {
        let birth = TwelveStage::birth_branch(stem);
        let step = match stem.polarity() {
            Polarity::Yang => birth.distance_to(branch),
            Polarity::Yin => branch.distance_to(birth),
        };
        TwelveStage::ALL[step]
    }

    pub fn hangul(self) -> &'static str {
        [
            "장생", "목욕", "관대", "건록", "제왕", "쇠", "병", "사", "묘", "절", "태", "양",
        ][self as usize]
    }
}

// ---------------------------
// ## Hidden Stems
// ---------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum HiddenRole {
    Early,
    Middle,
    Main,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct HiddenStem {
    pub stem: Stem,
    /// Days of the thirty-day month this stem governs.
    pub days: u8,
}

/// Stems contained in a branch with their governing days, summing to 30.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct HiddenStems {
    pub early: HiddenStem,
    pub middle: Option<HiddenStem>,
    pub main: HiddenStem,
}

const fn hs(stem: Stem, days: u8) -> HiddenStem {
    HiddenStem { stem, days }
}

impl HiddenStems {
    pub fn of(branch: Branch) -> HiddenStems {
        let (early, middle, main) = match branch {
            Branch::Ja => (hs(Stem::Im, 10), None, hs(Stem::Gye, 20)),
            Branch::Chuk => (hs(Stem::Gye, 9), Some(hs(Stem::Sin, 3)), hs(Stem::Gi, 18)),
            Branch::In => (hs(Stem::Mu, 7), Some(hs(Stem::Byeong, 7)), hs(Stem::Gap, 16)),
            Branch::Myo => (hs(Stem::Gap, 10), None, hs(Stem::Eul, 20)),
            Branch::Jin => (hs(Stem::Eul, 9), Some(hs(Stem::Gye, 3)), hs(Stem::Mu, 18)),
            Branch::Sa => (hs(Stem::Mu, 7), Some(hs(Stem::Gyeong, 7)), hs(Stem::Byeong, 16)),
            Branch::O => (hs(Stem::Byeong, 10), Some(hs(Stem::Gi, 9)), hs(Stem::Jeong, 11)),
            Branch::Mi => (hs(Stem::Jeong, 9), Some(hs(Stem::Eul, 3)), hs(Stem::Gi, 18)),
            Branch::Shin => (hs(Stem::Mu, 7), Some(hs(Stem::Im, 7)), hs(Stem::Gyeong, 16)),
            Branch::Yu => (hs(Stem::Gyeong, 10), None, hs(Stem::Sin, 20)),
            Branch::Sul => (hs(Stem::Sin, 9), Some(hs(Stem::Jeong, 3)), hs(Stem::Mu, 18)),
            Branch::Hae => (hs(Stem::Mu, 7), Some(hs(Stem::Gap, 7)), hs(Stem::Im, 16)),
        };
        HiddenStems { early, middle, main }
    }

    /// In governing order: early, middle (if any), main.
    pub fn iter(&self) -> impl Iterator<Item = (HiddenRole, HiddenStem)> {
        [
            Some((HiddenRole::Early, self.early)),
            self.middle.map(|m| (HiddenRole::Middle, m)),
            Some((HiddenRole::Main, self.main)),
        ]
        .into_iter()
        .flatten()
    }

    pub fn stems(&self) -> impl Iterator<Item = Stem> {
        self.iter().map(|(_, h)| h.stem)
    }

    pub fn contains_element(&self, element: Element) -> bool {
        self.stems().any(|s| s.element() == element)
    }

    /// Stem governing the month after `days_elapsed` whole days since the
    /// month-opening solar term.
    pub fn commanding(&self, days_elapsed: u32) -> (HiddenRole, Stem) {
        let mut boundary = 0u32;
        for (role, hidden) in self.iter() {
            boundary += hidden.days as u32;
            if days_elapsed < boundary {
                return (role, hidden.stem);
            }
        }
        (HiddenRole::Main, self.main.stem)
    }
}

// ---------------------------
// ## Spirit Markers
// ---------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum SpiritMarker {
    HeavenlyNoble,
    LiteraryStar,
    Academy,
    Blade,
    RedFlame,
    PeachBlossom,
    TravellingHorse,
    Canopy,
    WhiteTiger,
    KuiGang,
    Resentment,
    GhostGate,
}

impl SpiritMarker {
    pub fn hangul(self) -> &'static str {
        match self {
            SpiritMarker::HeavenlyNoble => "천을귀인",
            SpiritMarker::LiteraryStar => "문창귀인",
            SpiritMarker::Academy => "학당귀인",
            SpiritMarker::Blade => "양인살",
            SpiritMarker::RedFlame => "홍염살",
            SpiritMarker::PeachBlossom => "도화살",
            SpiritMarker::TravellingHorse => "역마살",
            SpiritMarker::Canopy => "화개살",
            SpiritMarker::WhiteTiger => "백호살",
            SpiritMarker::KuiGang => "괴강살",
            SpiritMarker::Resentment => "원진살",
            SpiritMarker::GhostGate => "귀문관살",
        }
    }
}

/// Rule shapes every marker is expressed in.
#[derive(Debug, Clone, Copy)]
pub enum SpiritRule {
    /// The target pillar is one of the listed pairs.
    ExactPillar(&'static [(Stem, Branch)]),
    /// The target branch forms a listed pair with the base branch, in either order.
    PairedOpposite(&'static [(Branch, Branch)]),
    /// The target branch is listed for the base stem.
    ByBaseStem(&'static [(Stem, &'static [Branch])]),
    /// The target branch is listed for the triad containing the base branch.
    ByBaseBranch(&'static [([Branch; 3], Branch)]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleBase {
    DayStem,
    DayBranch,
    /// Either the day or the year branch may serve as base.
    DayOrYearBranch,
    None,
}

#[derive(Debug, Clone, Copy)]
pub struct SpiritRuleDef {
    pub marker: SpiritMarker,
    pub base: RuleBase,
    pub rule: SpiritRule,
}

use Branch as B;
use Stem as S;

const TRIAD_WATER: [Branch; 3] = [B::Shin, B::Ja, B::Jin];
const TRIAD_FIRE: [Branch; 3] = [B::In, B::O, B::Sul];
const TRIAD_METAL: [Branch; 3] = [B::Sa, B::Yu, B::Chuk];
const TRIAD_WOOD: [Branch; 3] = [B::Hae, B::Myo, B::Mi];

pub const SPIRIT_RULES: &[SpiritRuleDef] = &[
    SpiritRuleDef {
        marker: SpiritMarker::HeavenlyNoble,
        base: RuleBase::DayStem,
        rule: SpiritRule::ByBaseStem(&[
            (S::Gap, &[B::Chuk, B::Mi]),
            (S::Eul, &[B::Ja, B::Shin]),
            (S::Byeong, &[B::Hae, B::Yu]),
            (S::Jeong, &[B::Hae, B::Yu]),
            (S::Mu, &[B::Chuk, B::Mi]),
            (S::Gi, &[B::Ja, B::Shin]),
            (S::Gyeong, &[B::Chuk, B::Mi]),
            (S::Sin, &[B::In, B::O]),
            (S::Im, &[B::Myo, B::Sa]),
            (S::Gye, &[B::Myo, B::Sa]),
        ]),
    },
    SpiritRuleDef {
        marker: SpiritMarker::LiteraryStar,
        base: RuleBase::DayStem,
        rule: SpiritRule::ByBaseStem(&[
            (S::Gap, &[B::Sa]),
            (S::Eul, &[B::O]),
            (S::Byeong, &[B::Shin]),
            (S::Jeong, &[B::Yu]),
            (S::Mu, &[B::Shin]),
            (S::Gi, &[B::Yu]),
            (S::Gyeong, &[B::Hae]),
            (S::Sin, &[B::Ja]),
            (S::Im, &[B::In]),
            (S::Gye, &[B::Myo]),
        ]),
    },
    SpiritRuleDef {
        marker: SpiritMarker::Academy,
        base: RuleBase::DayStem,
        rule: SpiritRule::ByBaseStem(&[
            (S::Gap, &[B::Hae]),
            (S::Eul, &[B::O]),
            (S::Byeong, &[B::In]),
            (S::Jeong, &[B::Yu]),
            (S::Mu, &[B::In]),
            (S::Gi, &[B::Yu]),
            (S::Gyeong, &[B::Sa]),
            (S::Sin, &[B::Ja]),
            (S::Im, &[B::Shin]),
            (S::Gye, &[B::Myo]),
        ]),
    },
    SpiritRuleDef {
        marker: SpiritMarker::Blade,
        base: RuleBase::DayStem,
        rule: SpiritRule::ByBaseStem(&[
            (S::Gap, &[B::Myo]),
            (S::Byeong, &[B::O]),
            (S::Mu, &[B::O]),
            (S::Gyeong, &[B::Yu]),
            (S::Im, &[B::Ja]),
        ]),
    },
    SpiritRuleDef {
        marker: SpiritMarker::RedFlame,
        base: RuleBase::DayStem,
        rule: SpiritRule::ByBaseStem(&[
            (S::Gap, &[B::O]),
            (S::Eul, &[B::O]),
            (S::Byeong, &[B::In]),
            (S::Jeong, &[B::Mi]),
            (S::Mu, &[B::Jin]),
            (S::Gi, &[B::Jin]),
            (S::Gyeong, &[B::Sul]),
            (S::Sin, &[B::Yu]),
            (S::Im, &[B::Ja]),
            (S::Gye, &[B::Shin]),
        ]),
    },
    SpiritRuleDef {
        marker: SpiritMarker::PeachBlossom,
        base: RuleBase::DayOrYearBranch,
        rule: SpiritRule::ByBaseBranch(&[
            (TRIAD_WATER, B::Yu),
            (TRIAD_FIRE, B::Myo),
            (TRIAD_METAL, B::O),
            (TRIAD_WOOD, B::Ja),
        ]),
    },
    SpiritRuleDef {
        marker: SpiritMarker::TravellingHorse,
        base: RuleBase::DayOrYearBranch,
        rule: SpiritRule::ByBaseBranch(&[
            (TRIAD_WATER, B::In),
            (TRIAD_FIRE, B::Shin),
            (TRIAD_METAL, B::Hae),
            (TRIAD_WOOD, B::Sa),
        ]),
    },
    SpiritRuleDef {
        marker: SpiritMarker::Canopy,
        base: RuleBase::DayOrYearBranch,
        rule: SpiritRule::ByBaseBranch(&[
            (TRIAD_WATER, B::Jin),
            (TRIAD_FIRE, B::Sul),
            (TRIAD_METAL, B::Chuk),
            (TRIAD_WOOD, B::Mi),
        ]),
    },
    SpiritRuleDef {
        marker: SpiritMarker::WhiteTiger,
        base: RuleBase::None,
        rule: SpiritRule::ExactPillar(&[
            (S::Gap, B::Jin),
            (S::Eul, B::Mi),
            (S::Byeong, B::Sul),
            (S::Jeong, B::Chuk),
            (S::Mu, B::Jin),
            (S::Im, B::Sul),
            (S::Gye, B::Chuk),
        ]),
    },
    SpiritRuleDef {
        marker: SpiritMarker::KuiGang,
        base: RuleBase::None,
        rule: SpiritRule::ExactPillar(&[
            (S::Gyeong, B::Jin),
            (S::Gyeong, B::Sul),
            (S::Im, B::Jin),
            (S::Mu, B::Sul),
        ]),
    },
    SpiritRuleDef {
        marker: SpiritMarker::Resentment,
        base: RuleBase::DayBranch,
        rule: SpiritRule::PairedOpposite(&[
            (B::Ja, B::Mi),
            (B::Chuk, B::O),
            (B::In, B::Yu),
            (B::Myo, B::Shin),
            (B::Jin, B::Hae),
            (B::Sa, B::Sul),
        ]),
    },
    SpiritRuleDef {
        marker: SpiritMarker::GhostGate,
        base: RuleBase::DayBranch,
        rule: SpiritRule::PairedOpposite(&[
            (B::Ja, B::Yu),
            (B::Chuk, B::O),
            (B::In, B::Mi),
            (B::Myo, B::Shin),
            (B::Jin, B::Hae),
            (B::Sa, B::Sul),
        ]),
    },
];

/// Generic evaluator shared by every rule variant.
pub fn evaluate(rule: &SpiritRule, base_stem: Stem, base_branch: Branch, target: Pillar) -> bool {
    match rule {
        SpiritRule::ExactPillar(pairs) => pairs
            .iter()
            .any(|&(s, b)| s == target.stem && b == target.branch),
        SpiritRule::PairedOpposite(pairs) => pairs.iter().any(|&(a, b)| {
            (a == base_branch && b == target.branch) || (b == base_branch && a == target.branch)
        }),
        SpiritRule::ByBaseStem(table) => table
            .iter()
            .find(|(s, _)| *s == base_stem)
            .map_or(false, |(_, branches)| branches.contains(&target.branch)),
        SpiritRule::ByBaseBranch(table) => table
            .iter()
            .find(|(group, _)| group.contains(&base_branch))
            .map_or(false, |&(_, branch)| branch == target.branch),
    }
}

/// The chart symbols every annotation is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Basis {
    pub day_stem: Stem,
    pub day_branch: Branch,
    pub year_branch: Branch,
}

impl Basis {
    pub fn from_chart(chart: &Chart) -> Basis {
        Basis {
            day_stem: chart.day.stem,
            day_branch: chart.day.branch,
            year_branch: chart.year.branch,
        }
    }

    pub fn spirit_markers(&self, slot: Slot, target: Pillar) -> Vec<SpiritMarker> {
        SPIRIT_RULES
            .iter()
            .filter(|def| match def.base {
                RuleBase::None => evaluate(&def.rule, self.day_stem, self.day_branch, target),
                RuleBase::DayStem => evaluate(&def.rule, self.day_stem, self.day_branch, target),
                RuleBase::DayBranch => {
                    slot != Slot::Day && evaluate(&def.rule, self.day_stem, self.day_branch, target)
                }
                RuleBase::DayOrYearBranch => {
                    (slot != Slot::Day
                        && evaluate(&def.rule, self.day_stem, self.day_branch, target))
                        || (slot != Slot::Year
                            && evaluate(&def.rule, self.day_stem, self.year_branch, target))
                }
            })
            .map(|def| def.marker)
            .collect()
    }
}

// ---------------------------
// ## Annotated Pillar
// ---------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedPillar {
    pub slot: Slot,
    pub pillar: Pillar,
    /// `None` for the day stem, which is the reference point itself.
    pub stem_god: Option<TenGod>,
    pub branch_god: TenGod,
    pub stage: TwelveStage,
    pub hidden: HiddenStems,
    pub hidden_gods: Vec<TenGod>,
    pub spirits: Vec<SpiritMarker>,
    /// Branch falls in the day pillar's void pair.
    pub void: bool,
}

impl AnnotatedPillar {
    pub fn new(basis: &Basis, slot: Slot, pillar: Pillar) -> AnnotatedPillar {
        let day = basis.day_stem;
        let hidden = HiddenStems::of(pillar.branch);
        let day_pillar = Pillar {
            stem: basis.day_stem,
            branch: basis.day_branch,
        };
        AnnotatedPillar {
            slot,
            pillar,
            stem_god: if slot == Slot::Day {
                None
            } else {
                Some(TenGod::of(day, pillar.stem))
            },
            branch_god: TenGod::of_branch(day, pillar.branch),
            stage: TwelveStage::of(day, pillar.branch),
            hidden_gods: hidden.stems().map(|s| TenGod::of(day, s)).collect(),
            hidden,
            spirits: basis.spirit_markers(slot, pillar),
            void: slot != Slot::Day && day_pillar.void_branches().contains(&pillar.branch),
        }
    }
}
