use serde::Serialize;

use super::annotations::HiddenStems;
use super::{Branch, Chart, Element, Pillar, Slot, Stem};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum RelationKind {
    StemCombination,
    StemClash,
    SixCombination,
    Triad,
    HalfTriad,
    Directional,
    HalfDirectional,
    Clash,
    TriplePenalty,
    MutualPenalty,
    SelfPenalty,
    Harm,
    Destruction,
    HiddenCombination,
}

impl RelationKind {
    /// Signed strength of the relation: positive kinds bind, negative kinds break.
    pub fn weight(self) -> i32 {
        match self {
            RelationKind::StemCombination => 2,
            RelationKind::StemClash => -2,
            RelationKind::SixCombination => 2,
            RelationKind::Triad => 3,
            RelationKind::HalfTriad => 1,
            RelationKind::Directional => 3,
            RelationKind::HalfDirectional => 1,
            RelationKind::Clash => -3,
            RelationKind::TriplePenalty => -3,
            RelationKind::MutualPenalty => -2,
            RelationKind::SelfPenalty => -1,
            RelationKind::Harm => -1,
            RelationKind::Destruction => -1,
            RelationKind::HiddenCombination => 1,
        }
    }

    pub fn is_auspicious(self) -> bool {
        self.weight() > 0
    }

    /// Clash, penalty and harm kinds, which weaken the branches they touch.
    pub fn is_disruptive(self) -> bool {
        matches!(
            self,
            RelationKind::Clash
                | RelationKind::TriplePenalty
                | RelationKind::MutualPenalty
                | RelationKind::SelfPenalty
                | RelationKind::Harm
        )
    }

    pub fn is_branch_combination(self) -> bool {
        matches!(
            self,
            RelationKind::SixCombination
                | RelationKind::Triad
                | RelationKind::HalfTriad
                | RelationKind::Directional
                | RelationKind::HalfDirectional
        )
    }

    pub fn hangul(self) -> &'static str {
        match self {
            RelationKind::StemCombination => "천간합",
            RelationKind::StemClash => "천간충",
            RelationKind::SixCombination => "육합",
            RelationKind::Triad => "삼합",
            RelationKind::HalfTriad => "반합",
            RelationKind::Directional => "방합",
            RelationKind::HalfDirectional => "반방합",
            RelationKind::Clash => "충",
            RelationKind::TriplePenalty => "삼형",
            RelationKind::MutualPenalty => "상형",
            RelationKind::SelfPenalty => "자형",
            RelationKind::Harm => "해",
            RelationKind::Destruction => "파",
            RelationKind::HiddenCombination => "암합",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationHit {
    pub kind: RelationKind,
    pub slots: Vec<Slot>,
    /// Hanja of the participating symbols, in slot order.
    pub symbols: String,
    /// Element the combination turns into, for kinds that transform.
    pub transformation: Option<Element>,
}

impl RelationHit {
    pub fn weight(&self) -> i32 {
        self.kind.weight()
    }

    pub fn involves(&self, slot: Slot) -> bool {
        self.slots.contains(&slot)
    }
}

// ---------------------------
// ## Pairwise tables
// ---------------------------

/// 甲己 earth, 乙庚 metal, 丙辛 water, 丁壬 wood, 戊癸 fire.
pub fn stem_combination(a: Stem, b: Stem) -> Option<Element> {
    let (lo, hi) = (a.index().min(b.index()), a.index().max(b.index()));
    if hi - lo == 5 {
        Some([Element::Earth, Element::Metal, Element::Water, Element::Wood, Element::Fire][lo])
    } else {
        None
    }
}

/// 甲庚, 乙辛, 丙壬, 丁癸. Earth stems have no clash partner.
pub fn stem_clash(a: Stem, b: Stem) -> bool {
    let (lo, hi) = (a.index().min(b.index()), a.index().max(b.index()));
    hi - lo == 6 && lo < 4
}

/// 子丑 earth, 寅亥 wood, 卯戌 fire, 辰酉 metal, 巳申 water, 午未 fire.
pub fn six_combination(a: Branch, b: Branch) -> Option<Element> {
    if (a.index() + b.index()) % 12 != 1 {
        return None;
    }
    match a.index().min(b.index()) {
        0 => Some(Element::Earth),
        2 => Some(Element::Wood),
        3 => Some(Element::Fire),
        4 => Some(Element::Metal),
        5 => Some(Element::Water),
        6 => Some(Element::Fire),
        _ => None,
    }
}

pub fn clash(a: Branch, b: Branch) -> bool {
    a.distance_to(b) == 6
}

/// 子未, 丑午, 寅巳, 卯辰, 申亥, 酉戌.
pub fn harm(a: Branch, b: Branch) -> bool {
    a != b && (a.index() + b.index()) % 12 == 7
}

const DESTRUCTION_PAIRS: [(Branch, Branch); 6] = [
    (Branch::Ja, Branch::Yu),
    (Branch::Chuk, Branch::Jin),
    (Branch::In, Branch::Hae),
    (Branch::Myo, Branch::O),
    (Branch::Sa, Branch::Shin),
    (Branch::Mi, Branch::Sul),
];

pub fn destruction(a: Branch, b: Branch) -> bool {
    DESTRUCTION_PAIRS
        .iter()
        .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
}

pub fn mutual_penalty(a: Branch, b: Branch) -> bool {
    matches!((a, b), (Branch::Ja, Branch::Myo) | (Branch::Myo, Branch::Ja))
}

pub fn self_penalty(a: Branch, b: Branch) -> bool {
    a == b && matches!(a, Branch::Jin | Branch::O | Branch::Yu | Branch::Hae)
}

// ---------------------------
// ## Trio tables
// ---------------------------

#[derive(Debug, Clone, Copy)]
struct Trio {
    members: [Branch; 3],
    element: Element,
}

/// The middle member of each triad is its cardinal branch.
const TRIADS: [Trio; 4] = [
    Trio { members: [Branch::Shin, Branch::Ja, Branch::Jin], element: Element::Water },
    Trio { members: [Branch::Hae, Branch::Myo, Branch::Mi], element: Element::Wood },
    Trio { members: [Branch::In, Branch::O, Branch::Sul], element: Element::Fire },
    Trio { members: [Branch::Sa, Branch::Yu, Branch::Chuk], element: Element::Metal },
];

const DIRECTIONS: [Trio; 4] = [
    Trio { members: [Branch::In, Branch::Myo, Branch::Jin], element: Element::Wood },
    Trio { members: [Branch::Sa, Branch::O, Branch::Mi], element: Element::Fire },
    Trio { members: [Branch::Shin, Branch::Yu, Branch::Sul], element: Element::Metal },
    Trio { members: [Branch::Hae, Branch::Ja, Branch::Chuk], element: Element::Water },
];

const PENALTY_GROUPS: [[Branch; 3]; 2] = [
    [Branch::In, Branch::Sa, Branch::Shin],
    [Branch::Chuk, Branch::Sul, Branch::Mi],
];

/// Element of the triad containing `branch`.
pub fn triad_element(branch: Branch) -> Element {
    TRIADS
        .iter()
        .find(|t| t.members.contains(&branch))
        .map_or(branch.element(), |t| t.element)
}

/// Whether `a` and `b` are distinct members of one triad.
pub fn triad_partners(a: Branch, b: Branch) -> bool {
    a != b && TRIADS.iter().any(|t| t.members.contains(&a) && t.members.contains(&b))
}

// ---------------------------
// ## Composer
// ---------------------------

pub struct RelationshipComposer;

impl RelationshipComposer {
    /// Every relation among the chart's pillars, plus `extra` (a luck pillar)
    /// when given. Hits come out in a fixed order: stem pairs, branch pairs,
    /// trios, hidden combinations.
    pub fn compose(chart: &Chart, extra: Option<(Slot, Pillar)>) -> Vec<RelationHit> {
        let mut positions: Vec<(Slot, Pillar)> = chart.pillars().to_vec();
        positions.extend(extra);

        let mut hits = Vec::new();
        for (i, &(slot_a, a)) in positions.iter().enumerate() {
            for &(slot_b, b) in &positions[i + 1..] {
                let slots = vec![slot_a, slot_b];
                let stems = format!("{}{}", a.stem, b.stem);
                if let Some(element) = stem_combination(a.stem, b.stem) {
                    hits.push(hit(RelationKind::StemCombination, &slots, &stems, Some(element)));
                }
                if stem_clash(a.stem, b.stem) {
                    hits.push(hit(RelationKind::StemClash, &slots, &stems, None));
                }
            }
        }

        for (i, &(slot_a, a)) in positions.iter().enumerate() {
            for &(slot_b, b) in &positions[i + 1..] {
                let slots = vec![slot_a, slot_b];
                let branches = format!("{}{}", a.branch, b.branch);
                let (x, y) = (a.branch, b.branch);
                if let Some(element) = six_combination(x, y) {
                    hits.push(hit(RelationKind::SixCombination, &slots, &branches, Some(element)));
                }
                if clash(x, y) {
                    hits.push(hit(RelationKind::Clash, &slots, &branches, None));
                }
                if mutual_penalty(x, y) {
                    hits.push(hit(RelationKind::MutualPenalty, &slots, &branches, None));
                }
                if self_penalty(x, y) {
                    hits.push(hit(RelationKind::SelfPenalty, &slots, &branches, None));
                }
                if harm(x, y) {
                    hits.push(hit(RelationKind::Harm, &slots, &branches, None));
                }
                if destruction(x, y) {
                    hits.push(hit(RelationKind::Destruction, &slots, &branches, None));
                }
            }
        }

        for trio in &TRIADS {
            if let Some((slots, symbols, distinct)) = trio_members(&positions, &trio.members) {
                if distinct == 3 {
                    hits.push(hit(RelationKind::Triad, &slots, &symbols, Some(trio.element)));
                } else {
                    // A half triad transforms only when it holds the cardinal branch.
                    let cardinal = positions
                        .iter()
                        .any(|(_, p)| p.branch == trio.members[1]);
                    let element = if cardinal { Some(trio.element) } else { None };
                    hits.push(hit(RelationKind::HalfTriad, &slots, &symbols, element));
                }
            }
        }

        for trio in &DIRECTIONS {
            if let Some((slots, symbols, distinct)) = trio_members(&positions, &trio.members) {
                if distinct == 3 {
                    hits.push(hit(RelationKind::Directional, &slots, &symbols, Some(trio.element)));
                } else {
                    hits.push(hit(RelationKind::HalfDirectional, &slots, &symbols, None));
                }
            }
        }

        for group in &PENALTY_GROUPS {
            if let Some((slots, symbols, _)) = trio_members(&positions, group) {
                hits.push(hit(RelationKind::TriplePenalty, &slots, &symbols, None));
            }
        }

        for &(slot_a, a) in &positions {
            for &(slot_b, b) in &positions {
                let main = HiddenStems::of(b.branch).main.stem;
                if let Some(element) = stem_combination(a.stem, main) {
                    let slots = if slot_a == slot_b {
                        vec![slot_a]
                    } else {
                        vec![slot_a, slot_b]
                    };
                    let symbols = format!("{}{}", a.stem, b.branch);
                    hits.push(hit(RelationKind::HiddenCombination, &slots, &symbols, Some(element)));
                }
            }
        }

        hits
    }
}

fn hit(kind: RelationKind, slots: &[Slot], symbols: &str, transformation: Option<Element>) -> RelationHit {
    RelationHit {
        kind,
        slots: slots.to_vec(),
        symbols: symbols.to_string(),
        transformation,
    }
}

/// Positions holding members of `members`, when at least two distinct members
/// are present. Returns the slots, their symbols and the distinct count.
fn trio_members(
    positions: &[(Slot, Pillar)],
    members: &[Branch; 3],
) -> Option<(Vec<Slot>, String, usize)> {
    let holding: Vec<&(Slot, Pillar)> = positions
        .iter()
        .filter(|(_, p)| members.contains(&p.branch))
        .collect();
    let distinct = members
        .iter()
        .filter(|m| holding.iter().any(|(_, p)| p.branch == **m))
        .count();
    if distinct < 2 {
        return None;
    }
    let slots = holding.iter().map(|(s, _)| *s).collect();
    let symbols = holding.iter().map(|(_, p)| p.branch.hanja()).collect();
    Some((slots, symbols, distinct))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Horizon;

    fn pillar(text: &str) -> Pillar {
        let mut chars = text.chars();
        let stem = Stem::from_hanja(chars.next().unwrap()).unwrap();
        let branch = Branch::from_hanja(chars.next().unwrap()).unwrap();
        Pillar::try_new(stem, branch).unwrap()
    }

    fn chart(year: &str, month: &str, day: &str, hour: &str) -> Chart {
        Chart::new(pillar(year), pillar(month), pillar(day), pillar(hour))
    }

    fn kinds(hits: &[RelationHit]) -> Vec<RelationKind> {
        hits.iter().map(|h| h.kind).collect()
    }

    #[test]
    fn test_pair_tables_are_symmetric() {
        for a in Branch::ALL {
            for b in Branch::ALL {
                assert_eq!(six_combination(a, b), six_combination(b, a));
                assert_eq!(clash(a, b), clash(b, a));
                assert_eq!(harm(a, b), harm(b, a));
                assert_eq!(destruction(a, b), destruction(b, a));
            }
        }
        for a in Stem::ALL {
            for b in Stem::ALL {
                assert_eq!(stem_combination(a, b), stem_combination(b, a));
                assert_eq!(stem_clash(a, b), stem_clash(b, a));
            }
        }
    }

    #[test]
    fn test_pair_tables() {
        assert_eq!(stem_combination(Stem::Gap, Stem::Gi), Some(Element::Earth));
        assert_eq!(stem_combination(Stem::Gye, Stem::Mu), Some(Element::Fire));
        assert_eq!(stem_combination(Stem::Gap, Stem::Gyeong), None);
        assert!(stem_clash(Stem::Jeong, Stem::Gye));
        assert!(!stem_clash(Stem::Mu, Stem::Im));
        assert_eq!(six_combination(Branch::In, Branch::Hae), Some(Element::Wood));
        assert_eq!(six_combination(Branch::O, Branch::Mi), Some(Element::Fire));
        assert!(clash(Branch::Ja, Branch::O));
        assert!(harm(Branch::Shin, Branch::Hae));
        assert!(harm(Branch::Myo, Branch::Jin));
        assert!(destruction(Branch::Mi, Branch::Sul));
        assert!(self_penalty(Branch::O, Branch::O));
        assert!(!self_penalty(Branch::Ja, Branch::Ja));
        assert_eq!(triad_element(Branch::Jin), Element::Water);
        assert!(triad_partners(Branch::Jin, Branch::Ja));
        assert!(!triad_partners(Branch::Jin, Branch::O));
    }

    #[test]
    fn test_full_triad_transforms() {
        let hits = RelationshipComposer::compose(&chart("甲申", "丙子", "壬辰", "庚戌"), None);
        let triad = hits.iter().find(|h| h.kind == RelationKind::Triad).unwrap();
        assert_eq!(triad.transformation, Some(Element::Water));
        assert_eq!(triad.slots, vec![Slot::Year, Slot::Month, Slot::Day]);
        assert_eq!(triad.symbols, "申子辰");
        assert!(!kinds(&hits).contains(&RelationKind::HalfTriad));
        // 辰戌 clash between day and hour.
        assert!(hits
            .iter()
            .any(|h| h.kind == RelationKind::Clash && h.slots == vec![Slot::Day, Slot::Hour]));
    }

    #[test]
    fn test_half_triad_needs_cardinal_to_transform() {
        let with_cardinal = RelationshipComposer::compose(&chart("甲申", "丙子", "甲寅", "甲寅"), None);
        let half = with_cardinal.iter().find(|h| h.kind == RelationKind::HalfTriad).unwrap();
        assert_eq!(half.transformation, Some(Element::Water));

        let without = RelationshipComposer::compose(&chart("甲申", "戊辰", "甲寅", "甲寅"), None);
        let half = without.iter().find(|h| h.kind == RelationKind::HalfTriad).unwrap();
        assert_eq!(half.transformation, None);
    }

    #[test]
    fn test_penalties_and_directional() {
        let hits = RelationshipComposer::compose(&chart("甲寅", "己巳", "庚申", "丙子"), None);
        let penalty = hits.iter().find(|h| h.kind == RelationKind::TriplePenalty).unwrap();
        assert_eq!(penalty.symbols, "寅巳申");
        assert!(kinds(&hits).contains(&RelationKind::StemCombination));

        let hits = RelationshipComposer::compose(&chart("甲寅", "丁卯", "戊辰", "戊午"), None);
        let directional = hits.iter().find(|h| h.kind == RelationKind::Directional).unwrap();
        assert_eq!(directional.transformation, Some(Element::Wood));

        let hits = RelationshipComposer::compose(&chart("甲子", "丁卯", "戊午", "庚申"), None);
        let mutual = hits.iter().find(|h| h.kind == RelationKind::MutualPenalty).unwrap();
        assert_eq!(mutual.symbols, "子卯");
        assert_eq!(mutual.slots, vec![Slot::Year, Slot::Month]);
        assert_eq!(mutual.weight(), -2);
        assert!(mutual.kind.is_disruptive());
    }

    #[test]
    fn test_hidden_combination_within_pillar() {
        // 丁 combines with 亥's main stem 壬.
        let hits = RelationshipComposer::compose(&chart("丁亥", "甲辰", "甲辰", "甲辰"), None);
        let hidden = hits
            .iter()
            .find(|h| h.kind == RelationKind::HiddenCombination)
            .unwrap();
        assert_eq!(hidden.slots, vec![Slot::Year]);
        assert_eq!(hidden.transformation, Some(Element::Wood));
    }

    #[test]
    fn test_luck_pillar_participates() {
        let base = chart("甲辰", "甲辰", "甲辰", "甲辰");
        let luck = (Slot::Luck(Horizon::Year), pillar("庚戌"));
        let hits = RelationshipComposer::compose(&base, Some(luck));
        let luck_hits: Vec<_> = hits.iter().filter(|h| h.involves(luck.0)).collect();
        assert!(luck_hits.iter().any(|h| h.kind == RelationKind::Clash));
        assert!(luck_hits.iter().any(|h| h.kind == RelationKind::StemClash));
        // 辰 self-penalty among the four identical branches.
        assert!(hits.iter().any(|h| h.kind == RelationKind::SelfPenalty));
    }

    #[test]
    fn test_composition_is_deterministic() {
        let base = chart("庚申", "辛酉", "甲申", "丙申");
        assert_eq!(
            RelationshipComposer::compose(&base, None),
            RelationshipComposer::compose(&base, None)
        );
    }
}
