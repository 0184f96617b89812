use serde::Serialize;
use std::collections::BTreeSet;

use super::annotations::HiddenStems;
use super::relations::RelationHit;
use super::{Chart, Element, Slot};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum StrengthBand {
    ExtremelyWeak,
    VeryWeak,
    Weak,
    Balanced,
    Strong,
    VeryStrong,
    ExtremelyStrong,
}

impl StrengthBand {
    pub fn from_score(score: f64) -> StrengthBand {
        match score {
            s if s < 0.0 => StrengthBand::ExtremelyWeak,
            s if s < 7.0 => StrengthBand::VeryWeak,
            s if s < 14.0 => StrengthBand::Weak,
            s if s < 21.0 => StrengthBand::Balanced,
            s if s < 28.0 => StrengthBand::Strong,
            s if s < 35.0 => StrengthBand::VeryStrong,
            _ => StrengthBand::ExtremelyStrong,
        }
    }

    pub fn hangul(self) -> &'static str {
        match self {
            StrengthBand::ExtremelyWeak => "극약",
            StrengthBand::VeryWeak => "태약",
            StrengthBand::Weak => "신약",
            StrengthBand::Balanced => "중화",
            StrengthBand::Strong => "신강",
            StrengthBand::VeryStrong => "태강",
            StrengthBand::ExtremelyStrong => "극왕",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum FactorKind {
    SeasonalCommand,
    DayBranchRoot,
    Root,
    Peer,
    SamePillar,
    Combination,
    RelationDiscount,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrengthFactor {
    pub kind: FactorKind,
    pub slot: Option<Slot>,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrengthResult {
    pub score: f64,
    pub band: StrengthBand,
    pub factors: Vec<StrengthFactor>,
    pub version: &'static str,
}

impl StrengthResult {
    /// Whether the day stem leans weak. Balanced charts lean by the band midpoint.
    pub fn is_weak(&self) -> bool {
        self.score < 17.5
    }
}

pub trait StrengthStrategy {
    fn version(&self) -> &'static str;
    fn score(&self, chart: &Chart, relations: &[RelationHit]) -> StrengthResult;
}

/// Seasonal command, roots, peers and combination bonuses, with one discount
/// for branches caught in a clash, penalty or harm.
#[derive(Debug, Clone)]
pub struct SeasonalRootStrategy {
    relation_discount: f64,
}

impl SeasonalRootStrategy {
    pub fn new(relation_discount: f64) -> Self {
        SeasonalRootStrategy {
            relation_discount: relation_discount.clamp(0.0, 1.0),
        }
    }
}

const BRANCH_SLOTS: [Slot; 4] = [Slot::Year, Slot::Month, Slot::Day, Slot::Hour];

fn slot_position(slot: Slot) -> Option<usize> {
    BRANCH_SLOTS.iter().position(|s| *s == slot)
}

impl StrengthStrategy for SeasonalRootStrategy {
    fn version(&self) -> &'static str {
        "seasonal-root/1"
    }

    fn score(&self, chart: &Chart, relations: &[RelationHit]) -> StrengthResult {
        let me = chart.day_stem().element();
        let mut factors = Vec::new();
        // Points credited to each branch, in year/month/day/hour order.
        let mut branch_points = [0.0f64; 4];

        let mut credit = |factors: &mut Vec<StrengthFactor>,
                          kind: FactorKind,
                          slot: Option<Slot>,
                          points: f64| {
            if points == 0.0 {
                return;
            }
            if let Some(i) = slot.and_then(slot_position) {
                if kind != FactorKind::SamePillar {
                    branch_points[i] += points;
                }
            }
            factors.push(StrengthFactor { kind, slot, points });
        };

        // Seasonal command
        let month_hidden = HiddenStems::of(chart.month.branch);
        let commands = month_hidden.main.stem.element() == me
            || month_hidden.stems().any(|s| s.element().generates() == me);
        if commands {
            credit(&mut factors, FactorKind::SeasonalCommand, Some(Slot::Month), 7.0);
        }

        // Day branch root
        if chart.day.branch.element().supports(me) {
            credit(&mut factors, FactorKind::DayBranchRoot, Some(Slot::Day), 4.0);
        }

        // General roots in the other branches
        let mut rooted = BTreeSet::new();
        for (slot, pillar) in chart.pillars() {
            if slot == Slot::Day {
                continue;
            }
            let hidden = HiddenStems::of(pillar.branch);
            let points = if hidden.main.stem.element() == me {
                3.0
            } else if hidden.contains_element(me) {
                2.0
            } else {
                continue;
            };
            rooted.insert(slot);
            credit(&mut factors, FactorKind::Root, Some(slot), points);
        }

        // Peers among stems and uncounted branches
        let peer_points = |element: Element| -> f64 {
            if element == me {
                3.0
            } else if element.generates() == me {
                2.0
            } else {
                0.0
            }
        };
        for (slot, pillar) in chart.pillars() {
            if slot == Slot::Day {
                continue;
            }
            credit(&mut factors, FactorKind::Peer, None, peer_points(pillar.stem.element()));
            let counted = rooted.contains(&slot) || (slot == Slot::Month && commands);
            if !counted {
                credit(&mut factors, FactorKind::Peer, Some(slot), peer_points(pillar.branch.element()));
            }
        }

        // Same-element pillars
        for (slot, pillar) in chart.pillars() {
            if slot == Slot::Day {
                continue;
            }
            let element = pillar.stem.element();
            if element == pillar.branch.element() {
                let points = if element.supports(me) { 4.0 } else { -4.0 };
                credit(&mut factors, FactorKind::SamePillar, Some(slot), points);
            }
        }

        // Combination transforming toward the day stem, counted once
        let combined = relations.iter().any(|hit| {
            hit.kind.is_branch_combination()
                && hit.transformation.map_or(false, |e| e.supports(me))
        });
        if combined {
            credit(&mut factors, FactorKind::Combination, None, 5.0);
        }

        // Disruptions discount each touched branch once
        let disrupted: BTreeSet<usize> = relations
            .iter()
            .filter(|hit| hit.kind.is_disruptive())
            .flat_map(|hit| hit.slots.iter().filter_map(|s| slot_position(*s)))
            .collect();
        for i in disrupted {
            let discount = -(branch_points[i] * self.relation_discount);
            if discount != 0.0 {
                factors.push(StrengthFactor {
                    kind: FactorKind::RelationDiscount,
                    slot: Some(BRANCH_SLOTS[i]),
                    points: discount,
                });
            }
        }

        let score: f64 = factors.iter().map(|f| f.points).sum();
        StrengthResult {
            score,
            band: StrengthBand::from_score(score),
            factors,
            version: self.version(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::RelationshipComposer;
    use crate::{Branch, Pillar, Stem};
    use approx::assert_relative_eq;

    fn pillar(text: &str) -> Pillar {
        let mut chars = text.chars();
        Pillar {
            stem: Stem::from_hanja(chars.next().unwrap()).unwrap(),
            branch: Branch::from_hanja(chars.next().unwrap()).unwrap(),
        }
    }

    fn score(pillars: [&str; 4], discount: f64) -> StrengthResult {
        let chart = Chart::new(pillar(pillars[0]), pillar(pillars[1]), pillar(pillars[2]), pillar(pillars[3]));
        let relations = RelationshipComposer::compose(&chart, None);
        SeasonalRootStrategy::new(discount).score(&chart, &relations)
    }

    #[test]
    fn test_bands() {
        assert_eq!(StrengthBand::from_score(-0.1), StrengthBand::ExtremelyWeak);
        assert_eq!(StrengthBand::from_score(0.0), StrengthBand::VeryWeak);
        assert_eq!(StrengthBand::from_score(13.9), StrengthBand::Weak);
        assert_eq!(StrengthBand::from_score(14.0), StrengthBand::Balanced);
        assert_eq!(StrengthBand::from_score(27.5), StrengthBand::Strong);
        assert_eq!(StrengthBand::from_score(34.0), StrengthBand::VeryStrong);
        assert_eq!(StrengthBand::from_score(35.0), StrengthBand::ExtremelyStrong);
    }

    #[test]
    fn test_rooted_wood_chart() {
        let result = score(["甲寅", "丙寅", "甲寅", "甲寅"], 0.3);
        // 7 command + 4 day root + 9 roots + 6 stem peers + 8 same-pillar
        assert_relative_eq!(result.score, 34.0);
        assert_eq!(result.band, StrengthBand::VeryStrong);
        assert!(!result.is_weak());
        assert_eq!(result.version, "seasonal-root/1");
    }

    #[test]
    fn test_seasonal_command_from_generating_hidden_stem() {
        let command = |result: &StrengthResult| {
            result
                .factors
                .iter()
                .find(|f| f.kind == FactorKind::SeasonalCommand)
                .map(|f| f.points)
        };
        // 寅's main stem is 甲, but its middle 丙 feeds a 戊 day stem.
        let earth = score(["壬子", "壬寅", "戊子", "壬子"], 0.3);
        assert_eq!(command(&earth), Some(7.0));
        // Nothing in 卯 feeds a 庚 day stem.
        let metal = score(["壬子", "辛卯", "庚子", "壬子"], 0.3);
        assert_eq!(command(&metal), None);
    }

    #[test]
    fn test_metal_heavy_wood_chart_is_weak() {
        let result = score(["庚申", "辛酉", "甲申", "丙申"], 0.3);
        assert_relative_eq!(result.score, -8.0);
        assert_eq!(result.band, StrengthBand::ExtremelyWeak);
        assert!(result.is_weak());
    }

    #[test]
    fn test_discount_applies_once_per_branch() {
        let undiscounted = score(["甲寅", "丙寅", "甲寅", "庚申"], 0.0);
        assert_relative_eq!(undiscounted.score, 20.0);
        // 寅 branches carry 3, 10 and 4 points; 申 carries none.
        let discounted = score(["甲寅", "丙寅", "甲寅", "庚申"], 0.3);
        assert_relative_eq!(discounted.score, 20.0 - 0.3 * 17.0, epsilon = 1e-9);
        let discounts = discounted
            .factors
            .iter()
            .filter(|f| f.kind == FactorKind::RelationDiscount)
            .count();
        assert_eq!(discounts, 3);
    }

    #[test]
    fn test_combination_bonus() {
        // 亥卯未 wood triad around a 乙 day stem.
        let result = score(["丁亥", "丁未", "乙卯", "丙子"], 0.3);
        assert!(result
            .factors
            .iter()
            .any(|f| f.kind == FactorKind::Combination && f.points == 5.0));
    }
}
