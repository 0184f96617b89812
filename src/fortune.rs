use serde::Serialize;

use super::calendar::hour_stem;
use super::config::FortuneConfig;
use super::relations::{RelationHit, RelationshipComposer};
use super::useful::{ElementCensus, Role, RoleMap};
use super::{Branch, Chart, Element, Horizon, Pillar, Slot};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum FortuneGrade {
    Excellent,
    Good,
    Fair,
    Poor,
    Bad,
}

#[derive(Debug, Clone)]
pub struct GradeDef {
    pub grade: FortuneGrade,
    pub label: &'static str,
    pub threshold: f64,
}

pub const GRADES: &[GradeDef] = &[
    GradeDef { grade: FortuneGrade::Excellent, label: "대길", threshold: 9.0 },
    GradeDef { grade: FortuneGrade::Good, label: "길", threshold: 7.0 },
    GradeDef { grade: FortuneGrade::Fair, label: "평", threshold: 5.0 },
    GradeDef { grade: FortuneGrade::Poor, label: "흉", threshold: 3.0 },
    GradeDef { grade: FortuneGrade::Bad, label: "대흉", threshold: f64::NEG_INFINITY },
];

impl FortuneGrade {
    pub fn from_score(score: f64) -> FortuneGrade {
        GRADES
            .iter()
            .find(|def| score >= def.threshold)
            .map_or(FortuneGrade::Bad, |def| def.grade)
    }

    pub fn label(self) -> &'static str {
        GRADES
            .iter()
            .find(|def| def.grade == self)
            .map_or("", |def| def.label)
    }
}

pub fn role_score(role: Role) -> f64 {
    match role {
        Role::Primary => 10.0,
        Role::Supportive => 7.5,
        Role::Neutral => 5.0,
        Role::Antagonist => 2.5,
        Role::Adverse => 0.0,
    }
}

/// 0 to 10: mean role score of stem and branch, one point up or down when both
/// share an element. Without a role map every pillar is neutral.
pub fn alignment(role_map: Option<&RoleMap>, pillar: Pillar) -> f64 {
    let Some(roles) = role_map else {
        return 5.0;
    };
    let stem_role = roles.role_of(pillar.stem.element());
    let branch_role = roles.role_of(pillar.branch.element());
    let mut score = (role_score(stem_role) + role_score(branch_role)) / 2.0;
    if pillar.stem.element() == pillar.branch.element() {
        score += match stem_role {
            Role::Primary | Role::Supportive => 1.0,
            Role::Neutral => 0.0,
            Role::Adverse | Role::Antagonist => -1.0,
        };
    }
    score.clamp(0.0, 10.0)
}

/// Strongest relation between `slot` and the base chart: largest magnitude,
/// then positive sign, then first detected. Hits confined to luck slots
/// (a luck pillar combining with itself) do not count.
pub fn strongest_relation(hits: &[RelationHit], slot: Slot) -> Option<&RelationHit> {
    let reaches_chart =
        |hit: &RelationHit| hit.slots.iter().any(|s| !matches!(s, Slot::Luck(_)));
    let mut best: Option<&RelationHit> = None;
    for hit in hits.iter().filter(|h| h.involves(slot) && reaches_chart(h)) {
        let better = match best {
            None => true,
            Some(current) => {
                let (w, c) = (hit.weight(), current.weight());
                w.abs() > c.abs() || (w.abs() == c.abs() && w > 0 && c < 0)
            }
        };
        if better {
            best = Some(hit);
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonScore {
    pub horizon: Horizon,
    pub pillar: Pillar,
    pub alignment: f64,
    pub relationship: f64,
    pub relation: Option<RelationHit>,
    pub sub_score: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunitySlot {
    pub branch: Branch,
    pub pillar: Pillar,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resonance {
    pub chart_element: Element,
    pub external_element: Element,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FortuneScore {
    pub final_score: f64,
    pub grade: FortuneGrade,
    pub horizons: Vec<HorizonScore>,
    /// Two-hour windows of the day horizon, scored by alignment only.
    pub opportunity: Vec<OpportunitySlot>,
    pub resonance: Option<Resonance>,
}

pub struct FortuneScoreAggregator<'a> {
    config: &'a FortuneConfig,
}

impl<'a> FortuneScoreAggregator<'a> {
    pub fn new(config: &'a FortuneConfig) -> Self {
        FortuneScoreAggregator { config }
    }

    fn weight(&self, horizon: Horizon) -> f64 {
        match horizon {
            Horizon::Decade => self.config.decade_weight,
            Horizon::Year => self.config.year_weight,
            Horizon::Month => self.config.month_weight,
            Horizon::Day => self.config.day_weight,
        }
    }

    pub fn score(
        &self,
        chart: &Chart,
        role_map: Option<&RoleMap>,
        horizons: &[(Horizon, Pillar)],
    ) -> FortuneScore {
        let horizon_scores: Vec<HorizonScore> = horizons
            .iter()
            .map(|&(horizon, pillar)| {
                let slot = Slot::Luck(horizon);
                let hits = RelationshipComposer::compose(chart, Some((slot, pillar)));
                let relation = strongest_relation(&hits, slot).cloned();
                let relationship = relation
                    .as_ref()
                    .map_or(0.0, |hit| hit.weight().clamp(-3, 3) as f64);
                let alignment = alignment(role_map, pillar);
                HorizonScore {
                    horizon,
                    pillar,
                    alignment,
                    relationship,
                    relation,
                    sub_score: (alignment + relationship).clamp(0.0, 10.0),
                    weight: self.weight(horizon),
                }
            })
            .collect();

        let total_weight: f64 = horizon_scores.iter().map(|h| h.weight).sum();
        let final_score = if total_weight > 0.0 {
            let weighted: f64 = horizon_scores.iter().map(|h| h.sub_score * h.weight).sum();
            (weighted / total_weight).clamp(0.0, 10.0)
        } else {
            0.0
        };

        FortuneScore {
            final_score,
            grade: FortuneGrade::from_score(final_score),
            opportunity: opportunity_dial(role_map, horizons),
            resonance: resonance(chart, horizons),
            horizons: horizon_scores,
        }
    }
}

fn opportunity_dial(role_map: Option<&RoleMap>, horizons: &[(Horizon, Pillar)]) -> Vec<OpportunitySlot> {
    let Some(&(_, day)) = horizons.iter().find(|(h, _)| *h == Horizon::Day) else {
        return Vec::new();
    };
    Branch::ALL
        .iter()
        .map(|&branch| {
            let pillar = Pillar {
                stem: hour_stem(day.stem, branch),
                branch,
            };
            OpportunitySlot {
                branch,
                pillar,
                score: alignment(role_map, pillar),
            }
        })
        .collect()
}

/// How the chart's dominant element meets the combined element of the
/// year, month and day horizons.
fn resonance(chart: &Chart, horizons: &[(Horizon, Pillar)]) -> Option<Resonance> {
    let (chart_element, _) = ElementCensus::visible(chart).dominant()?;
    let mut counts = [0.0; 5];
    for (horizon, pillar) in horizons {
        if *horizon == Horizon::Decade {
            continue;
        }
        counts[pillar.stem.element().index()] += 1.0;
        counts[pillar.branch.element().index()] += 1.0;
    }
    let (external_element, _) = ElementCensus::from_counts(counts).dominant()?;
    let value = if external_element == chart_element {
        1.0
    } else if external_element.generates() == chart_element {
        0.5
    } else if chart_element.generates() == external_element {
        0.0
    } else if external_element.controls() == chart_element {
        -1.0
    } else {
        -0.5
    };
    Some(Resonance {
        chart_element,
        external_element,
        value,
    })
}
