use serde::Serialize;
use tracing::debug;

use super::annotations::HiddenStems;
use super::config::UsefulConfig;
use super::pattern::PatternResult;
use super::strength::StrengthResult;
use super::{Branch, Chart, Element, Stem};

// ---------------------------
// ## Element census
// ---------------------------

/// Per-element weight over a chart, indexed by `Element::index`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementCensus {
    pub counts: [f64; 5],
    pub percentages: [u32; 5],
}

impl ElementCensus {
    pub fn from_counts(counts: [f64; 5]) -> Self {
        ElementCensus {
            percentages: largest_remainder(&counts),
            counts,
        }
    }

    /// One point for each of the eight visible stems and branches.
    pub fn visible(chart: &Chart) -> Self {
        let mut counts = [0.0; 5];
        for stem in chart.stems() {
            counts[stem.element().index()] += 1.0;
        }
        for branch in chart.branches() {
            counts[branch.element().index()] += 1.0;
        }
        ElementCensus::from_counts(counts)
    }

    /// Stems count one point; branches split their point across hidden stems
    /// by governing days.
    pub fn weighted(chart: &Chart) -> Self {
        let mut counts = [0.0; 5];
        for stem in chart.stems() {
            counts[stem.element().index()] += 1.0;
        }
        for branch in chart.branches() {
            for (_, hidden) in HiddenStems::of(branch).iter() {
                counts[hidden.stem.element().index()] += hidden.days as f64 / 30.0;
            }
        }
        ElementCensus::from_counts(counts)
    }

    pub fn count(&self, element: Element) -> f64 {
        self.counts[element.index()]
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// Shares summing to exactly 100, or all zero for an empty census.
    pub fn percentages(&self) -> [u32; 5] {
        self.percentages
    }

    /// Largest element and its share of the total; ties go to the earlier element.
    pub fn dominant(&self) -> Option<(Element, f64)> {
        let total = self.total();
        if total <= 0.0 {
            return None;
        }
        let mut best = Element::Wood;
        for element in Element::ALL {
            if self.count(element) > self.count(best) {
                best = element;
            }
        }
        Some((best, self.count(best) / total))
    }

    pub fn missing(&self) -> Vec<Element> {
        Element::ALL
            .iter()
            .copied()
            .filter(|e| self.count(*e) == 0.0)
            .collect()
    }
}

fn largest_remainder(counts: &[f64; 5]) -> [u32; 5] {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return [0; 5];
    }
    let exact: Vec<f64> = counts.iter().map(|c| c * 100.0 / total).collect();
    let mut shares = [0u32; 5];
    for (i, value) in exact.iter().enumerate() {
        shares[i] = value.floor() as u32;
    }
    let assigned: u32 = shares.iter().sum();
    let mut order: Vec<usize> = (0..5).collect();
    // Stable sort keeps element order among equal remainders.
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
    });
    for &i in order.iter().take(100u32.saturating_sub(assigned) as usize) {
        shares[i] += 1;
    }
    shares
}

// ---------------------------
// ## Role map
// ---------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    Primary,
    Supportive,
    Neutral,
    Adverse,
    Antagonist,
}

/// Priority role of every element relative to the useful element.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct RoleMap {
    pub primary: Element,
    pub supportive: Element,
    pub neutral: Element,
    pub adverse: Element,
    pub antagonist: Element,
}

impl RoleMap {
    pub fn new(primary: Element) -> Self {
        RoleMap {
            primary,
            supportive: primary.generated_by(),
            neutral: primary.generates(),
            adverse: primary.controlled_by(),
            antagonist: primary.controls(),
        }
    }

    pub fn role_of(&self, element: Element) -> Role {
        if element == self.primary {
            Role::Primary
        } else if element == self.supportive {
            Role::Supportive
        } else if element == self.neutral {
            Role::Neutral
        } else if element == self.adverse {
            Role::Adverse
        } else {
            Role::Antagonist
        }
    }
}

// ---------------------------
// ## Resolver
// ---------------------------

/// Lenses in priority order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Tier {
    Dominant,
    Climate,
    Strength,
    Pattern,
    Remedial,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub tier: Tier,
    pub element: Element,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsefulElementResult {
    pub primary: Option<Element>,
    /// Stem of the primary element sharing the day stem's polarity.
    pub primary_stem: Option<Stem>,
    pub tier: Option<Tier>,
    pub confidence: f64,
    pub role_map: Option<RoleMap>,
    /// Every tier's proposal, chosen or not.
    pub candidates: Vec<Candidate>,
}

pub struct UsefulElementResolver<'a> {
    config: &'a UsefulConfig,
}

impl<'a> UsefulElementResolver<'a> {
    pub fn new(config: &'a UsefulConfig) -> Self {
        UsefulElementResolver { config }
    }

    pub fn resolve(
        &self,
        chart: &Chart,
        strength: &StrengthResult,
        pattern: &PatternResult,
    ) -> UsefulElementResult {
        let visible = ElementCensus::visible(chart);
        let weighted = ElementCensus::weighted(chart);
        let candidates: Vec<Candidate> = [
            self.dominant(chart, &visible, strength),
            climate(chart, &visible),
            by_strength(chart, &weighted, strength),
            by_pattern(pattern),
            remedial(&visible),
        ]
        .into_iter()
        .flatten()
        .collect();

        let chosen = candidates
            .iter()
            .find(|c| c.tier == Tier::Remedial || c.confidence >= self.config.min_confidence)
            .cloned();

        match chosen {
            Some(choice) => {
                debug!(tier = ?choice.tier, element = %choice.element, confidence = choice.confidence, "useful element resolved");
                let polarity_offset = chart.day_stem().index() % 2;
                UsefulElementResult {
                    primary: Some(choice.element),
                    primary_stem: Stem::from_index(choice.element.index() * 2 + polarity_offset),
                    tier: Some(choice.tier),
                    confidence: choice.confidence,
                    role_map: Some(RoleMap::new(choice.element)),
                    candidates,
                }
            }
            None => {
                debug!("no useful element tier qualified");
                UsefulElementResult {
                    primary: None,
                    primary_stem: None,
                    tier: None,
                    confidence: 0.0,
                    role_map: None,
                    candidates,
                }
            }
        }
    }

    /// One element filling most of the chart is followed when the day stem is
    /// weak and restrained by its controller otherwise.
    fn dominant(
        &self,
        chart: &Chart,
        visible: &ElementCensus,
        strength: &StrengthResult,
    ) -> Option<Candidate> {
        let (element, share) = visible.dominant()?;
        if share < self.config.dominant_share {
            return None;
        }
        let me = chart.day_stem().element();
        let element = if strength.is_weak() && element != me {
            element
        } else {
            element.controlled_by()
        };
        Some(Candidate {
            tier: Tier::Dominant,
            element,
            confidence: share.min(1.0),
        })
    }
}

/// Summer charts without water cool down; winter charts without fire warm up.
fn climate(chart: &Chart, visible: &ElementCensus) -> Option<Candidate> {
    let month = chart.month.branch;
    let (heat, relief) = match month {
        Branch::Sa | Branch::O | Branch::Mi => (Element::Fire, Element::Water),
        Branch::Hae | Branch::Ja | Branch::Chuk => (Element::Water, Element::Fire),
        _ => return None,
    };
    let excess = visible.count(heat);
    if excess < 3.0 || visible.count(relief) > 0.0 {
        return None;
    }
    Some(Candidate {
        tier: Tier::Climate,
        element: relief,
        confidence: (0.5 + 0.1 * (excess - 2.0)).min(0.9),
    })
}

/// Weak day stems take the stronger of resource and peer; strong ones the
/// stronger of output and officer. Ties favour resource and output.
/// Confidence grows with the distance from the balanced midpoint, so charts
/// within 3.5 points of it fall below the default threshold.
fn by_strength(chart: &Chart, weighted: &ElementCensus, strength: &StrengthResult) -> Option<Candidate> {
    let me = chart.day_stem().element();
    let (first, second) = if strength.is_weak() {
        (me.generated_by(), me)
    } else {
        (me.generates(), me.controlled_by())
    };
    let element = if weighted.count(second) > weighted.count(first) {
        second
    } else {
        first
    };
    Some(Candidate {
        tier: Tier::Strength,
        element,
        confidence: (0.3 + (strength.score - 17.5).abs() / 17.5).min(1.0),
    })
}

fn by_pattern(pattern: &PatternResult) -> Option<Candidate> {
    let element = pattern.remedy?;
    Some(Candidate {
        tier: Tier::Pattern,
        element,
        confidence: pattern.confidence * 0.8,
    })
}

/// First absent element, or its generator when that is absent too.
fn remedial(visible: &ElementCensus) -> Option<Candidate> {
    let missing = visible.missing();
    let element = *missing.first()?;
    let element = if missing.contains(&element.generated_by()) {
        element.generated_by()
    } else {
        element
    };
    Some(Candidate {
        tier: Tier::Remedial,
        element,
        confidence: 0.3,
    })
}
