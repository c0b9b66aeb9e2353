//! The two built-in scoring rules

use super::{render_note, ClinicContext, RuleKind, RuleOutcome, ScoringRule};
use crate::config::{DensityRuleConfig, TransitRuleConfig};

/// Proximity to the reference transit station
#[derive(Debug, Clone)]
pub struct TransitRule {
    config: TransitRuleConfig,
}

impl TransitRule {
    pub fn new(config: TransitRuleConfig) -> Self {
        Self { config }
    }

    /// Points and note for a station duration.
    pub fn outcome(&self, duration: Option<u32>) -> RuleOutcome {
        let c = &self.config;
        let (points, template) = match duration {
            Some(d) if d <= c.threshold => (c.near_points, &c.near_note),
            Some(_) => (c.far_points, &c.far_note),
            None => (0, &c.unresolved_note),
        };
        RuleOutcome {
            kind: RuleKind::Transit,
            points,
            notes: vec![render_note(template, c.threshold, None)],
        }
    }
}

impl ScoringRule for TransitRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Transit
    }

    fn evaluate(&self, ctx: &ClinicContext<'_>) -> RuleOutcome {
        self.outcome(ctx.station_duration)
    }
}

/// Inverse clinic density: fewer clinics within reach scores higher
#[derive(Debug, Clone)]
pub struct DensityRule {
    config: DensityRuleConfig,
}

impl DensityRule {
    pub fn new(config: DensityRuleConfig) -> Self {
        Self { config }
    }

    /// Points for a count of clinics in range.
    pub fn points(&self, in_range: usize) -> u32 {
        match in_range {
            0 => self.config.isolated_points,
            1 => self.config.single_points,
            _ => self.config.crowded_points,
        }
    }
}

impl ScoringRule for DensityRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Density
    }

    fn evaluate(&self, ctx: &ClinicContext<'_>) -> RuleOutcome {
        let threshold = self.config.threshold;
        let notes: Vec<String> = ctx
            .neighbours
            .iter()
            .filter(|n| n.duration.is_some_and(|d| d <= threshold))
            .map(|n| render_note(&self.config.neighbour_note, threshold, Some(n.name)))
            .collect();

        RuleOutcome {
            kind: RuleKind::Density,
            points: self.points(notes.len()),
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Clinic, RawClinic};
    use crate::scoring::Neighbour;

    fn subject() -> Clinic {
        Clinic::from_raw(
            RawClinic {
                id: "x".into(),
                name: "X".into(),
                phone: String::new(),
                address: String::new(),
            },
            None,
        )
    }

    fn ctx<'a>(clinic: &'a Clinic, station: Option<u32>, neighbours: &[(&'a str, Option<u32>)]) -> ClinicContext<'a> {
        ClinicContext {
            clinic,
            station_duration: station,
            neighbours: neighbours
                .iter()
                .map(|&(name, duration)| Neighbour { name, duration })
                .collect(),
        }
    }

    #[test]
    fn test_transit_boundary() {
        let rule = TransitRule::new(TransitRuleConfig::default());

        let at = rule.outcome(Some(300));
        assert_eq!(at.points, 5);
        assert_eq!(at.notes, vec!["within 300m of a transit station".to_string()]);

        let past = rule.outcome(Some(301));
        assert_eq!(past.points, 3);
        assert_eq!(past.notes, vec!["transit station beyond 300m".to_string()]);

        assert_eq!(rule.outcome(Some(0)).points, 5);
    }

    #[test]
    fn test_transit_unresolved_scores_nothing() {
        let rule = TransitRule::new(TransitRuleConfig::default());
        let outcome = rule.outcome(None);
        assert_eq!(outcome.points, 0);
        assert_eq!(outcome.notes, vec!["transit duration unresolved".to_string()]);
    }

    #[test]
    fn test_density_boundary_single_in_range() {
        let clinic = subject();
        let rule = DensityRule::new(DensityRuleConfig::default());

        let outcome = rule.evaluate(&ctx(&clinic, None, &[("A", Some(500)), ("B", Some(501))]));
        assert_eq!(outcome.points, 3);
        assert_eq!(outcome.notes, vec!["within 500 units of A".to_string()]);
    }

    #[test]
    fn test_density_none_in_range() {
        let clinic = subject();
        let rule = DensityRule::new(DensityRuleConfig::default());

        let outcome = rule.evaluate(&ctx(&clinic, None, &[("A", Some(501))]));
        assert_eq!(outcome.points, 5);
        assert!(outcome.notes.is_empty());

        let alone = rule.evaluate(&ctx(&clinic, None, &[]));
        assert_eq!(alone.points, 5);
    }

    #[test]
    fn test_density_crowded() {
        let clinic = subject();
        let rule = DensityRule::new(DensityRuleConfig::default());

        let outcome = rule.evaluate(&ctx(
            &clinic,
            None,
            &[("A", Some(10)), ("B", Some(500)), ("C", Some(20))],
        ));
        assert_eq!(outcome.points, 1);
        assert_eq!(
            outcome.notes,
            vec![
                "within 500 units of A".to_string(),
                "within 500 units of B".to_string(),
                "within 500 units of C".to_string()
            ]
        );
    }

    #[test]
    fn test_density_ignores_unresolved_neighbours() {
        let clinic = subject();
        let rule = DensityRule::new(DensityRuleConfig::default());

        let outcome = rule.evaluate(&ctx(&clinic, None, &[("A", None), ("B", Some(100))]));
        assert_eq!(outcome.points, 3);
        assert_eq!(outcome.notes.len(), 1);
    }

    #[test]
    fn test_custom_templates_and_points() {
        let config = TransitRuleConfig {
            threshold: 600,
            near_points: 10,
            near_note: "{threshold}秒內可達捷運站".to_string(),
            ..Default::default()
        };
        let outcome = TransitRule::new(config).outcome(Some(550));
        assert_eq!(outcome.points, 10);
        assert_eq!(outcome.notes, vec!["600秒內可達捷運站".to_string()]);
    }
}
