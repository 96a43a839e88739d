use crate::model::{LinearExpr, LinearProgram};
use crate::plant::ConfigError;

/// The realized total value of one scenario: the sum of the node
/// contributions along the path from the root to terminal node `leaf`.
#[derive(Debug, Clone)]
pub struct ScenarioPath {
    pub leaf: usize,
    pub name: String,
    pub value: LinearExpr,
}

/// Columns and rows a risk measure added to the program, plus the term to
/// be added to the (maximised) objective.
#[derive(Debug, Clone, Default)]
pub struct RiskTerm {
    pub objective: LinearExpr,
    pub columns: Vec<usize>,
    pub rows: Vec<usize>,
}

pub trait RiskMeasure {
    fn augment(&self, program: &mut LinearProgram, scenarios: &[ScenarioPath]) -> RiskTerm;
}

pub struct Expectation {}

impl Expectation {
    pub fn new() -> Self {
        Self {}
    }
}

impl RiskMeasure for Expectation {
    fn augment(&self, _program: &mut LinearProgram, _scenarios: &[ScenarioPath]) -> RiskTerm {
        RiskTerm::default()
    }
}

/// Mean-CVaR: subtracts `weight * CVaR_beta(-value)` from the expectation,
/// where `beta` is the fraction of worst scenarios the tail averages over.
///
/// Uses the linear form
/// `CVaR_beta(L) = min_t t + 1 / (beta * N) * sum_s max(L_s - t, 0)`,
/// with one non-negative shortfall column per terminal node and a free `t`.
pub struct Cvar {
    beta: f64,
    weight: f64,
}

impl Cvar {
    pub fn new(beta: f64, weight: f64) -> Result<Self, ConfigError> {
        if !(beta > 0.0 && beta <= 1.0) {
            return Err(ConfigError::InvalidParameter {
                name: "beta",
                value: beta,
            });
        }
        if !(weight >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "weight",
                value: weight,
            });
        }
        Ok(Self { beta, weight })
    }
}

impl RiskMeasure for Cvar {
    fn augment(&self, program: &mut LinearProgram, scenarios: &[ScenarioPath]) -> RiskTerm {
        let mut term = RiskTerm::default();
        if scenarios.is_empty() {
            return term;
        }
        let tail_scale = 1.0 / (self.beta * scenarios.len() as f64);

        let threshold = program.add_column(String::from("cvar_threshold"), ..);
        term.columns.push(threshold);
        term.objective.add_term(threshold, -self.weight);

        for scenario in scenarios.iter() {
            let shortfall =
                program.add_column(format!("{}_cvar_shortfall", scenario.name), 0.0..);
            // shortfall >= -value - threshold
            let mut factors = vec![(shortfall, 1.0), (threshold, 1.0)];
            factors.extend(scenario.value.merged_terms());
            let row = program.add_row(
                format!("{}_cvar_tail", scenario.name),
                (-scenario.value.constant)..,
                factors,
            );
            term.columns.push(shortfall);
            term.rows.push(row);
            term.objective.add_term(shortfall, -self.weight * tail_scale);
        }
        term
    }
}

pub fn factory(kind: &str, beta: f64, weight: f64) -> Result<Box<dyn RiskMeasure>, ConfigError> {
    match kind {
        "expectation" => Ok(Box::new(Expectation::new())),
        "cvar" => Ok(Box::new(Cvar::new(beta, weight)?)),
        _ => Err(ConfigError::UnknownRiskMeasure(kind.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sense;

    /// Four scenarios whose values are single fixed columns.
    fn fixed_scenarios(program: &mut LinearProgram, values: &[f64]) -> Vec<ScenarioPath> {
        values
            .iter()
            .enumerate()
            .map(|(s, &v)| {
                let col = program.add_column(format!("v{}", s), v..=v);
                let mut value = LinearExpr::new();
                value.add_term(col, 1.0);
                ScenarioPath {
                    leaf: s,
                    name: format!("s{}", s),
                    value,
                }
            })
            .collect()
    }

    #[test]
    fn test_expectation_adds_nothing() {
        let mut lp = LinearProgram::new(Sense::Maximise);
        let scenarios = fixed_scenarios(&mut lp, &[1.0, 2.0]);
        let term = Expectation::new().augment(&mut lp, &scenarios);
        assert!(term.objective.terms.is_empty());
        assert_eq!(lp.num_cols(), 2);
        assert_eq!(lp.num_rows(), 0);
    }

    #[test]
    fn test_cvar_adds_one_shortfall_per_scenario() {
        let mut lp = LinearProgram::new(Sense::Maximise);
        let scenarios = fixed_scenarios(&mut lp, &[-10.0, 0.0, 10.0, 20.0]);
        let term = Cvar::new(0.25, 1.0).unwrap().augment(&mut lp, &scenarios);
        assert_eq!(term.columns.len(), 5);
        assert_eq!(term.rows.len(), 4);
        assert_eq!(lp.column(term.columns[0]).unwrap().lower, f64::NEG_INFINITY);
        assert_eq!(lp.column(term.columns[1]).unwrap().lower, 0.0);
    }

    #[test]
    fn test_cvar_term_at_value_at_risk() {
        let mut lp = LinearProgram::new(Sense::Maximise);
        let scenarios = fixed_scenarios(&mut lp, &[-10.0, 0.0, 10.0, 20.0]);
        let term = Cvar::new(0.5, 2.0).unwrap().augment(&mut lp, &scenarios);
        // losses are [10, 0, -10, -20]; the worst half averages 5, with the
        // threshold at the value at risk (0) and shortfalls [10, 0, 0, 0]
        let values = vec![-10.0, 0.0, 10.0, 20.0, 0.0, 10.0, 0.0, 0.0, 0.0];
        assert!(lp.violated_rows(&values, 1e-9).is_empty());
        assert!((term.objective.evaluate(&values) - (-2.0 * 5.0)).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_cvar_leaves_objective_unchanged() {
        let mut lp = LinearProgram::new(Sense::Maximise);
        let scenarios = fixed_scenarios(&mut lp, &[3.0, -4.0]);
        let term = Cvar::new(0.1, 0.0).unwrap().augment(&mut lp, &scenarios);
        let values = vec![3.0, -4.0, 7.0, 11.0, 13.0];
        assert_eq!(term.objective.evaluate(&values), 0.0);
    }

    #[test]
    fn test_cvar_rejects_invalid_parameters() {
        assert!(Cvar::new(0.0, 1.0).is_err());
        assert!(Cvar::new(1.5, 1.0).is_err());
        assert!(Cvar::new(0.5, -1.0).is_err());
        assert!(Cvar::new(1.0, 0.0).is_ok());
    }

    #[test]
    fn test_factory_kinds() {
        assert!(factory("expectation", 0.0, 0.0).is_ok());
        assert!(factory("cvar", 0.2, 0.5).is_ok());
        assert_eq!(
            factory("entropic", 0.2, 0.5).err(),
            Some(ConfigError::UnknownRiskMeasure(String::from("entropic")))
        );
    }

    #[test]
    fn test_tail_row_merges_repeated_columns() {
        let mut lp = LinearProgram::new(Sense::Maximise);
        let col = lp.add_column(String::from("import"), 0.0..);
        let mut value = LinearExpr::new();
        value.add_term(col, -30.0);
        value.add_term(col, -25.0);
        let scenarios = vec![ScenarioPath {
            leaf: 1,
            name: String::from("s"),
            value,
        }];
        let term = Cvar::new(1.0, 1.0).unwrap().augment(&mut lp, &scenarios);
        let row = lp.row(term.rows[0]).unwrap();
        assert_eq!(row.factors.iter().filter(|(c, _)| *c == col).count(), 1);
        assert!(row.factors.contains(&(col, -55.0)));
    }
}
