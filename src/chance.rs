use crate::model::LinearProgram;
use crate::plant::ConfigError;
use crate::risk_measure::ScenarioPath;

/// Requires at least `success_fraction` of the terminal scenarios to reach a
/// total value of `cutoff`.
///
/// Each scenario `s` gets a binary indicator `z_s` and a non-negative offset
/// mask `m_s`, linked by `value_s >= m_s` and `m_s >= cutoff * z_s`, and the
/// indicators must satisfy `sum(z) >= success_fraction * N`.
///
/// There is no big-M bound on the masks: the encoding only holds while a
/// scenario with `z_s = 1` can still raise its value above the cutoff, and
/// with `cutoff <= 0` every mask is trivially satisfied at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ChanceConstraint {
    pub cutoff: f64,
    pub success_fraction: f64,
}

/// The columns and rows the chance constraint added, per terminal scenario.
#[derive(Debug, Clone, Default)]
pub struct ChanceTerm {
    pub leaves: Vec<usize>,
    pub indicators: Vec<usize>,
    pub masks: Vec<usize>,
    pub value_rows: Vec<usize>,
    pub mask_rows: Vec<usize>,
    pub count_row: Option<usize>,
}

impl ChanceConstraint {
    pub fn new(cutoff: f64, success_fraction: f64) -> Result<Self, ConfigError> {
        if !cutoff.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "cutoff",
                value: cutoff,
            });
        }
        if !(0.0..=1.0).contains(&success_fraction) {
            return Err(ConfigError::InvalidParameter {
                name: "success_fraction",
                value: success_fraction,
            });
        }
        Ok(Self {
            cutoff,
            success_fraction,
        })
    }

    pub fn required_successes(&self, num_scenarios: usize) -> f64 {
        self.success_fraction * num_scenarios as f64
    }

    pub fn augment(&self, program: &mut LinearProgram, scenarios: &[ScenarioPath]) -> ChanceTerm {
        let mut term = ChanceTerm::default();
        if scenarios.is_empty() {
            return term;
        }
        for scenario in scenarios.iter() {
            let indicator = program
                .add_integer_column(format!("{}_chance_indicator", scenario.name), 0.0..=1.0);
            let mask = program.add_column(format!("{}_chance_mask", scenario.name), 0.0..);

            // value - mask >= 0
            let mut factors = scenario.value.merged_terms();
            factors.push((mask, -1.0));
            let value_row = program.add_row(
                format!("{}_chance_value", scenario.name),
                (-scenario.value.constant)..,
                factors,
            );

            // mask - cutoff * indicator >= 0
            let mask_row = program.add_row(
                format!("{}_chance_mask", scenario.name),
                0.0..,
                vec![(mask, 1.0), (indicator, -self.cutoff)],
            );

            term.leaves.push(scenario.leaf);
            term.indicators.push(indicator);
            term.masks.push(mask);
            term.value_rows.push(value_row);
            term.mask_rows.push(mask_row);
        }

        let count_factors = term.indicators.iter().map(|&z| (z, 1.0)).collect();
        term.count_row = Some(program.add_row(
            String::from("chance_success_count"),
            self.required_successes(scenarios.len())..,
            count_factors,
        ));
        term
    }
}
