use crate::tree::{ScenarioTree, TreeError, ValueSchema};
use crate::utils;
use rand::prelude::*;
use rand_distr::Normal;
use rand_xoshiro::Xoshiro256Plus;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    #[error("the number of stages must be at least 1, got {0}")]
    InvalidStageCount(usize),
    #[error("the branch factor must be at least 1, got {0}")]
    InvalidBranchFactor(usize),
    #[error("{field} has {found} entries but {expected} variables were declared")]
    MismatchedParameters {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid walk parameters for variable {name}: std {std}, max step {max_step}")]
    InvalidWalk { name: String, std: f64, max_step: f64 },
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// One random variable of the process: where it starts at the root and how
/// far a single parent -> child transition can move it.
#[derive(Debug, Clone)]
pub struct WalkVariable {
    pub name: String,
    pub start: f64,
    pub std: f64,
    pub max_step: f64,
}

/// A truncated gaussian random walk over a set of named variables, expanded
/// into a balanced tree with `branch_factor` children per non-terminal node.
///
/// Draws are consumed from a single `Xoshiro256Plus` stream seeded from
/// `seed`, in a fixed order: for each node of the current stage (in creation
/// order), for each branch, for each variable (in declaration order).
#[derive(Debug, Clone)]
pub struct RandomWalk {
    variables: Vec<WalkVariable>,
    distributions: Vec<Normal<f64>>,
    num_stages: usize,
    branch_factor: usize,
    truncate_places: Option<i32>,
}

impl RandomWalk {
    pub fn new(
        variables: Vec<WalkVariable>,
        num_stages: usize,
        branch_factor: usize,
        truncate_places: Option<i32>,
    ) -> Result<Self, ScenarioError> {
        if num_stages < 1 {
            return Err(ScenarioError::InvalidStageCount(num_stages));
        }
        if branch_factor < 1 {
            return Err(ScenarioError::InvalidBranchFactor(branch_factor));
        }
        let mut distributions = Vec::<Normal<f64>>::with_capacity(variables.len());
        for v in variables.iter() {
            let valid_std = v.std.is_finite() && v.std >= 0.0;
            let valid_cap = v.max_step.is_finite() && v.max_step >= 0.0;
            if !(valid_std && valid_cap) {
                return Err(ScenarioError::InvalidWalk {
                    name: v.name.clone(),
                    std: v.std,
                    max_step: v.max_step,
                });
            }
            let distribution =
                Normal::new(0.0, v.std).map_err(|_| ScenarioError::InvalidWalk {
                    name: v.name.clone(),
                    std: v.std,
                    max_step: v.max_step,
                })?;
            distributions.push(distribution);
        }
        Ok(Self {
            variables,
            distributions,
            num_stages,
            branch_factor,
            truncate_places,
        })
    }

    /// Builds the walk from parallel parameter arrays, one entry per variable.
    pub fn from_parameters(
        names: &[&str],
        start_values: &[f64],
        step_std_devs: &[f64],
        step_caps: &[f64],
        num_stages: usize,
        branch_factor: usize,
        truncate_places: Option<i32>,
    ) -> Result<Self, ScenarioError> {
        let expected = names.len();
        for (field, found) in [
            ("start_values", start_values.len()),
            ("step_std_devs", step_std_devs.len()),
            ("step_caps", step_caps.len()),
        ] {
            if found != expected {
                return Err(ScenarioError::MismatchedParameters {
                    field,
                    expected,
                    found,
                });
            }
        }
        let variables = names
            .iter()
            .enumerate()
            .map(|(i, name)| WalkVariable {
                name: name.to_string(),
                start: start_values[i],
                std: step_std_devs[i],
                max_step: step_caps[i],
            })
            .collect();
        Self::new(
            variables,
            num_stages,
            branch_factor,
            truncate_places,
        )
    }

    pub fn schema(&self) -> ValueSchema {
        ValueSchema::new(self.variables.iter().map(|v| v.name.clone()).collect())
    }

    pub fn num_stages(&self) -> usize {
        self.num_stages
    }

    pub fn branch_factor(&self) -> usize {
        self.branch_factor
    }

    /// Total number of nodes of the generated tree:
    /// 1 + b + b^2 + ... + b^(stages - 1).
    pub fn expected_node_count(&self) -> usize {
        (0..self.num_stages)
            .map(|stage| self.branch_factor.pow(stage as u32))
            .sum()
    }

    fn step(&self, var_idx: usize, rng: &mut Xoshiro256Plus) -> f64 {
        let max_step = self.variables[var_idx].max_step;
        let amount = self.distributions[var_idx]
            .sample(rng)
            .clamp(-max_step, max_step);
        match self.truncate_places {
            Some(places) => utils::round_to_places(amount, places),
            None => amount,
        }
    }

    pub fn generate(&self, seed: u64) -> Result<ScenarioTree, ScenarioError> {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);

        let root_values = self.variables.iter().map(|v| v.start).collect();
        let mut tree = ScenarioTree::new(self.schema(), root_values);

        let mut current_nodes = vec![0];
        for _stage in 1..self.num_stages {
            let mut next_nodes =
                Vec::<usize>::with_capacity(current_nodes.len() * self.branch_factor);
            for &node_id in current_nodes.iter() {
                for _branch in 0..self.branch_factor {
                    let parent_values = &tree.nodes()[node_id].values;
                    let values: Vec<f64> = (0..self.variables.len())
                        .map(|var_idx| parent_values[var_idx] + self.step(var_idx, &mut rng))
                        .collect();
                    let child_id = tree.add_child(node_id, values)?;
                    next_nodes.push(child_id);
                }
            }
            current_nodes = next_nodes;
        }

        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price_walk(num_stages: usize, branch_factor: usize) -> RandomWalk {
        RandomWalk::from_parameters(
            &["x", "y"],
            &[100.0, 50.0],
            &[10.0, 5.0],
            &[30.0, 20.0],
            num_stages,
            branch_factor,
            Some(0),
        )
        .unwrap()
    }

    #[test]
    fn test_generate_node_count() {
        let walk = price_walk(5, 3);
        let tree = walk.generate(42).unwrap();
        assert_eq!(walk.expected_node_count(), 1 + 3 + 9 + 27 + 81);
        assert_eq!(tree.node_count(), walk.expected_node_count());
        assert_eq!(tree.stage_node_counts(), vec![1, 3, 9, 27, 81]);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_every_non_root_node_has_one_parent_in_tree() {
        let tree = price_walk(4, 2).generate(7).unwrap();
        for node in tree.nodes().iter().skip(1) {
            let parent_id = node.parent.unwrap();
            let parent = tree.get_node(parent_id).unwrap();
            assert_eq!(
                parent.children.iter().filter(|&&c| c == node.index).count(),
                1
            );
            assert_eq!(node.stage, parent.stage + 1);
        }
    }

    #[test]
    fn test_single_stage_is_root_only() {
        let tree = price_walk(1, 4).generate(0).unwrap();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.root().values, vec![100.0, 50.0]);
    }

    #[test]
    fn test_same_seed_reproduces_tree() {
        let walk = price_walk(4, 3);
        let a = walk.generate(42).unwrap();
        let b = walk.generate(42).unwrap();
        assert_eq!(a.node_count(), b.node_count());
        for (na, nb) in a.nodes().iter().zip(b.nodes().iter()) {
            assert_eq!(na.name, nb.name);
            assert_eq!(na.parent, nb.parent);
            assert_eq!(na.children, nb.children);
            let bits_a: Vec<u64> = na.values.iter().map(|v| v.to_bits()).collect();
            let bits_b: Vec<u64> = nb.values.iter().map(|v| v.to_bits()).collect();
            assert_eq!(bits_a, bits_b);
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let walk = RandomWalk::from_parameters(
            &["x"],
            &[0.0],
            &[1.0],
            &[10.0],
            3,
            2,
            None,
        )
        .unwrap();
        let a = walk.generate(1).unwrap();
        let b = walk.generate(2).unwrap();
        let values_a: Vec<f64> = a.nodes().iter().map(|n| n.values[0]).collect();
        let values_b: Vec<f64> = b.nodes().iter().map(|n| n.values[0]).collect();
        assert_ne!(values_a, values_b);
    }

    #[test]
    fn test_steps_are_clamped() {
        let walk = RandomWalk::from_parameters(
            &["wide", "frozen"],
            &[0.0, 30.0],
            &[100.0, 1.0],
            &[2.5, 0.0],
            4,
            3,
            None,
        )
        .unwrap();
        let tree = walk.generate(3).unwrap();
        for node in tree.nodes().iter().skip(1) {
            let parent = tree.get_node(node.parent.unwrap()).unwrap();
            let wide_step = node.values[0] - parent.values[0];
            assert!(wide_step.abs() <= 2.5 + 1e-12);
            assert_eq!(node.values[1], 30.0);
        }
    }

    #[test]
    fn test_truncated_steps_are_integral() {
        let tree = price_walk(3, 2).generate(11).unwrap();
        for node in tree.nodes().iter() {
            for value in node.values.iter() {
                assert_eq!(value.fract(), 0.0);
            }
        }
    }

    #[test]
    fn test_invalid_stage_count() {
        let walk = RandomWalk::from_parameters(&["x"], &[0.0], &[1.0], &[1.0], 0, 2, None);
        assert_eq!(walk.unwrap_err(), ScenarioError::InvalidStageCount(0));
    }

    #[test]
    fn test_invalid_branch_factor() {
        let walk = RandomWalk::from_parameters(&["x"], &[0.0], &[1.0], &[1.0], 2, 0, None);
        assert_eq!(walk.unwrap_err(), ScenarioError::InvalidBranchFactor(0));
    }

    #[test]
    fn test_mismatched_parameters() {
        let walk =
            RandomWalk::from_parameters(&["x", "y"], &[0.0, 1.0], &[1.0], &[1.0, 1.0], 2, 2, None);
        assert_eq!(
            walk.unwrap_err(),
            ScenarioError::MismatchedParameters {
                field: "step_std_devs",
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_negative_std_is_rejected() {
        let walk = RandomWalk::from_parameters(&["x"], &[0.0], &[-1.0], &[1.0], 2, 2, None);
        assert!(matches!(walk, Err(ScenarioError::InvalidWalk { .. })));
    }

    #[test]
    fn test_non_finite_walk_parameters_are_rejected() {
        for (std, cap) in [
            (1.0, f64::INFINITY),
            (f64::INFINITY, 1.0),
            (f64::NAN, 1.0),
            (1.0, -0.5),
        ] {
            let walk = RandomWalk::from_parameters(&["x"], &[0.0], &[std], &[cap], 2, 2, None);
            assert!(matches!(walk, Err(ScenarioError::InvalidWalk { .. })));
        }
    }

    #[test]
    fn test_zero_std_is_accepted() {
        let walk = RandomWalk::from_parameters(&["x"], &[5.0], &[0.0], &[1.0], 2, 2, None);
        let tree = walk.unwrap().generate(3).unwrap();
        assert!(tree.nodes().iter().all(|n| n.values[0] == 5.0));
    }
}
