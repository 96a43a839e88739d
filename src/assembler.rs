//! Builds the multistage recourse model of the refinery over a scenario tree.
//!
//! Crude imports and intermediate production are non-recourse decisions,
//! taken at every internal node and shared by all of its children. Routing,
//! output and the at-price / excess breakdown are recourse decisions taken at
//! every non-root node after its prices and demands are observed.

use crate::allocation::RecourseClass::{NonRecourse, Recourse};
use crate::allocation::{self, NodeBinding, RecourseClass, Shape};
use crate::chance::{ChanceConstraint, ChanceTerm};
use crate::model::{LinearExpr, LinearProgram, Sense};
use crate::plant::{ConfigError, MarketIndices, Plant};
use crate::risk_measure::{RiskMeasure, RiskTerm, ScenarioPath};
use crate::tree::{ScenarioTree, TreeError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AssemblyError {
    #[error("structural integrity error: {0}")]
    Structure(#[from] TreeError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Helper accessor for the decision variables of the model, one binding
/// per variable family.
#[derive(Debug, Clone)]
pub struct Variables {
    pub light_crude_import: NodeBinding,
    pub heavy_crude_import: NodeBinding,
    pub intermediates: NodeBinding,
    pub intermediate_to_unit: NodeBinding,
    pub product_output: NodeBinding,
    pub prod_full_price: NodeBinding,
    pub prod_excess: NodeBinding,
}

impl Variables {
    pub fn all(&self) -> [&NodeBinding; 7] {
        [
            &self.light_crude_import,
            &self.heavy_crude_import,
            &self.intermediates,
            &self.intermediate_to_unit,
            &self.product_output,
            &self.prod_full_price,
            &self.prod_excess,
        ]
    }
}

/// The rows of one constraint family, indexed by node id.
#[derive(Debug, Clone)]
pub struct ConstraintMap {
    pub name: &'static str,
    rows: Vec<Vec<usize>>,
}

impl ConstraintMap {
    fn new(name: &'static str, node_count: usize) -> Self {
        Self {
            name,
            rows: vec![vec![]; node_count],
        }
    }

    fn push(&mut self, node_id: usize, row: usize) {
        self.rows[node_id].push(row);
    }

    pub fn get(&self, node_id: usize) -> &[usize] {
        self.rows.get(node_id).map(|r| r.as_slice()).unwrap_or(&[])
    }

    /// Ids of the nodes holding at least one row of the family.
    pub fn nodes(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_empty())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct Constraints {
    pub distillation: ConstraintMap,
    pub distillation_capacity: ConstraintMap,
    pub output_production: ConstraintMap,
    pub refining_capacity: ConstraintMap,
    pub intermediate_conservation: ConstraintMap,
    pub demand_breakdown: ConstraintMap,
    pub demand_limit: ConstraintMap,
    pub interstage_upper: ConstraintMap,
    pub interstage_lower: ConstraintMap,
}

impl Constraints {
    fn new(node_count: usize) -> Self {
        Self {
            distillation: ConstraintMap::new("distillation", node_count),
            distillation_capacity: ConstraintMap::new("distillation_capacity", node_count),
            output_production: ConstraintMap::new("output_production", node_count),
            refining_capacity: ConstraintMap::new("refining_capacity", node_count),
            intermediate_conservation: ConstraintMap::new("intermediate_conservation", node_count),
            demand_breakdown: ConstraintMap::new("demand_breakdown", node_count),
            demand_limit: ConstraintMap::new("demand_limit", node_count),
            interstage_upper: ConstraintMap::new("interstage_upper", node_count),
            interstage_lower: ConstraintMap::new("interstage_lower", node_count),
        }
    }

    pub fn all(&self) -> [&ConstraintMap; 9] {
        [
            &self.distillation,
            &self.distillation_capacity,
            &self.output_production,
            &self.refining_capacity,
            &self.intermediate_conservation,
            &self.demand_breakdown,
            &self.demand_limit,
            &self.interstage_upper,
            &self.interstage_lower,
        ]
    }
}

/// Optional risk terms layered on top of the expectation objective.
pub struct RiskOptions<'a> {
    pub risk_measure: &'a dyn RiskMeasure,
    pub chance_constraint: Option<&'a ChanceConstraint>,
}

/// Every decision taken at one node, read from a solution.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDecision {
    pub node: usize,
    pub variables: Vec<(String, Vec<f64>)>,
}

/// The assembled recourse model, ready to be handed to a solver.
#[derive(Debug, Clone)]
pub struct RecourseModel {
    pub program: LinearProgram,
    pub variables: Variables,
    pub constraints: Constraints,
    /// Columns declared non-negative by the variable allocation.
    pub domain_constraints: Vec<usize>,
    /// Unscaled contribution of each node, empty at the root.
    pub node_values: Vec<LinearExpr>,
    pub scenarios: Vec<ScenarioPath>,
    pub expectation: LinearExpr,
    pub objective: LinearExpr,
    pub risk: RiskTerm,
    pub chance: Option<ChanceTerm>,
}

/// Per-node contribution: revenue of the at-price output at the node's
/// prices minus the parent's imports at the node's crude prices.
fn node_value(
    tree: &ScenarioTree,
    node_id: usize,
    market: &MarketIndices,
    variables: &Variables,
) -> LinearExpr {
    let node = &tree.nodes()[node_id];
    let mut value = LinearExpr::new();
    let parent_id = match node.parent {
        Some(id) => id,
        None => return value,
    };
    let full_price = variables.prod_full_price.get(node_id).unwrap();
    for (output, &price_idx) in market.product_prices.iter().enumerate() {
        value.add_term(full_price.at(output), node.values[price_idx]);
    }
    let light = variables.light_crude_import.get(parent_id).unwrap();
    let heavy = variables.heavy_crude_import.get(parent_id).unwrap();
    value.add_term(light.scalar(), -node.values[market.light_crude_price]);
    value.add_term(heavy.scalar(), -node.values[market.heavy_crude_price]);
    value
}

/// Cumulative path values for every node, accumulated root-to-leaf in a
/// single breadth-first pass, then kept only at the terminal nodes.
fn scenario_paths(tree: &ScenarioTree, node_values: &[LinearExpr]) -> Vec<ScenarioPath> {
    let mut cumulative = vec![LinearExpr::new(); tree.node_count()];
    for node_id in tree.get_bfs(0) {
        if let Some(parent_id) = tree.get_parent(node_id) {
            let mut value = cumulative[parent_id].clone();
            value.add_scaled(&node_values[node_id], 1.0);
            cumulative[node_id] = value;
        }
    }
    tree.leaf_ids()
        .into_iter()
        .filter(|&leaf| !tree.is_root(leaf))
        .map(|leaf| ScenarioPath {
            leaf,
            name: tree.nodes()[leaf].name.clone(),
            value: cumulative[leaf].clone(),
        })
        .collect()
}

impl RecourseModel {
    pub fn build(
        tree: &ScenarioTree,
        plant: &Plant,
        options: &RiskOptions,
    ) -> Result<Self, AssemblyError> {
        tree.validate()?;
        plant.validate()?;
        let market = MarketIndices::resolve(tree.schema(), plant.num_products)?;
        let products = plant.num_products;
        let node_count = tree.node_count();

        let mut program = LinearProgram::new(Sense::Maximise);
        let mut domain_constraints = Vec::<usize>::new();

        // VARIABLES
        let mut allocate = |class: RecourseClass, shape: Shape, name: &str| {
            allocation::allocate(class, tree, &mut program, &mut domain_constraints, shape, name)
        };
        let light_crude_import = allocate(NonRecourse, Shape::Scalar, "light_crude_import");
        let heavy_crude_import = allocate(NonRecourse, Shape::Scalar, "heavy_crude_import");
        let intermediates = allocate(NonRecourse, Shape::Vector(products), "intermediates");
        let intermediate_to_unit = allocate(
            Recourse,
            Shape::Matrix(products, products),
            "intermediate_to_unit",
        );
        let product_output = allocate(Recourse, Shape::Vector(products), "product_output");
        let prod_full_price = allocate(Recourse, Shape::Vector(products), "prod_full_price");
        let prod_excess = allocate(Recourse, Shape::Vector(products), "prod_excess");

        let variables = Variables {
            light_crude_import,
            heavy_crude_import,
            intermediates,
            intermediate_to_unit,
            product_output,
            prod_full_price,
            prod_excess,
        };

        // CONSTRAINTS
        let mut constraints = Constraints::new(node_count);
        for node in tree.nodes() {
            let id = node.index;
            if !node.is_leaf() {
                add_distillation_rows(&mut program, &mut constraints, plant, &variables, id, &node.name);
            }
            if let Some(parent_id) = node.parent {
                add_refining_rows(
                    &mut program,
                    &mut constraints,
                    plant,
                    &variables,
                    id,
                    parent_id,
                    &node.name,
                );
                add_demand_rows(
                    &mut program,
                    &mut constraints,
                    &variables,
                    &node.values,
                    &market,
                    id,
                    &node.name,
                );
                if tree.get_parent(parent_id).is_some() {
                    add_interstage_rows(
                        &mut program,
                        &mut constraints,
                        plant,
                        &variables,
                        id,
                        parent_id,
                        &node.name,
                    );
                }
            }
        }

        // OBJECTIVE
        let stage_node_counts = tree.stage_node_counts();
        let node_values: Vec<LinearExpr> = (0..node_count)
            .map(|id| node_value(tree, id, &market, &variables))
            .collect();
        let mut expectation = LinearExpr::new();
        for node in tree.nodes().iter().filter(|n| !n.is_root()) {
            let probability = 1.0 / stage_node_counts[node.stage] as f64;
            expectation.add_scaled(&node_values[node.index], probability);
        }

        let scenarios = scenario_paths(tree, &node_values);
        let risk = options.risk_measure.augment(&mut program, &scenarios);
        let chance = options
            .chance_constraint
            .map(|chance| chance.augment(&mut program, &scenarios));

        let mut objective = expectation.clone();
        objective.add_scaled(&risk.objective, 1.0);
        program.set_objective(&objective);

        Ok(Self {
            program,
            variables,
            constraints,
            domain_constraints,
            node_values,
            scenarios,
            expectation,
            objective,
            risk,
            chance,
        })
    }

    /// Realized total value of every terminal scenario under `solution`.
    pub fn scenario_values(&self, solution: &[f64]) -> Vec<(usize, f64)> {
        self.scenarios
            .iter()
            .map(|s| (s.leaf, s.value.evaluate(solution)))
            .collect()
    }

    pub fn node_decision(&self, node_id: usize, solution: &[f64]) -> NodeDecision {
        let variables = self
            .variables
            .all()
            .iter()
            .filter_map(|binding| {
                binding
                    .get(node_id)
                    .map(|block| (binding.name.clone(), block.values(solution)))
            })
            .collect();
        NodeDecision {
            node: node_id,
            variables,
        }
    }
}

fn add_distillation_rows(
    program: &mut LinearProgram,
    constraints: &mut Constraints,
    plant: &Plant,
    variables: &Variables,
    id: usize,
    name: &str,
) {
    let light = variables.light_crude_import.get(id).unwrap().scalar();
    let heavy = variables.heavy_crude_import.get(id).unwrap().scalar();
    let intermediates = variables.intermediates.get(id).unwrap();

    for (prod, ratios) in plant.crude_ratios.iter().enumerate() {
        // intermediate = light * r_light + heavy * r_heavy
        let row = program.add_row(
            format!("{}_distillation[{}]", name, prod),
            0.0..=0.0,
            vec![
                (intermediates.at(prod), 1.0),
                (light, -ratios[0]),
                (heavy, -ratios[1]),
            ],
        );
        constraints.distillation.push(id, row);
    }

    let row = program.add_row(
        format!("{}_distillation_capacity", name),
        ..=plant.distillation_capacity,
        vec![(light, 1.0), (heavy, 1.0)],
    );
    constraints.distillation_capacity.push(id, row);
}

fn add_refining_rows(
    program: &mut LinearProgram,
    constraints: &mut Constraints,
    plant: &Plant,
    variables: &Variables,
    id: usize,
    parent_id: usize,
    name: &str,
) {
    let products = plant.num_products;
    let route = variables.intermediate_to_unit.get(id).unwrap();
    let output = variables.product_output.get(id).unwrap();
    let parent_intermediates = variables.intermediates.get(parent_id).unwrap();

    for out in 0..products {
        // output = sum_prod route[prod][out] * ratio[out][prod]
        let mut factors = vec![(output.at(out), 1.0)];
        factors.extend((0..products).map(|prod| (route.at2(prod, out), -plant.product_ratios[out][prod])));
        let row = program.add_row(format!("{}_output_production[{}]", name, out), 0.0..=0.0, factors);
        constraints.output_production.push(id, row);

        let factors = (0..products).map(|prod| (route.at2(prod, out), 1.0)).collect();
        let row = program.add_row(
            format!("{}_refining_capacity[{}]", name, out),
            ..=plant.refine_caps[out],
            factors,
        );
        constraints.refining_capacity.push(id, row);
    }

    for prod in 0..products {
        // every unit of the parent's intermediate is routed at the child
        let mut factors = vec![(parent_intermediates.at(prod), 1.0)];
        factors.extend((0..products).map(|out| (route.at2(prod, out), -1.0)));
        let row = program.add_row(
            format!("{}_intermediate_conservation[{}]", name, prod),
            0.0..=0.0,
            factors,
        );
        constraints.intermediate_conservation.push(id, row);
    }
}

fn add_demand_rows(
    program: &mut LinearProgram,
    constraints: &mut Constraints,
    variables: &Variables,
    values: &[f64],
    market: &MarketIndices,
    id: usize,
    name: &str,
) {
    let output = variables.product_output.get(id).unwrap();
    let full_price = variables.prod_full_price.get(id).unwrap();
    let excess = variables.prod_excess.get(id).unwrap();

    for (out, &demand_idx) in market.demands.iter().enumerate() {
        let row = program.add_row(
            format!("{}_demand_breakdown[{}]", name, out),
            0.0..=0.0,
            vec![
                (output.at(out), 1.0),
                (full_price.at(out), -1.0),
                (excess.at(out), -1.0),
            ],
        );
        constraints.demand_breakdown.push(id, row);

        let row = program.add_row(
            format!("{}_demand_limit[{}]", name, out),
            ..=values[demand_idx],
            vec![(full_price.at(out), 1.0)],
        );
        constraints.demand_limit.push(id, row);
    }
}

fn add_interstage_rows(
    program: &mut LinearProgram,
    constraints: &mut Constraints,
    plant: &Plant,
    variables: &Variables,
    id: usize,
    parent_id: usize,
    name: &str,
) {
    let output = variables.product_output.get(id).unwrap();
    let parent_output = variables.product_output.get(parent_id).unwrap();
    let change = plant.allowed_output_change;

    for out in 0..plant.num_products {
        let factors = vec![(output.at(out), 1.0), (parent_output.at(out), -1.0)];
        let row = program.add_row(
            format!("{}_interstage_upper[{}]", name, out),
            ..=change,
            factors.clone(),
        );
        constraints.interstage_upper.push(id, row);
        let row = program.add_row(format!("{}_interstage_lower[{}]", name, out), (-change).., factors);
        constraints.interstage_lower.push(id, row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk_measure::{Cvar, Expectation};
    use crate::scenario::RandomWalk;
    use crate::tree::ValueSchema;

    const MARKET_START: [f64; 8] = [30.0, 20.0, 50.0, 40.0, 30.0, 400.0, 300.0, 200.0];

    /// Prices stay at their starting values, only demands move.
    fn market_tree(num_stages: usize, branch_factor: usize) -> ScenarioTree {
        let names = MarketIndices::required_names(3);
        let names: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
        RandomWalk::from_parameters(
            &names,
            &MARKET_START,
            &[1.0, 1.0, 1.0, 1.0, 1.0, 30.0, 30.0, 30.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0, 60.0, 60.0, 60.0],
            num_stages,
            branch_factor,
            Some(0),
        )
        .unwrap()
        .generate(1)
        .unwrap()
    }

    fn build_expectation(tree: &ScenarioTree) -> RecourseModel {
        let expectation = Expectation::new();
        let options = RiskOptions {
            risk_measure: &expectation,
            chance_constraint: None,
        };
        RecourseModel::build(tree, &Plant::default(), &options).unwrap()
    }

    fn arbitrary_values(model: &RecourseModel) -> Vec<f64> {
        (0..model.program.num_cols())
            .map(|col| ((col * 7) % 13) as f64 - 4.0)
            .collect()
    }

    #[test]
    fn test_two_stage_model_shape() {
        let tree = market_tree(2, 2);
        let model = build_expectation(&tree);
        let vars = &model.variables;
        for binding in [
            &vars.light_crude_import,
            &vars.heavy_crude_import,
            &vars.intermediates,
        ] {
            assert_eq!(binding.len(), 1);
            assert_eq!(binding.bound_nodes(), vec![0]);
        }
        assert_eq!(vars.product_output.len(), 2);
        assert_eq!(vars.product_output.bound_nodes(), vec![1, 2]);

        let constraints = &model.constraints;
        assert_eq!(constraints.distillation.get(0).len(), 3);
        assert_eq!(constraints.distillation.num_rows(), 3);
        assert_eq!(constraints.distillation_capacity.num_rows(), 1);
        for family in [
            &constraints.output_production,
            &constraints.refining_capacity,
            &constraints.intermediate_conservation,
            &constraints.demand_breakdown,
            &constraints.demand_limit,
        ] {
            assert_eq!(family.num_rows(), 6, "{}", family.name);
            assert_eq!(family.nodes(), vec![1, 2]);
        }
        assert_eq!(constraints.interstage_upper.num_rows(), 0);
        assert_eq!(constraints.interstage_lower.num_rows(), 0);

        // 5 non-recourse columns at the root, 18 recourse columns per child
        assert_eq!(model.program.num_cols(), 5 + 2 * 18);
        assert_eq!(model.domain_constraints.len(), model.program.num_cols());
        let total: usize = constraints.all().iter().map(|c| c.num_rows()).sum();
        assert_eq!(model.program.num_rows(), total);
        assert_eq!(model.scenarios.len(), 2);
    }

    #[test]
    fn test_interstage_rows_start_at_stage_two() {
        let tree = market_tree(4, 2);
        let model = build_expectation(&tree);
        let expected: Vec<usize> = tree
            .nodes()
            .iter()
            .filter(|n| n.stage >= 2)
            .map(|n| n.index)
            .collect();
        assert_eq!(expected.len(), 12);
        assert_eq!(model.constraints.interstage_upper.nodes(), expected);
        assert_eq!(model.constraints.interstage_lower.nodes(), expected);
        assert_eq!(model.constraints.interstage_upper.num_rows(), 12 * 3);

        let node = expected[0];
        let row = model
            .program
            .row(model.constraints.interstage_upper.get(node)[0])
            .unwrap();
        assert_eq!(row.upper, Plant::default().allowed_output_change);
        let lower = model
            .program
            .row(model.constraints.interstage_lower.get(node)[0])
            .unwrap();
        assert_eq!(lower.lower, -Plant::default().allowed_output_change);
    }

    #[test]
    fn test_internal_nodes_get_non_recourse_variables() {
        let tree = market_tree(3, 2);
        let model = build_expectation(&tree);
        assert_eq!(model.variables.intermediates.bound_nodes(), vec![0, 1, 2]);
        assert_eq!(model.constraints.distillation.nodes(), vec![0, 1, 2]);
        assert_eq!(model.variables.prod_excess.len(), 6);
    }

    #[test]
    fn test_feasible_plan_satisfies_every_row() {
        let tree = market_tree(2, 1);
        let model = build_expectation(&tree);
        let vars = &model.variables;
        let mut values = vec![0.0; model.program.num_cols()];

        values[vars.light_crude_import.get(0).unwrap().scalar()] = 100.0;
        values[vars.heavy_crude_import.get(0).unwrap().scalar()] = 50.0;
        let produced = Plant::default().distill(100.0, 50.0);
        assert_eq!(produced, vec![200.0, 150.0, 100.0]);
        let intermediates = vars.intermediates.get(0).unwrap();
        let route = vars.intermediate_to_unit.get(1).unwrap();
        let output = vars.product_output.get(1).unwrap();
        let full_price = vars.prod_full_price.get(1).unwrap();
        for (prod, &amount) in produced.iter().enumerate() {
            values[intermediates.at(prod)] = amount;
            values[route.at2(prod, prod)] = amount;
            values[output.at(prod)] = amount;
            values[full_price.at(prod)] = amount;
        }

        assert!(model.program.violated_rows(&values, 1e-9).is_empty());
        // 50 * 200 + 40 * 150 + 30 * 100 - 30 * 100 - 20 * 50
        assert_eq!(model.program.objective_value(&values), 15000.0);
        assert_eq!(model.scenario_values(&values), vec![(1, 15000.0)]);

        // one unit routed away breaks conservation at the child
        values[route.at2(0, 0)] -= 1.0;
        let violated = model.program.violated_rows(&values, 1e-9);
        let conservation = model.constraints.intermediate_conservation.get(1)[0];
        assert!(violated.contains(&conservation));
    }

    #[test]
    fn test_conservation_links_parent_intermediates() {
        let tree = market_tree(2, 1);
        let model = build_expectation(&tree);
        let parent = model.variables.intermediates.get(0).unwrap();
        let route = model.variables.intermediate_to_unit.get(1).unwrap();
        for (prod, &row_id) in model
            .constraints
            .intermediate_conservation
            .get(1)
            .iter()
            .enumerate()
        {
            let row = model.program.row(row_id).unwrap();
            assert_eq!((row.lower, row.upper), (0.0, 0.0));
            assert!(row.factors.contains(&(parent.at(prod), 1.0)));
            for out in 0..3 {
                assert!(row.factors.contains(&(route.at2(prod, out), -1.0)));
            }
        }
    }

    #[test]
    fn test_demand_limit_bound_is_node_demand() {
        let tree = market_tree(3, 2);
        let model = build_expectation(&tree);
        for node in tree.nodes().iter().filter(|n| !n.is_root()) {
            for (out, &row_id) in model.constraints.demand_limit.get(node.index).iter().enumerate() {
                let row = model.program.row(row_id).unwrap();
                let demand = tree.value(node.index, &crate::plant::demand_name(out)).unwrap();
                assert_eq!(row.upper, demand);
                assert_eq!(row.name, format!("{}_demand_limit[{}]", node.name, out));
            }
        }
    }

    #[test]
    fn test_objective_coefficients_are_stage_weighted() {
        let tree = market_tree(2, 2);
        let model = build_expectation(&tree);
        let light = model.variables.light_crude_import.get(0).unwrap().scalar();
        let heavy = model.variables.heavy_crude_import.get(0).unwrap().scalar();
        let full_price = model.variables.prod_full_price.get(1).unwrap();
        let excess = model.variables.prod_excess.get(1).unwrap();
        assert_eq!(model.program.column(light).unwrap().cost, -30.0);
        assert_eq!(model.program.column(heavy).unwrap().cost, -20.0);
        assert_eq!(model.program.column(full_price.at(0)).unwrap().cost, 25.0);
        assert_eq!(model.program.column(excess.at(0)).unwrap().cost, 0.0);
        assert_eq!(model.program.sense, Sense::Maximise);
    }

    #[test]
    fn test_scenario_path_sums_node_values() {
        let tree = market_tree(3, 2);
        let model = build_expectation(&tree);
        let values = arbitrary_values(&model);
        assert_eq!(model.scenarios.len(), 4);
        for scenario in model.scenarios.iter() {
            let mut expected = 0.0;
            let mut node = Some(scenario.leaf);
            while let Some(id) = node {
                expected += model.node_values[id].evaluate(&values);
                node = tree.get_parent(id);
            }
            assert!((scenario.value.evaluate(&values) - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_weight_cvar_matches_expectation() {
        let tree = market_tree(3, 2);
        let cvar = Cvar::new(0.25, 0.0).unwrap();
        let options = RiskOptions {
            risk_measure: &cvar,
            chance_constraint: None,
        };
        let model = RecourseModel::build(&tree, &Plant::default(), &options).unwrap();
        assert_eq!(model.risk.columns.len(), 1 + 4);
        assert_eq!(model.risk.rows.len(), 4);
        let values = arbitrary_values(&model);
        assert!(
            (model.objective.evaluate(&values) - model.expectation.evaluate(&values)).abs()
                < 1e-9
        );
        assert!(
            (model.program.objective_value(&values) - model.expectation.evaluate(&values)).abs()
                < 1e-9
        );
    }

    #[test]
    fn test_zero_fraction_chance_constraint() {
        let tree = market_tree(2, 3);
        let expectation = Expectation::new();
        let chance = ChanceConstraint::new(1000.0, 0.0).unwrap();
        let options = RiskOptions {
            risk_measure: &expectation,
            chance_constraint: Some(&chance),
        };
        let model = RecourseModel::build(&tree, &Plant::default(), &options).unwrap();
        let term = model.chance.as_ref().unwrap();
        assert_eq!(term.leaves, vec![1, 2, 3]);
        assert_eq!(model.program.num_integer_cols(), 3);
        let count_row = model.program.row(term.count_row.unwrap()).unwrap();
        assert_eq!(count_row.lower, 0.0);
    }

    #[test]
    fn test_node_decision_lists_bound_variables() {
        let tree = market_tree(2, 2);
        let model = build_expectation(&tree);
        let values = vec![1.0; model.program.num_cols()];

        let root = model.node_decision(0, &values);
        let names: Vec<&str> = root.variables.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["light_crude_import", "heavy_crude_import", "intermediates"]);
        assert_eq!(root.variables[2].1, vec![1.0; 3]);

        let leaf = model.node_decision(2, &values);
        let names: Vec<&str> = leaf.variables.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["intermediate_to_unit", "product_output", "prod_full_price", "prod_excess"]
        );
        assert_eq!(leaf.variables[0].1.len(), 9);
    }

    #[test]
    fn test_single_node_tree_has_no_decisions() {
        let tree = market_tree(1, 2);
        let model = build_expectation(&tree);
        assert_eq!(model.program.num_cols(), 0);
        assert_eq!(model.program.num_rows(), 0);
        assert!(model.scenarios.is_empty());
    }

    #[test]
    fn test_missing_market_value() {
        let mut names = MarketIndices::required_names(3);
        names.pop();
        let mut tree = ScenarioTree::new(ValueSchema::new(names), MARKET_START[..7].to_vec());
        tree.add_child(0, MARKET_START[..7].to_vec()).unwrap();
        let expectation = Expectation::new();
        let options = RiskOptions {
            risk_measure: &expectation,
            chance_constraint: None,
        };
        let err = RecourseModel::build(&tree, &Plant::default(), &options).unwrap_err();
        assert_eq!(
            err,
            AssemblyError::Config(ConfigError::MissingValue(String::from("demand_2")))
        );
    }

    #[test]
    fn test_plant_shape_mismatch() {
        let tree = market_tree(2, 2);
        let mut plant = Plant::default();
        plant.refine_caps.pop();
        let expectation = Expectation::new();
        let options = RiskOptions {
            risk_measure: &expectation,
            chance_constraint: None,
        };
        let err = RecourseModel::build(&tree, &plant, &options).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::Config(ConfigError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_early_leaf_is_structural_error() {
        let schema = ValueSchema::new(MarketIndices::required_names(3));
        let mut tree = ScenarioTree::new(schema, MARKET_START.to_vec());
        let first = tree.add_child(0, MARKET_START.to_vec()).unwrap();
        tree.add_child(0, MARKET_START.to_vec()).unwrap();
        tree.add_child(first, MARKET_START.to_vec()).unwrap();
        let expectation = Expectation::new();
        let options = RiskOptions {
            risk_measure: &expectation,
            chance_constraint: None,
        };
        let err = RecourseModel::build(&tree, &Plant::default(), &options).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::Structure(TreeError::EarlyLeaf { .. })
        ));
    }
}
