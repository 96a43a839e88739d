use crate::adapter::SolveOutcome;
use crate::assembler::RecourseModel;
use crate::tree::ScenarioTree;

use csv::Writer;
use serde;
use std::error::Error;

#[derive(serde::Serialize)]
struct TreeNodeOutput<'a> {
    node: &'a str,
    parent: Option<&'a str>,
    stage: usize,
    variable: &'a str,
    value: f64,
}

pub fn write_scenario_tree(
    tree: &ScenarioTree,
    path: &str,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_path(&(path.to_owned() + "/tree.csv"))?;
    for node in tree.nodes() {
        let parent = node
            .parent
            .and_then(|id| tree.get_node(id))
            .map(|p| p.name.as_str());
        for (variable, value) in
            tree.schema().names().iter().zip(node.values.iter())
        {
            wtr.serialize(TreeNodeOutput {
                node: &node.name,
                parent,
                stage: node.stage,
                variable,
                value: *value,
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct NodeDecisionOutput<'a> {
    node: &'a str,
    stage: usize,
    variable: &'a str,
    index: usize,
    value: f64,
}

pub fn write_node_decisions(
    tree: &ScenarioTree,
    model: &RecourseModel,
    values: &[f64],
    path: &str,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_path(&(path.to_owned() + "/decisions.csv"))?;
    for node in tree.nodes() {
        let decision = model.node_decision(node.index, values);
        for (variable, block) in decision.variables.iter() {
            for (index, value) in block.iter().enumerate() {
                wtr.serialize(NodeDecisionOutput {
                    node: &node.name,
                    stage: node.stage,
                    variable,
                    index,
                    value: *value,
                })?;
            }
        }
    }
    wtr.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct ScenarioValueOutput<'a> {
    scenario: &'a str,
    value: f64,
}

fn write_scenario_values(
    tree: &ScenarioTree,
    model: &RecourseModel,
    values: &[f64],
    path: &str,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_path(&(path.to_owned() + "/scenarios.csv"))?;
    for (leaf, value) in model.scenario_values(values) {
        wtr.serialize(ScenarioValueOutput {
            scenario: &tree.nodes()[leaf].name,
            value,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the generated tree and, when the solve was optimal, the decisions
/// and the realized value of every scenario.
pub fn generate_outputs(
    tree: &ScenarioTree,
    model: &RecourseModel,
    outcome: &SolveOutcome,
    path: &str,
) -> Result<(), Box<dyn Error>> {
    write_scenario_tree(tree, path)?;
    if outcome.is_optimal() {
        write_node_decisions(tree, model, &outcome.values, path)?;
        write_scenario_values(tree, model, &outcome.values, path)?;
    }
    Ok(())
}
