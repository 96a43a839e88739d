use crate::chance::ChanceConstraint;
use crate::plant::{self, Plant};
use crate::risk_measure::{self, RiskMeasure};
use crate::scenario::{RandomWalk, ScenarioError, WalkVariable};
use serde::Deserialize;
use serde_json;
use std::error::Error;
use std::fs;

#[derive(Deserialize, Debug, Clone)]
pub struct WalkVariableInput {
    pub name: String,
    pub start: f64,
    pub std: f64,
    pub max_step: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TreeInput {
    pub seed: u64,
    pub num_stages: usize,
    pub branch_factor: usize,
    pub truncate_places: Option<i32>,
    pub variables: Vec<WalkVariableInput>,
}

pub fn read_tree_input(filepath: &str) -> Result<TreeInput, Box<dyn Error>> {
    let contents = fs::read_to_string(filepath)
        .map_err(|e| format!("Error while reading tree file {filepath}: {e}"))?;
    let parsed: TreeInput = serde_json::from_str(&contents)?;
    Ok(parsed)
}

impl TreeInput {
    pub fn build_random_walk(&self) -> Result<RandomWalk, ScenarioError> {
        let variables = self
            .variables
            .iter()
            .map(|v| WalkVariable {
                name: v.name.clone(),
                start: v.start,
                std: v.std,
                max_step: v.max_step,
            })
            .collect();
        RandomWalk::new(
            variables,
            self.num_stages,
            self.branch_factor,
            self.truncate_places,
        )
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct PlantInput {
    pub distillation_capacity: f64,
    pub num_products: usize,
    pub crude_ratios: Vec<Vec<f64>>,
    pub refine_caps: Vec<f64>,
    pub product_ratios: Vec<Vec<f64>>,
    pub allowed_output_change: f64,
}

pub fn read_plant_input(filepath: &str) -> Result<PlantInput, Box<dyn Error>> {
    let contents = fs::read_to_string(filepath)
        .map_err(|e| format!("Error while reading plant file {filepath}: {e}"))?;
    let parsed: PlantInput = serde_json::from_str(&contents)?;
    Ok(parsed)
}

impl PlantInput {
    pub fn build_plant(&self) -> Result<Plant, plant::ConfigError> {
        Plant::new(
            self.distillation_capacity,
            self.num_products,
            self.crude_ratios.clone(),
            self.refine_caps.clone(),
            self.product_ratios.clone(),
            self.allowed_output_change,
        )
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct RiskMeasureInput {
    pub kind: String,
    #[serde(default)]
    pub beta: f64,
    #[serde(default)]
    pub weight: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChanceInput {
    pub cutoff: f64,
    pub success_fraction: f64,
}

fn default_time_limit() -> f64 {
    300.0
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub risk_measure: RiskMeasureInput,
    pub chance_constraint: Option<ChanceInput>,
    #[serde(default = "default_time_limit")]
    pub time_limit: f64,
}

pub fn read_config_input(filepath: &str) -> Result<Config, Box<dyn Error>> {
    let contents = fs::read_to_string(filepath)
        .map_err(|e| format!("Error while reading config file {filepath}: {e}"))?;
    let parsed: Config = serde_json::from_str(&contents)?;
    Ok(parsed)
}

impl Config {
    pub fn build_risk_measure(&self) -> Result<Box<dyn RiskMeasure>, plant::ConfigError> {
        let r = &self.risk_measure;
        risk_measure::factory(&r.kind, r.beta, r.weight)
    }

    pub fn build_chance_constraint(&self) -> Result<Option<ChanceConstraint>, plant::ConfigError> {
        self.chance_constraint
            .as_ref()
            .map(|c| ChanceConstraint::new(c.cutoff, c.success_fraction))
            .transpose()
    }
}

pub struct Input {
    pub config: Config,
    pub tree: TreeInput,
    pub plant: PlantInput,
}

impl Input {
    pub fn build(path: &str) -> Result<Self, Box<dyn Error>> {
        let config = read_config_input(&(path.to_owned() + "/config.json"))?;
        let tree = read_tree_input(&(path.to_owned() + "/tree.json"))?;
        let plant = read_plant_input(&(path.to_owned() + "/plant.json"))?;
        Ok(Self {
            config,
            tree,
            plant,
        })
    }
}
