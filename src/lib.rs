pub mod adapter;
pub mod allocation;
pub mod assembler;
pub mod chance;
pub mod input;
mod log;
pub mod model;
pub mod output;
pub mod plant;
pub mod risk_measure;
pub mod scenario;
mod solver;
pub mod tree;
pub mod utils;
use adapter::{HighsAdapter, SolverAdapter};
use assembler::{RecourseModel, RiskOptions};
use input::Input;
use std::error::Error;
use std::time::Instant;

pub fn run(input_args: &InputArgs) -> Result<(), Box<dyn Error>> {
    log::show_greeting();

    let begin = Instant::now();
    let input = Input::build(&input_args.path)?;
    log::input_reading_line(&input_args.path);

    let walk = input.tree.build_random_walk()?;
    let plant = input.plant.build_plant()?;
    let risk_measure = input.config.build_risk_measure()?;
    let chance_constraint = input.config.build_chance_constraint()?;

    let tree = walk.generate(input.tree.seed)?;
    log::tree_summary(&tree, walk.branch_factor(), input.tree.seed);

    let assembly_begin = Instant::now();
    let options = RiskOptions {
        risk_measure: risk_measure.as_ref(),
        chance_constraint: chance_constraint.as_ref(),
    };
    let model = RecourseModel::build(&tree, &plant, &options)?;
    log::assembly_summary(&model, assembly_begin.elapsed());

    let solve_begin = Instant::now();
    let adapter = HighsAdapter::new(input.config.time_limit);
    let outcome = adapter.solve(&model.program)?;
    log::solve_summary(&outcome, solve_begin.elapsed());

    log::output_generation_line(&input_args.path);
    output::generate_outputs(&tree, &model, &outcome, &input_args.path)?;

    log::show_farewell(begin.elapsed());

    Ok(())
}

pub struct InputArgs {
    pub path: String,
}

impl InputArgs {
    pub fn build(args: &[String]) -> Result<Self, &'static str> {
        if args.len() < 2 {
            return Err("Not enough arguments [PATH]");
        }

        let path = args[1].clone();

        Ok(Self { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_args_require_path() {
        let args = vec![String::from("refinery")];
        assert!(InputArgs::build(&args).is_err());
        let args = vec![String::from("refinery"), String::from("example")];
        assert_eq!(InputArgs::build(&args).unwrap().path, "example");
    }
}
