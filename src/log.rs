use crate::adapter::SolveOutcome;
use crate::assembler::RecourseModel;
use crate::tree::ScenarioTree;
use chrono::prelude::*;
use std::time::Duration;

/// Helper function for displaying the greeting data for the run
pub fn show_greeting() {
    let now = Local::now();
    println!("\nrefinery-rs - multistage recourse planning");
    println!("- Started at: {}", now.format("%Y-%m-%d %H:%M:%S"));
}

pub fn input_reading_line(path: &str) {
    println!("\nReading input files from '{}'", path);
}

/// Helper function for displaying the shape of the generated tree
pub fn tree_summary(tree: &ScenarioTree, branch_factor: usize, seed: u64) {
    println!("\n# Scenario tree");
    println!("- Stages: {}", tree.num_stages());
    println!("- Branch factor: {branch_factor}");
    println!("- Nodes: {}", tree.node_count());
    println!("- Seed: {seed}");
}

pub fn assembly_summary(model: &RecourseModel, time: Duration) {
    println!("\n# Model");
    println!("- Columns: {}", model.program.num_cols());
    println!("- Rows: {}", model.program.num_rows());
    println!("- Integer columns: {}", model.program.num_integer_cols());
    println!("- Scenarios: {}", model.scenarios.len());
    println!(
        "\nAssembly time: {:.2} s",
        time.as_millis() as f64 / 1000.0
    );
}

pub fn solve_summary(outcome: &SolveOutcome, time: Duration) {
    println!("\n# Solving");
    println!("- Status: {:?}", outcome.status);
    if outcome.is_optimal() {
        println!("- Objective ($): {:.2}", outcome.objective);
    }
    println!("\nSolve time: {:.2} s", time.as_millis() as f64 / 1000.0);
}

pub fn output_generation_line(path: &str) {
    println!("\nWriting outputs to '{}'", path);
}

pub fn show_farewell(time: Duration) {
    println!(
        "\nTotal running time: {:.2} s",
        time.as_millis() as f64 / 1000.0
    );
}
