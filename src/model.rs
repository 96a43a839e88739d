//! Solver-agnostic description of the assembled optimization problem.
//!
//! Columns and rows follow the same conventions as a HiGHS row problem:
//! every column carries an objective cost and a bound interval, every row is
//! a sparse list of `(column, factor)` pairs bounded by an interval.

use std::ops::{Bound, RangeBounds};

fn bound_value(b: Bound<&f64>) -> Option<f64> {
    match b {
        Bound::Included(v) | Bound::Excluded(v) => Some(*v),
        Bound::Unbounded => None,
    }
}

/// Closed `(lower, upper)` interval of a range, infinite where unbounded.
pub(crate) fn bounds_to_interval<B: RangeBounds<f64>>(bounds: B) -> (f64, f64) {
    let low = bound_value(bounds.start_bound()).unwrap_or(f64::NEG_INFINITY);
    let high = bound_value(bounds.end_bound()).unwrap_or(f64::INFINITY);
    (low, high)
}

/// A linear expression `sum(factor * column) + constant`. Repeated columns
/// are kept as separate terms; they only add up when evaluated or when the
/// expression becomes an objective.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<(usize, f64)>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_term(&mut self, column: usize, factor: f64) {
        self.terms.push((column, factor));
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Adds `scale * other` to this expression.
    pub fn add_scaled(&mut self, other: &LinearExpr, scale: f64) {
        self.terms
            .extend(other.terms.iter().map(|&(col, factor)| (col, factor * scale)));
        self.constant += other.constant * scale;
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(col, factor)| factor * values[col])
            .sum::<f64>()
            + self.constant
    }

    /// Terms with repeated columns added up, in order of first appearance.
    pub fn merged_terms(&self) -> Vec<(usize, f64)> {
        let mut merged = Vec::<(usize, f64)>::with_capacity(self.terms.len());
        for &(col, factor) in self.terms.iter() {
            match merged.iter_mut().find(|(c, _)| *c == col) {
                Some((_, total)) => *total += factor,
                None => merged.push((col, factor)),
            }
        }
        merged
    }

    /// Dense coefficient vector over `num_cols` columns.
    pub fn coefficients(&self, num_cols: usize) -> Vec<f64> {
        let mut coefficients = vec![0.0; num_cols];
        for &(col, factor) in self.terms.iter() {
            coefficients[col] += factor;
        }
        coefficients
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sense {
    Maximise,
    Minimise,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cost: f64,
    pub lower: f64,
    pub upper: f64,
    pub integer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    pub factors: Vec<(usize, f64)>,
}

impl Row {
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.factors
            .iter()
            .map(|&(col, factor)| factor * values[col])
            .sum()
    }

    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let activity = self.activity(values);
        activity >= self.lower - tolerance && activity <= self.upper + tolerance
    }
}

/// An optimization problem over continuous (and optionally integer) columns
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgram {
    pub sense: Sense,
    pub offset: f64,
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl LinearProgram {
    pub fn new(sense: Sense) -> Self {
        Self {
            sense,
            offset: 0.0,
            columns: vec![],
            rows: vec![],
        }
    }

    pub fn add_column<B: RangeBounds<f64>>(
        &mut self,
        name: String,
        bounds: B,
    ) -> usize {
        let (lower, upper) = bounds_to_interval(bounds);
        self.columns.push(Column {
            name,
            cost: 0.0,
            lower,
            upper,
            integer: false,
        });
        self.columns.len() - 1
    }

    /// Adds a column restricted to the integers within `bounds`.
    pub fn add_integer_column<B: RangeBounds<f64>>(
        &mut self,
        name: String,
        bounds: B,
    ) -> usize {
        let col = self.add_column(name, bounds);
        self.columns[col].integer = true;
        col
    }

    pub fn add_row<B: RangeBounds<f64>>(
        &mut self,
        name: String,
        bounds: B,
        factors: Vec<(usize, f64)>,
    ) -> usize {
        let (lower, upper) = bounds_to_interval(bounds);
        self.rows.push(Row {
            name,
            lower,
            upper,
            factors,
        });
        self.rows.len() - 1
    }

    /// Replaces the column costs and the offset by the given expression.
    pub fn set_objective(&mut self, objective: &LinearExpr) {
        let costs = objective.coefficients(self.num_cols());
        for (column, cost) in self.columns.iter_mut().zip(costs) {
            column.cost = cost;
        }
        self.offset = objective.constant;
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.columns
            .iter()
            .zip(values.iter())
            .map(|(column, value)| column.cost * value)
            .sum::<f64>()
            + self.offset
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn column(&self, col: usize) -> Option<&Column> {
        self.columns.get(col)
    }

    pub fn row(&self, row: usize) -> Option<&Row> {
        self.rows.get(row)
    }

    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_integer_cols(&self) -> usize {
        self.columns.iter().filter(|c| c.integer).count()
    }

    /// Ids of the rows not satisfied by `values`, column bounds included as
    /// a pseudo-row `usize::MAX`.
    pub fn violated_rows(&self, values: &[f64], tolerance: f64) -> Vec<usize> {
        let mut violated: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !row.is_satisfied(values, tolerance))
            .map(|(id, _)| id)
            .collect();
        let out_of_bounds = self.columns.iter().zip(values.iter()).any(|(c, &v)| {
            v < c.lower - tolerance || v > c.upper + tolerance
        });
        if out_of_bounds {
            violated.push(usize::MAX);
        }
        violated
    }
}
