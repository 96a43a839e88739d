use crate::model::LinearProgram;
use crate::tree::ScenarioTree;
use std::collections::VecDeque;

/// When a decision is taken relative to the realization of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecourseClass {
    /// Decided at an internal node and shared by every child subtree.
    NonRecourse,
    /// Decided after observing the transition into a non-root node.
    Recourse,
}

/// Size of the variable block allocated at each node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Vector(usize),
    /// Row-major `rows x cols` block.
    Matrix(usize, usize),
}

impl Shape {
    pub fn len(&self) -> usize {
        match *self {
            Shape::Scalar => 1,
            Shape::Vector(n) => n,
            Shape::Matrix(rows, cols) => rows * cols,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn label(&self, index: usize) -> String {
        match *self {
            Shape::Scalar => String::new(),
            Shape::Vector(_) => format!("[{}]", index),
            Shape::Matrix(_, cols) => format!("[{},{}]", index / cols, index % cols),
        }
    }
}

/// The program columns that make up one variable at one node.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableBlock {
    pub shape: Shape,
    pub columns: Vec<usize>,
}

impl VariableBlock {
    pub fn scalar(&self) -> usize {
        self.columns[0]
    }

    pub fn at(&self, index: usize) -> usize {
        self.columns[index]
    }

    pub fn at2(&self, row: usize, col: usize) -> usize {
        match self.shape {
            Shape::Matrix(_, cols) => self.columns[row * cols + col],
            _ => self.columns[row],
        }
    }

    pub fn values(&self, solution: &[f64]) -> Vec<f64> {
        self.columns.iter().map(|&col| solution[col]).collect()
    }
}

/// A node -> variable map for one decision variable, stored as a vector
/// indexed by node id. Nodes outside the allocation class hold `None`.
#[derive(Debug, Clone)]
pub struct NodeBinding {
    pub name: String,
    pub class: RecourseClass,
    pub shape: Shape,
    slots: Vec<Option<VariableBlock>>,
}

impl NodeBinding {
    fn new(name: &str, class: RecourseClass, shape: Shape, node_count: usize) -> Self {
        Self {
            name: name.to_string(),
            class,
            shape,
            slots: vec![None; node_count],
        }
    }

    pub fn get(&self, node_id: usize) -> Option<&VariableBlock> {
        self.slots.get(node_id)?.as_ref()
    }

    /// Number of nodes holding a variable.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bound_nodes(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(id, _)| id)
            .collect()
    }

    fn bind(
        &mut self,
        tree: &ScenarioTree,
        node_id: usize,
        program: &mut LinearProgram,
        domain_constraints: &mut Vec<usize>,
    ) {
        let node_name = &tree.nodes()[node_id].name;
        let columns: Vec<usize> = (0..self.shape.len())
            .map(|index| {
                let col = program.add_column(
                    format!("{}_{}{}", node_name, self.name, self.shape.label(index)),
                    0.0..,
                );
                domain_constraints.push(col);
                col
            })
            .collect();
        self.slots[node_id] = Some(VariableBlock {
            shape: self.shape,
            columns,
        });
    }
}

/// Allocates one variable block per internal node, root included, in
/// breadth-first order. Children without children of their own are never
/// enqueued, so terminal nodes get no block.
pub fn allocate_non_recourse(
    tree: &ScenarioTree,
    program: &mut LinearProgram,
    domain_constraints: &mut Vec<usize>,
    shape: Shape,
    name: &str,
) -> NodeBinding {
    let mut binding =
        NodeBinding::new(name, RecourseClass::NonRecourse, shape, tree.node_count());
    let root = tree.root();
    if root.is_leaf() {
        return binding;
    }
    let mut queue = VecDeque::from([root.index]);
    while let Some(node_id) = queue.pop_front() {
        binding.bind(tree, node_id, program, domain_constraints);
        for &child_id in tree.nodes()[node_id].children.iter() {
            if !tree.is_leaf(child_id) {
                queue.push_back(child_id);
            }
        }
    }
    binding
}

/// Allocates one variable block per non-root node in breadth-first order,
/// starting from the children of the root and descending into every child.
pub fn allocate_recourse(
    tree: &ScenarioTree,
    program: &mut LinearProgram,
    domain_constraints: &mut Vec<usize>,
    shape: Shape,
    name: &str,
) -> NodeBinding {
    let mut binding =
        NodeBinding::new(name, RecourseClass::Recourse, shape, tree.node_count());
    let mut queue: VecDeque<usize> = tree.root().children.iter().copied().collect();
    while let Some(node_id) = queue.pop_front() {
        binding.bind(tree, node_id, program, domain_constraints);
        queue.extend(tree.nodes()[node_id].children.iter().copied());
    }
    binding
}

pub fn allocate(
    class: RecourseClass,
    tree: &ScenarioTree,
    program: &mut LinearProgram,
    domain_constraints: &mut Vec<usize>,
    shape: Shape,
    name: &str,
) -> NodeBinding {
    match class {
        RecourseClass::NonRecourse => {
            allocate_non_recourse(tree, program, domain_constraints, shape, name)
        }
        RecourseClass::Recourse => {
            allocate_recourse(tree, program, domain_constraints, shape, name)
        }
    }
}
