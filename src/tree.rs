use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TreeError {
    #[error("node {0} not found in the tree")]
    NodeNotFound(usize),
    #[error("node {0} is listed as a child more than once")]
    DuplicateChild(usize),
    #[error("root node must be the first node and have no parent")]
    InvalidRoot,
    #[error("node {node} is at stage {stage} but its parent is at stage {parent_stage}")]
    StageMismatch {
        node: usize,
        stage: usize,
        parent_stage: usize,
    },
    #[error("node {node} lists {child} as child but {child} points to {parent:?}")]
    BrokenLink {
        node: usize,
        child: usize,
        parent: Option<usize>,
    },
    #[error("node {0} is not reachable from the root")]
    Unreachable(usize),
    #[error("leaf node {node} is at stage {stage} but the last stage is {last_stage}")]
    EarlyLeaf {
        node: usize,
        stage: usize,
        last_stage: usize,
    },
    #[error("node {node} carries {found} values but the schema declares {expected}")]
    ValueWidth {
        node: usize,
        expected: usize,
        found: usize,
    },
}

/// The ordered names of the random variables realized at every node. Values
/// are stored per node as a plain `Vec<f64>` following this order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSchema {
    names: Vec<String>,
}

impl ValueSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub index: usize,
    pub name: String,
    pub stage: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub values: Vec<f64>,
}

impl Node {
    pub fn new(
        index: usize,
        name: String,
        stage: usize,
        parent: Option<usize>,
        values: Vec<f64>,
    ) -> Self {
        Self {
            index,
            name,
            stage,
            parent,
            children: vec![],
            values,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node('{}')", self.name)
    }
}

/// A rooted scenario tree stored as an arena. Node 0 is always the root and
/// parent / child relations are kept as indices into the flat node vector,
/// so every node in the vector is part of the tree and nothing else is.
#[derive(Debug, Clone)]
pub struct ScenarioTree {
    nodes: Vec<Node>,
    schema: ValueSchema,
}

impl ScenarioTree {
    pub fn new(schema: ValueSchema, root_values: Vec<f64>) -> Self {
        let root = Node::new(0, String::from("root"), 0, None, root_values);
        Self {
            nodes: vec![root],
            schema,
        }
    }

    /// Appends a new child to `parent_id`. The child is named after its
    /// ancestry (`{parent}_{branch}`) and lands one stage below its parent.
    pub fn add_child(
        &mut self,
        parent_id: usize,
        values: Vec<f64>,
    ) -> Result<usize, TreeError> {
        let parent = self
            .nodes
            .get(parent_id)
            .ok_or(TreeError::NodeNotFound(parent_id))?;
        let id = self.node_count();
        let name = format!("{}_{}", parent.name, parent.children.len());
        let stage = parent.stage + 1;
        self.nodes
            .push(Node::new(id, name, stage, Some(parent_id), values));
        self.nodes[parent_id].children.push(id);
        Ok(id)
    }

    pub fn get_node(&self, id: usize) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn schema(&self) -> &ValueSchema {
        &self.schema
    }

    pub fn get_children(&self, id: usize) -> Option<&[usize]> {
        self.nodes.get(id).map(|node| node.children.as_slice())
    }

    pub fn get_parent(&self, id: usize) -> Option<usize> {
        self.nodes.get(id)?.parent
    }

    /// The `branch`-th child of a node, if it exists.
    pub fn child(&self, id: usize, branch: usize) -> Option<&Node> {
        let child_id = *self.get_children(id)?.get(branch)?;
        self.nodes.get(child_id)
    }

    /// The realized value of a named variable at a node.
    pub fn value(&self, id: usize, name: &str) -> Option<f64> {
        let index = self.schema.index_of(name)?;
        self.nodes.get(id)?.values.get(index).copied()
    }

    /// Breadth-first ordering of the node ids, starting at `root_id`.
    pub fn get_bfs(&self, root_id: usize) -> Vec<usize> {
        let mut bfs = Vec::<usize>::with_capacity(self.node_count());
        let mut queue = VecDeque::from([root_id]);
        while let Some(id) = queue.pop_front() {
            bfs.push(id);
            queue.extend(self.nodes[id].children.iter().copied());
        }
        bfs
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_root(&self, id: usize) -> bool {
        self.nodes.get(id).map_or(false, Node::is_root)
    }

    pub fn is_leaf(&self, id: usize) -> bool {
        self.nodes.get(id).map_or(false, Node::is_leaf)
    }

    pub fn last_stage(&self) -> usize {
        self.nodes.iter().map(|n| n.stage).max().unwrap_or(0)
    }

    pub fn num_stages(&self) -> usize {
        self.last_stage() + 1
    }

    pub fn leaf_ids(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.index)
            .collect()
    }

    /// Number of nodes at each stage, indexed by stage.
    pub fn stage_node_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_stages()];
        for node in self.nodes.iter() {
            counts[node.stage] += 1;
        }
        counts
    }

    /// Checks every structural invariant of the tree: a single root at
    /// index 0, consistent parent / child links, `stage == parent.stage + 1`,
    /// every node reachable from the root, leaves only at the last stage and
    /// one value per schema entry at every node.
    pub fn validate(&self) -> Result<(), TreeError> {
        let root = self.root();
        if root.index != 0 || root.parent.is_some() || root.stage != 0 {
            return Err(TreeError::InvalidRoot);
        }
        let last_stage = self.last_stage();
        for (id, node) in self.nodes.iter().enumerate() {
            if node.index != id {
                return Err(TreeError::NodeNotFound(node.index));
            }
            if node.values.len() != self.schema.len() {
                return Err(TreeError::ValueWidth {
                    node: id,
                    expected: self.schema.len(),
                    found: node.values.len(),
                });
            }
            if id != 0 {
                let parent_id =
                    node.parent.ok_or(TreeError::Unreachable(id))?;
                let parent = self
                    .nodes
                    .get(parent_id)
                    .ok_or(TreeError::NodeNotFound(parent_id))?;
                if !parent.children.contains(&id) {
                    return Err(TreeError::BrokenLink {
                        node: parent_id,
                        child: id,
                        parent: node.parent,
                    });
                }
                if node.stage != parent.stage + 1 {
                    return Err(TreeError::StageMismatch {
                        node: id,
                        stage: node.stage,
                        parent_stage: parent.stage,
                    });
                }
            }
            for &child_id in node.children.iter() {
                let child = self
                    .nodes
                    .get(child_id)
                    .ok_or(TreeError::NodeNotFound(child_id))?;
                if child.parent != Some(id) {
                    return Err(TreeError::BrokenLink {
                        node: id,
                        child: child_id,
                        parent: child.parent,
                    });
                }
            }
            if node.is_leaf() && node.stage != last_stage {
                return Err(TreeError::EarlyLeaf {
                    node: id,
                    stage: node.stage,
                    last_stage,
                });
            }
        }

        let mut visited = vec![false; self.node_count()];
        let mut queue = VecDeque::from([0]);
        while let Some(id) = queue.pop_front() {
            if visited[id] {
                return Err(TreeError::DuplicateChild(id));
            }
            visited[id] = true;
            queue.extend(self.nodes[id].children.iter().copied());
        }
        match visited.iter().position(|v| !v) {
            Some(id) => Err(TreeError::Unreachable(id)),
            None => Ok(()),
        }
    }
}
