use crate::error::{RbError, RbResult};
use crate::{Age, BranchLength};
use serde::{Deserialize, Serialize};

/// One vertex of a phylogenetic tree (§3). Tips carry a taxon name;
/// internal nodes and the root do not. `branch_length` is a free parameter
/// mutated directly by tree-topology proposals (§4.G); for time-calibrated
/// trees it should equal `parent.age - self.age`, but that equality is an
/// invariant checked by callers that need it (e.g. the pruning kernel), not
/// enforced structurally here — matching RevBayes's `TopologyNode`, which
/// likewise allows the two to be set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub index: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub age: Age,
    pub branch_length: BranchLength,
    pub taxon: Option<String>,
}

impl TopologyNode {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }
}

/// An ordered collection of `TopologyNode`s with dense, stable indices
/// (§3). `nodes[i].index == i` always holds; re-rooting reuses indices by
/// rewriting parent/child pointers in place rather than reallocating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<TopologyNode>,
    root: usize,
}

impl Tree {
    pub fn new(nodes: Vec<TopologyNode>, root: usize) -> RbResult<Self> {
        let tree = Self { nodes, root };
        tree.validate()?;
        Ok(tree)
    }

    fn validate(&self) -> RbResult<()> {
        if self.nodes.is_empty() {
            return Err(RbError::Validation("tree has no nodes".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.index != i {
                return Err(RbError::Validation(format!(
                    "node index {} is not dense/stable (stored at slot {})",
                    node.index, i
                )));
            }
            if node.age < 0.0 && node.age.is_finite() {
                return Err(RbError::Validation(format!(
                    "node {i} has negative age {}",
                    node.age
                )));
            }
        }
        let roots: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_root())
            .map(|(i, _)| i)
            .collect();
        if roots.len() != 1 || roots[0] != self.root {
            return Err(RbError::Validation(format!(
                "tree must have exactly one root, found {roots:?}"
            )));
        }
        for node in &self.nodes {
            if let Some(p) = node.parent {
                if !self.nodes[p].children.contains(&node.index) {
                    return Err(RbError::Validation(format!(
                        "node {} claims parent {p} but {p} does not list it as a child",
                        node.index
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn root(&self) -> usize {
        self.root
    }
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
    pub fn node(&self, index: usize) -> &TopologyNode {
        &self.nodes[index]
    }
    pub fn node_mut(&mut self, index: usize) -> &mut TopologyNode {
        &mut self.nodes[index]
    }
    pub fn nodes(&self) -> &[TopologyNode] {
        &self.nodes
    }

    pub fn tips(&self) -> impl Iterator<Item = &TopologyNode> {
        self.nodes.iter().filter(|n| n.is_tip())
    }

    pub fn num_extant_tips(&self) -> usize {
        self.tips().filter(|n| n.age == 0.0).count()
    }

    /// post-order traversal of node indices (children before parents),
    /// the order the pruning kernel's recurrence requires (§4.E).
    pub fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, false)];
        while let Some((idx, expanded)) = stack.pop() {
            if expanded {
                order.push(idx);
            } else {
                stack.push((idx, true));
                for &child in &self.nodes[idx].children {
                    stack.push((child, false));
                }
            }
        }
        order
    }

    pub fn total_branch_length(&self) -> BranchLength {
        self.nodes
            .iter()
            .filter(|n| !n.is_root())
            .map(|n| n.branch_length)
            .sum()
    }

    /// sum of branch lengths from `from` up to (not including) the root.
    pub fn path_length_to_root(&self, mut from: usize) -> BranchLength {
        let mut total = 0.0;
        while let Some(parent) = self.nodes[from].parent {
            total += self.nodes[from].branch_length;
            from = parent;
        }
        total
    }

    /// minimal Newick-ish rendering, sufficient for monitor/trace output
    /// (§6); full Newick/Nexus (de)serialization is an external collaborator
    /// per §1 and is out of scope here.
    pub fn to_newick(&self) -> String {
        fn recurse(tree: &Tree, idx: usize) -> String {
            let node = tree.node(idx);
            if node.children.is_empty() {
                format!(
                    "{}:{}",
                    node.taxon.clone().unwrap_or_else(|| idx.to_string()),
                    node.branch_length
                )
            } else {
                let inner = node
                    .children
                    .iter()
                    .map(|&c| recurse(tree, c))
                    .collect::<Vec<_>>()
                    .join(",");
                if node.is_root() {
                    format!("({inner});")
                } else {
                    format!("({inner}):{}", node.branch_length)
                }
            }
        }
        recurse(self, self.root)
    }

    /// reverses parent/child pointers along the path from `new_root` up to
    /// the current root, then installs `new_root` as the root (§4.G,
    /// ROOT_POSITION move). Returns the previous root index.
    pub fn reroot_at(&mut self, new_root: usize) -> RbResult<usize> {
        if new_root == self.root {
            return Err(RbError::Validation("node is already the root".into()));
        }
        let old_root = self.root;
        let mut path = Vec::new();
        let mut cur = new_root;
        loop {
            path.push(cur);
            match self.nodes[cur].parent {
                Some(p) => cur = p,
                None => break,
            }
        }
        // path = [new_root, ..., old_root]; reverse every edge along it.
        for window in path.windows(2) {
            let (child, parent) = (window[0], window[1]);
            // parent was child's parent; after reversal, child becomes
            // parent's parent.
            self.nodes[parent].children.retain(|&c| c != child);
            self.nodes[parent].parent = Some(child);
            self.nodes[child].children.push(parent);
        }
        self.nodes[new_root].parent = None;
        self.root = new_root;
        Ok(old_root)
    }
}
