use super::topology::{Tree, TopologyNode};

/// A thin, `Copy` handle into a `Tree`'s arena, giving navigational methods
/// without needing ownership of anything but the index — the same
/// `Node<'tree>` shape the teacher uses to wrap a `petgraph` index.
#[derive(Debug, Clone, Copy)]
pub struct Node<'tree> {
    index: usize,
    tree: &'tree Tree,
}

impl<'tree> From<(usize, &'tree Tree)> for Node<'tree> {
    fn from((index, tree): (usize, &'tree Tree)) -> Self {
        Self { index, tree }
    }
}

impl<'tree> Node<'tree> {
    pub fn index(&self) -> usize {
        self.index
    }
    pub fn data(&self) -> &'tree TopologyNode {
        self.tree.node(self.index)
    }
    pub fn parent(&self) -> Option<Node<'tree>> {
        self.data().parent.map(|p| Self::from((p, self.tree)))
    }
    pub fn children(&self) -> Vec<Node<'tree>> {
        self.data()
            .children
            .iter()
            .map(|&c| Self::from((c, self.tree)))
            .collect()
    }
    pub fn ancestors(&self) -> Vec<Node<'tree>> {
        let mut out = Vec::new();
        let mut cur = self.parent();
        while let Some(node) = cur {
            out.push(node);
            cur = node.parent();
        }
        out
    }
    pub fn descendants(&self) -> Vec<Node<'tree>> {
        let mut out = Vec::new();
        let mut stack = self.children();
        while let Some(node) = stack.pop() {
            stack.extend(node.children());
            out.push(node);
        }
        out
    }
    pub fn leaves(&self) -> Vec<Node<'tree>> {
        if self.data().is_tip() {
            vec![*self]
        } else {
            self.children().iter().flat_map(|c| c.leaves()).collect()
        }
    }
}
