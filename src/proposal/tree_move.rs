use super::traits::Proposal;
use crate::dag::Dag;
use crate::error::{RbError, RbResult};
use crate::tree::Tree;
use crate::{tune_scale, LogProbability, Probability};
use petgraph::graph::NodeIndex;
use rand::rngs::SmallRng;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MoveKind {
    BranchLength,
    TreeLength,
    RootPosition,
}

#[derive(Debug, Clone)]
enum MoveSnapshot {
    BranchLength { node: usize, original: f64 },
    TreeLength { original: Vec<(usize, f64)> },
    RootPosition { old_root: usize },
}

/// The composite branch-length / tree-length / root-repositioning proposal
/// on a single stochastic tree node (§4.G), undoing exactly the snapshot of
/// the last move class.
#[derive(Debug)]
pub struct TreeTopologyProposal {
    pub tree_node: NodeIndex,
    pub tuning_branch: f64,
    pub tuning_tree: f64,
    /// selects the reversible move-weight regime (TREE_LENGTH 0.1 /
    /// BRANCH_LENGTH 0.9) vs. the non-reversible one (TREE_LENGTH 0.1 /
    /// ROOT_POSITION 0.1 / BRANCH_LENGTH 0.8).
    pub reversible: bool,
    last_move: Option<MoveSnapshot>,
    last_move_kind: Option<MoveKind>,
}

impl TreeTopologyProposal {
    pub fn new(tree_node: NodeIndex, tuning_branch: f64, tuning_tree: f64, reversible: bool) -> Self {
        Self {
            tree_node,
            tuning_branch,
            tuning_tree,
            reversible,
            last_move: None,
            last_move_kind: None,
        }
    }

    fn pick_move(&self, u: f64) -> MoveKind {
        if self.reversible {
            if u < 0.1 {
                MoveKind::TreeLength
            } else {
                MoveKind::BranchLength
            }
        } else if u < 0.1 {
            MoveKind::TreeLength
        } else if u < 0.2 {
            MoveKind::RootPosition
        } else {
            MoveKind::BranchLength
        }
    }

    fn propose_branch_length(&mut self, tree: &mut Tree, rng: &mut SmallRng) -> RbResult<LogProbability> {
        let candidates: Vec<usize> = (0..tree.num_nodes()).filter(|&i| !tree.node(i).is_root()).collect();
        if candidates.is_empty() {
            return Err(RbError::Validation("tree has no non-root node to rescale".into()));
        }
        let idx = candidates[rng.random_range(0..candidates.len())];
        let original = tree.node(idx).branch_length;
        let u: f64 = rng.random();
        let s = (self.tuning_branch * (u - 0.5)).exp();
        tree.node_mut(idx).branch_length = original * s;
        self.last_move = Some(MoveSnapshot::BranchLength { node: idx, original });
        Ok(s.ln())
    }

    fn propose_tree_length(&mut self, tree: &mut Tree, rng: &mut SmallRng) -> RbResult<LogProbability> {
        let u: f64 = rng.random();
        let s = (self.tuning_tree * (u - 0.5)).exp();
        let original: Vec<(usize, f64)> = (0..tree.num_nodes())
            .filter(|&i| !tree.node(i).is_root())
            .map(|i| (i, tree.node(i).branch_length))
            .collect();
        let n = tree.num_nodes();
        for &(i, bl) in &original {
            tree.node_mut(i).branch_length = bl * s;
        }
        self.last_move = Some(MoveSnapshot::TreeLength { original });
        Ok(((n - 1) as f64) * s.ln())
    }

    fn propose_root_position(&mut self, tree: &mut Tree, rng: &mut SmallRng) -> RbResult<LogProbability> {
        let root = tree.root();
        let candidates: Vec<usize> = (0..tree.num_nodes())
            .filter(|&i| tree.node(i).parent.map_or(false, |p| p != root))
            .collect();
        if candidates.is_empty() {
            return Err(RbError::Validation("no node is eligible for root repositioning".into()));
        }
        let idx = candidates[rng.random_range(0..candidates.len())];
        let old_root = tree.reroot_at(idx)?;
        self.last_move = Some(MoveSnapshot::RootPosition { old_root });
        Ok(0.0)
    }
}

impl Proposal for TreeTopologyProposal {
    fn do_proposal(&mut self, dag: &mut Dag, rng: &mut SmallRng) -> RbResult<LogProbability> {
        let u: f64 = rng.random();
        let kind = self.pick_move(u);
        self.last_move_kind = Some(kind);
        log::trace!("TreeTopologyProposal: selected {kind:?} (u={u:.4})");
        let tree = dag
            .raw_value_mut(self.tree_node)
            .as_tree_mut()
            .ok_or_else(|| RbError::Validation("proposal's node does not hold a Tree".into()))?;
        let hastings = match kind {
            MoveKind::BranchLength => self.propose_branch_length(tree, rng),
            MoveKind::TreeLength => self.propose_tree_length(tree, rng),
            MoveKind::RootPosition => self.propose_root_position(tree, rng),
        }?;
        dag.touch(self.tree_node);
        log::debug!("TreeTopologyProposal: {kind:?} move, log Hastings ratio = {hastings:.6}");
        Ok(hastings)
    }

    fn undo_proposal(&mut self, dag: &mut Dag) {
        let Some(snapshot) = self.last_move.take() else {
            return;
        };
        let tree = dag
            .raw_value_mut(self.tree_node)
            .as_tree_mut()
            .expect("proposal's node no longer holds a Tree");
        match snapshot {
            MoveSnapshot::BranchLength { node, original } => {
                tree.node_mut(node).branch_length = original;
            }
            MoveSnapshot::TreeLength { original } => {
                for (i, bl) in original {
                    tree.node_mut(i).branch_length = bl;
                }
            }
            MoveSnapshot::RootPosition { old_root } => {
                tree.reroot_at(old_root).expect("undoing a root move must succeed");
            }
        }
    }

    fn tune(&mut self, acceptance_rate: Probability) {
        match self.last_move_kind {
            Some(MoveKind::BranchLength) => self.tuning_branch = tune_scale(self.tuning_branch, acceptance_rate),
            Some(MoveKind::TreeLength) => self.tuning_tree = tune_scale(self.tuning_tree, acceptance_rate),
            Some(MoveKind::RootPosition) | None => {}
        }
    }

    fn name(&self) -> &str {
        "TreeTopologyProposal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::Value;
    use crate::tree::topology::TopologyNode;
    use rand::SeedableRng;

    fn four_tip_tree() -> Tree {
        let nodes = vec![
            TopologyNode { index: 0, parent: Some(4), children: vec![], age: 0.0, branch_length: 1.0, taxon: Some("A".into()) },
            TopologyNode { index: 1, parent: Some(4), children: vec![], age: 0.0, branch_length: 1.0, taxon: Some("B".into()) },
            TopologyNode { index: 2, parent: Some(5), children: vec![], age: 0.0, branch_length: 1.0, taxon: Some("C".into()) },
            TopologyNode { index: 3, parent: Some(5), children: vec![], age: 0.0, branch_length: 1.0, taxon: Some("D".into()) },
            TopologyNode { index: 4, parent: Some(6), children: vec![0, 1], age: 1.0, branch_length: 1.0, taxon: None },
            TopologyNode { index: 5, parent: Some(6), children: vec![2, 3], age: 1.0, branch_length: 1.0, taxon: None },
            TopologyNode { index: 6, parent: None, children: vec![4, 5], age: 2.0, branch_length: 0.0, taxon: None },
        ];
        Tree::new(nodes, 6).unwrap()
    }

    /// S4: a branch-length move's Hastings ratio is always `log` of the
    /// actual scale factor applied, and only the chosen node's branch
    /// length changes.
    #[test]
    fn scenario_s4_branch_length_hastings_ratio() {
        let mut tree = four_tip_tree();
        let mut proposal = TreeTopologyProposal::new(NodeIndex::new(0), 0.3, 0.3, true);
        let original: Vec<f64> = (0..tree.num_nodes()).map(|i| tree.node(i).branch_length).collect();
        let mut rng = SmallRng::seed_from_u64(42);
        let hastings = proposal.propose_branch_length(&mut tree, &mut rng).unwrap();
        let changed: Vec<usize> = (0..tree.num_nodes())
            .filter(|&i| (tree.node(i).branch_length - original[i]).abs() > 1e-15)
            .collect();
        assert_eq!(changed.len(), 1);
        let moved = changed[0];
        let s = tree.node(moved).branch_length / original[moved];
        assert!((hastings - s.ln()).abs() < 1e-9);
    }

    #[test]
    fn branch_length_move_round_trips_under_undo() {
        let mut dag = Dag::new();
        let node = dag.add_constant("tree", Value::Tree(four_tip_tree()));
        let mut proposal = TreeTopologyProposal::new(node, 0.5, 0.5, true);
        let before = dag.raw_value(node).as_tree().unwrap().clone();
        let mut rng = SmallRng::seed_from_u64(7);
        proposal.do_proposal(&mut dag, &mut rng).unwrap();
        proposal.undo_proposal(&mut dag);
        assert_eq!(dag.raw_value(node).as_tree().unwrap().nodes(), before.nodes());
    }

    /// S5: every non-root branch is scaled by the same factor `s`, and the
    /// Hastings ratio is `(N-1) log s` where N is the node count.
    #[test]
    fn scenario_s5_tree_length_hastings_ratio() {
        let mut tree = four_tip_tree();
        let mut proposal = TreeTopologyProposal::new(NodeIndex::new(0), 0.2, 0.2, true);
        let n = tree.num_nodes();
        let original: Vec<f64> = (0..n).map(|i| tree.node(i).branch_length).collect();
        let mut rng = SmallRng::seed_from_u64(1);
        let hastings = proposal.propose_tree_length(&mut tree, &mut rng).unwrap();
        let actual_s = (tree.node(0).branch_length / original[0]).ln();
        for i in 0..n {
            if !tree.node(i).is_root() {
                let s_i = (tree.node(i).branch_length / original[i]).ln();
                assert!((s_i - actual_s).abs() < 1e-12);
            }
        }
        assert!((hastings - (n as f64 - 1.0) * actual_s).abs() < 1e-9);
    }

    /// invariant #7: ROOT_POSITION always returns a zero Hastings ratio and
    /// leaves the tree's node count and tip set unchanged.
    #[test]
    fn root_position_hastings_is_zero_and_tips_preserved() {
        let mut tree = four_tip_tree();
        let mut proposal = TreeTopologyProposal::new(NodeIndex::new(0), 0.2, 0.2, false);
        let tips_before: Vec<String> = tree.tips().filter_map(|n| n.taxon.clone()).collect();
        let mut rng = SmallRng::seed_from_u64(3);
        let hastings = proposal.propose_root_position(&mut tree, &mut rng).unwrap();
        assert_eq!(hastings, 0.0);
        let mut tips_after: Vec<String> = tree.tips().filter_map(|n| n.taxon.clone()).collect();
        let mut tips_before_sorted = tips_before;
        tips_after.sort();
        tips_before_sorted.sort();
        assert_eq!(tips_after, tips_before_sorted);
    }

    #[test]
    fn root_position_undo_restores_original_root() {
        let mut dag = Dag::new();
        let node = dag.add_constant("tree", Value::Tree(four_tip_tree()));
        let original_root = dag.raw_value(node).as_tree().unwrap().root();
        let mut proposal = TreeTopologyProposal::new(node, 0.2, 0.2, false);
        let mut rng = SmallRng::seed_from_u64(9);
        proposal.do_proposal(&mut dag, &mut rng).unwrap();
        proposal.undo_proposal(&mut dag);
        assert_eq!(dag.raw_value(node).as_tree().unwrap().root(), original_root);
    }

    /// invariant #8: tuning only adjusts the scale used by the move class
    /// that actually fired, and is a no-op until a move has run.
    #[test]
    fn tune_only_updates_the_scale_of_the_last_move() {
        let mut proposal = TreeTopologyProposal::new(NodeIndex::new(0), 0.2, 0.2, true);
        proposal.tune(0.44); // no move has run yet: both scales untouched
        assert_eq!(proposal.tuning_branch, 0.2);
        assert_eq!(proposal.tuning_tree, 0.2);

        let mut tree = four_tip_tree();
        let mut rng = SmallRng::seed_from_u64(5);
        proposal.propose_branch_length(&mut tree, &mut rng).unwrap();
        proposal.last_move_kind = Some(MoveKind::BranchLength);
        proposal.tune(0.9);
        assert!(proposal.tuning_branch > 0.2);
        assert_eq!(proposal.tuning_tree, 0.2);
    }
}
