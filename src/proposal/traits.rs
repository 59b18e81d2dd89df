use crate::dag::Dag;
use crate::error::RbResult;
use crate::{LogProbability, Probability};
use rand::rngs::SmallRng;

/// `doProposal -> logHastings`, `undoProposal`, `prepareProposal`,
/// `cleanProposal`, `tune(acceptanceRate)`, `getProposalName` (§4.C, §6).
/// Proposals never fail mid-move (§7): any snapshot recorded by
/// `do_proposal` must suffice for `undo_proposal` to fully restore the
/// prior state.
pub trait Proposal: std::fmt::Debug {
    /// called once before `do_proposal`; most proposals have nothing to do.
    fn prepare_proposal(&mut self, _dag: &mut Dag) {}

    /// mutates one or more stochastic nodes and returns the Hastings ratio.
    fn do_proposal(&mut self, dag: &mut Dag, rng: &mut SmallRng) -> RbResult<LogProbability>;

    /// rolls every node this proposal touched back to its pre-proposal
    /// state, using the snapshot recorded by the last `do_proposal`.
    fn undo_proposal(&mut self, dag: &mut Dag);

    /// called once the move is accepted; most proposals have nothing to do.
    fn clean_proposal(&mut self) {}

    /// Robbins-Monro tuning update (§6): multiply the scale by `1 +
    /// (rate-0.44)/0.56` on over-acceptance, divide by `2 - rate/0.44` on
    /// under-acceptance, clamped to `[0, 10000]`.
    fn tune(&mut self, acceptance_rate: Probability);

    fn name(&self) -> &str;
}
