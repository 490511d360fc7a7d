//! Sufficiency check after each committed layer.

use super::{Frontier, PhaseContext, ReasoningChain};

/// Verdict after a layer is committed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Judgement {
    /// The chain is enough to answer.
    Sufficient,
    /// Every surviving branch is the finish sentinel.
    Exhausted,
    /// Keep searching from these (sentinel-free) entities.
    Continue(Frontier),
}

/// Ask the oracle whether `chain` suffices; an unreachable oracle counts as "no".
pub(crate) async fn evaluate(
    ctx: &PhaseContext<'_>,
    chain: &ReasoningChain,
    frontier: &Frontier,
) -> Judgement {
    let sufficient = match ctx.oracle.judge(ctx.question, chain).await {
        Ok(verdict) => verdict,
        Err(e) => {
            log::warn!("Sufficiency check failed, continuing search: {}", e);
            false
        }
    };

    if sufficient {
        Judgement::Sufficient
    } else if frontier.is_all_finished() {
        Judgement::Exhausted
    } else {
        Judgement::Continue(frontier.clone().without_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::graph::{MemoryGraph, FINISH_ID, FINISH_NAME};
    use crate::reasoning::testing::ScriptedOracle;
    use crate::reasoning::FrontierEntry;
    use crate::scoring::RelationScoring;

    fn frontier(ids: &[&str]) -> Frontier {
        let mut frontier = Frontier::default();
        for id in ids {
            let name = if *id == FINISH_ID { FINISH_NAME } else { id };
            frontier.push(FrontierEntry::topic(id.to_string(), name.to_string()));
        }
        frontier
    }

    #[tokio::test]
    async fn test_verdicts() {
        let graph = MemoryGraph::new();
        let oracle = ScriptedOracle::new().with_judgements(&[true, false, false]);
        let scoring = RelationScoring::Oracle;
        let settings = SearchConfig::default();
        let ctx = ScriptedOracle::context(&graph, &oracle, &scoring, &settings, "q");
        let chain = ReasoningChain::default();

        let mixed = frontier(&["a", FINISH_ID]);
        assert_eq!(evaluate(&ctx, &chain, &mixed).await, Judgement::Sufficient);
        assert_eq!(
            evaluate(&ctx, &chain, &frontier(&[FINISH_ID])).await,
            Judgement::Exhausted
        );
        assert_eq!(
            evaluate(&ctx, &chain, &mixed).await,
            Judgement::Continue(frontier(&["a"]))
        );
    }

    #[tokio::test]
    async fn test_unreachable_oracle_means_continue() {
        let graph = MemoryGraph::new();
        let oracle = ScriptedOracle::new().failing_judge();
        let scoring = RelationScoring::Oracle;
        let settings = SearchConfig::default();
        let ctx = ScriptedOracle::context(&graph, &oracle, &scoring, &settings, "q");

        let verdict = evaluate(&ctx, &ReasoningChain::default(), &frontier(&["a"])).await;
        assert_eq!(verdict, Judgement::Continue(frontier(&["a"])));
    }
}
