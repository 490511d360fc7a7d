//! Prompt builders for the LLM oracle.
//!
//! Each prompt carries one worked exchange and asks for a JSON reply;
//! [`super::parse`] also accepts the older free-text replies.

use crate::reasoning::ReasoningChain;

const RELATION_PRUNE_INSTRUCTIONS: &str = "Please retrieve %width% relations that contribute to \
the question and rate their contribution on a scale from 0 to 1 (the sum of the scores of \
%width% relations is 1).";

const RELATION_PRUNE_EXAMPLE: &str = r#"Q: Name the brand of the product that is frequently bought together with Acme Cordless Drill.
Topic Entity: Acme Cordless Drill
Relations: also_bought; also_viewed; brand; bought_together; category
A: {"relations": [{"relation": "bought_together", "score": 0.7}, {"relation": "brand", "score": 0.2}, {"relation": "also_bought", "score": 0.1}]}"#;

const ENTITY_SCORE_INSTRUCTIONS: &str = "Please score the entities' contribution to the question \
on a scale from 0 to 1 (the sum of the scores of all entities is 1). Reply with one score per \
entity, in the order the entities are listed.";

const ENTITY_SCORE_EXAMPLE: &str = r#"Q: Which venue published the paper on graph reasoning written by Ada Lovelace?
Relation: writes
Entities: Analytical Engines; Graph Reasoning with Language Models; Notes on Bernoulli Numbers
A: {"scores": [0.0, 1.0, 0.0]}"#;

const EVALUATE_INSTRUCTIONS: &str = "Given a question and the associated retrieved knowledge \
graph triplets (entity, relation, entity), you are asked to answer whether it's sufficient for \
you to answer the question with these triplets and your knowledge (Yes or No).";

const EVALUATE_EXAMPLE: &str = r#"Q: What is the brand of Acme Cordless Drill?
Knowledge Triplets: Acme Cordless Drill, brand, Acme
A: {"sufficient": true}

Q: Which items are bought together with the item that shares a category with Acme Cordless Drill?
Knowledge Triplets: Acme Cordless Drill, category, Power Tools
A: {"sufficient": false}"#;

const ANSWER_INSTRUCTIONS: &str = "Given a question and the associated retrieved knowledge graph \
triplets (entity, relation, entity), you are asked to answer the question with these triplets \
and your knowledge.";

const ANSWER_EXAMPLE: &str = r#"Q: What is the brand of Acme Cordless Drill?
Knowledge Triplets: Acme Cordless Drill, brand, Acme
A: {"answer": "Acme"}"#;

const COT_INSTRUCTIONS: &str = "Answer the question step by step. Put the final answer in the \
\"answer\" field of a JSON object.";

const COT_EXAMPLE: &str = r#"Q: What state is home to the university that is represented in sports by George Washington Colonials men's basketball?
A: {"answer": "Washington, D.C."}"#;

const JUDGE_INSTRUCTIONS: &str = "You are a strict judge. Decide whether the model answer is \
factually correct given the ground truth, ignoring phrasing and extra text. It is Correct when \
it states the core fact of the ground truth without adding wrong facts, and Incorrect when it \
contradicts or omits it or declines to answer. Reply with a JSON object with a \"decision\" \
(\"Correct\" or \"Incorrect\") and a short \"reason\".";

const JUDGE_EXAMPLE: &str = r#"Q: What is the brand of Acme Cordless Drill?
Ground Truth: Acme
Model Answer: {Yes}. Based on the given knowledge triplets, the brand is {Acme}.
A: {"decision": "Correct", "reason": "The model names Acme, which matches the ground truth."}

Q: How many items are in the category Power Tools?
Ground Truth: 12
Model Answer: The triplets do not say how many items the category has.
A: {"decision": "Incorrect", "reason": "The model gives no count although one exists."}"#;

/// `Knowledge Triplets:` block, one `head, relation, tail` line per triple.
pub fn evidence_block(chain: &ReasoningChain) -> String {
    let mut block = String::from("Knowledge Triplets: ");
    block.push_str(&chain.evidence_lines().join("\n"));
    block
}

pub fn relation_prune(question: &str, entity_name: &str, relations: &[String], width: usize) -> String {
    format!(
        "{}\n\n{}\n\nQ: {}\nTopic Entity: {}\nRelations: {}\nA: ",
        RELATION_PRUNE_INSTRUCTIONS.replace("%width%", &width.to_string()),
        RELATION_PRUNE_EXAMPLE,
        question,
        entity_name,
        relations.join("; ")
    )
}

pub fn entity_score(question: &str, relation: &str, candidates: &[String]) -> String {
    format!(
        "{}\n\n{}\n\nQ: {}\nRelation: {}\nEntities: {}\nA: ",
        ENTITY_SCORE_INSTRUCTIONS,
        ENTITY_SCORE_EXAMPLE,
        question,
        relation,
        candidates.join("; ")
    )
}

pub fn evaluate(question: &str, chain: &ReasoningChain) -> String {
    format!(
        "{}\n\n{}\n\nQ: {}\n{}\nA: ",
        EVALUATE_INSTRUCTIONS,
        EVALUATE_EXAMPLE,
        question,
        evidence_block(chain)
    )
}

pub fn answer(question: &str, chain: &ReasoningChain) -> String {
    format!(
        "{}\n\n{}\n\nQ: {}\n{}\nA: ",
        ANSWER_INSTRUCTIONS,
        ANSWER_EXAMPLE,
        question,
        evidence_block(chain)
    )
}

pub fn chain_of_thought(question: &str) -> String {
    format!("{}\n\n{}\n\nQ: {}\nA: ", COT_INSTRUCTIONS, COT_EXAMPLE, question)
}

/// Grading prompt for one answer; alternative ground truths are joined with `; `.
pub fn judge_answer(question: &str, ground_truth: &[String], model_answer: &str) -> String {
    format!(
        "{}\n\n{}\n\nQ: {}\nGround Truth: {}\nModel Answer: {}\nA: ",
        JUDGE_INSTRUCTIONS,
        JUDGE_EXAMPLE,
        question,
        ground_truth.join("; "),
        model_answer.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::{ChainLayer, Triple};

    #[test]
    fn test_relation_prune_lists_relations_and_width() {
        let prompt = relation_prune(
            "Who makes it?",
            "Widget",
            &["brand".to_string(), "category".to_string()],
            2,
        );
        assert!(prompt.contains("Please retrieve 2 relations"));
        assert!(prompt.contains("Topic Entity: Widget\nRelations: brand; category\nA: "));
    }

    #[test]
    fn test_evidence_lines_in_prompts() {
        let mut chain = ReasoningChain::default();
        chain.push(ChainLayer::from(vec![
            Triple::new("Widget", "brand", "Acme"),
            Triple::new("Widget", "category", "Tools"),
        ]));
        let prompt = evaluate("Who makes it?", &chain);
        assert!(prompt.ends_with(
            "Q: Who makes it?\nKnowledge Triplets: Widget, brand, Acme\nWidget, category, Tools\nA: "
        ));
        assert!(answer("Who makes it?", &chain).contains("Widget, brand, Acme"));
    }
}
