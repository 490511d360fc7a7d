use async_trait::async_trait;
use std::sync::Arc;

use super::client::{ChatCompletion, ChatRequest};
use super::{parse, prompts, Oracle, OracleError, RankedRelation};
use crate::config::LlmConfig;
use crate::reasoning::ReasoningChain;

/// [`Oracle`] backed by a chat-completion model.
///
/// Exploration calls (relation ranking, candidate scoring) use the
/// exploration temperature; judging and answering use the reasoning one.
pub struct LlmOracle {
    chat: Arc<dyn ChatCompletion>,
    temperature_exploration: f32,
    temperature_reasoning: f32,
    max_tokens: u32,
}

impl LlmOracle {
    pub fn new(chat: Arc<dyn ChatCompletion>, config: &LlmConfig) -> Self {
        Self {
            chat,
            temperature_exploration: config.temperature_exploration,
            temperature_reasoning: config.temperature_reasoning,
            max_tokens: config.max_length,
        }
    }

    async fn ask(&self, prompt: String, temperature: f32) -> Result<String, OracleError> {
        let request = ChatRequest {
            prompt,
            temperature,
            max_tokens: self.max_tokens,
        };
        self.chat
            .complete(&request)
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Oracle for LlmOracle {
    async fn rank_relations(
        &self,
        question: &str,
        entity_name: &str,
        relations: &[String],
        width: usize,
    ) -> Result<Vec<RankedRelation>, OracleError> {
        let prompt = prompts::relation_prune(question, entity_name, relations, width);
        let text = self.ask(prompt, self.temperature_exploration).await?;
        Ok(parse::parse_relation_ranking(&text)?)
    }

    async fn score_candidates(
        &self,
        question: &str,
        relation: &str,
        candidates: &[String],
    ) -> Result<Vec<f64>, OracleError> {
        let prompt = prompts::entity_score(question, relation, candidates);
        let text = self.ask(prompt, self.temperature_exploration).await?;
        Ok(parse::parse_candidate_scores(&text)?)
    }

    async fn judge(&self, question: &str, chain: &ReasoningChain) -> Result<bool, OracleError> {
        let text = self
            .ask(prompts::evaluate(question, chain), self.temperature_reasoning)
            .await?;
        Ok(parse::parse_decision(&text))
    }

    async fn answer(&self, question: &str, chain: &ReasoningChain) -> Result<String, OracleError> {
        let text = self
            .ask(prompts::answer(question, chain), self.temperature_reasoning)
            .await?;
        Ok(parse::parse_answer(&text))
    }

    async fn answer_without_graph(&self, question: &str) -> Result<String, OracleError> {
        let text = self
            .ask(prompts::chain_of_thought(question), self.temperature_reasoning)
            .await?;
        Ok(parse::parse_answer(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, TogError};
    use crate::reasoning::{ChainLayer, Triple};
    use std::sync::Mutex;

    /// Replays canned replies and records the requests it saw.
    struct CannedChat {
        replies: Mutex<Vec<Result<String>>>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl CannedChat {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatCompletion for CannedChat {
        async fn complete(&self, request: &ChatRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn llm_config() -> LlmConfig {
        crate::Config::from_toml_str(
            "[tog]\ngraph_db = \"g.db\"\noutput_path = \"o.jsonl\"\n[llm]\ntemperature_exploration = 0.4\ntemperature_reasoning = 0.0\n",
        )
        .unwrap()
        .llm
    }

    #[tokio::test]
    async fn test_rank_relations_uses_exploration_temperature() {
        let chat = CannedChat::new(vec![Ok("{brand (Score: 1.0)}".to_string())]);
        let oracle = LlmOracle::new(chat.clone(), &llm_config());
        let ranked = oracle
            .rank_relations("q", "Widget", &["brand".to_string()], 1)
            .await
            .unwrap();
        assert_eq!(ranked[0].relation, "brand");
        let seen = chat.seen.lock().unwrap();
        assert_eq!(seen[0].temperature, 0.4);
        assert!(seen[0].prompt.contains("Topic Entity: Widget"));
    }

    #[tokio::test]
    async fn test_transport_and_parse_errors_are_distinct() {
        let chat = CannedChat::new(vec![
            Err(TogError::Oracle("gave up".to_string())),
            Ok("no idea".to_string()),
        ]);
        let oracle = LlmOracle::new(chat, &llm_config());
        let first = oracle.score_candidates("q", "brand", &["A".to_string()]).await;
        assert!(matches!(first, Err(OracleError::Transport(_))));
        let second = oracle.score_candidates("q", "brand", &["A".to_string()]).await;
        assert!(matches!(second, Err(OracleError::Parse(_))));
    }

    #[tokio::test]
    async fn test_judge_and_answer() {
        let chat = CannedChat::new(vec![
            Ok("{Yes}. Enough.".to_string()),
            Ok(r#"{"answer": "Acme"}"#.to_string()),
        ]);
        let oracle = LlmOracle::new(chat.clone(), &llm_config());
        let mut chain = ReasoningChain::default();
        chain.push(ChainLayer::from(vec![Triple::new("Widget", "brand", "Acme")]));

        assert!(oracle.judge("q", &chain).await.unwrap());
        assert_eq!(oracle.answer("q", &chain).await.unwrap(), "Acme");
        assert_eq!(chat.seen.lock().unwrap()[1].temperature, 0.0);
    }
}
