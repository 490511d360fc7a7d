//! Oracle response parsing.
//!
//! Each parser first tries the strict JSON shape requested by the prompts and
//! falls back to the free-text conventions models commonly produce instead
//! (`{relation (Score: 0.5)}` lists, bare decimal scores, `{Yes}` verdicts,
//! prose grades).

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use thiserror::Error;

use super::RankedRelation;

/// Structural problems in an oracle response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("no relations found in response")]
    NoRelations,

    #[error("relation entry has an empty name")]
    EmptyRelation,

    #[error("invalid score {0:?}")]
    InvalidScore(String),

    #[error("no scores found in response")]
    NoScores,

    #[error("no Correct/Incorrect decision found in response")]
    NoVerdict,
}

/// Grade given by an answer judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
}

#[derive(Deserialize)]
struct RelationRankingJson {
    relations: Vec<RankedRelation>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScoresJson {
    Object { scores: Vec<f64> },
    Bare(Vec<f64>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DecisionJson {
    Flag { sufficient: bool },
    Answer { answer: String },
}

#[derive(Deserialize)]
struct VerdictJson {
    decision: String,
}

fn legacy_relation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\s*(?P<relation>[^()]+)\s+\(Score:\s+(?P<score>[0-9.]+)\)\}")
            .expect("valid relation regex")
    })
}

fn decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\.\d+").expect("valid decimal regex"))
}

fn verdict_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(in)?correct\b").expect("valid verdict regex"))
}

/// Strip a surrounding Markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn check_score(score: f64) -> Result<f64, ParseError> {
    if score.is_finite() && score >= 0.0 {
        Ok(score)
    } else {
        Err(ParseError::InvalidScore(score.to_string()))
    }
}

/// Parse a relation ranking.
pub fn parse_relation_ranking(text: &str) -> Result<Vec<RankedRelation>, ParseError> {
    if let Ok(parsed) = serde_json::from_str::<RelationRankingJson>(strip_code_fence(text)) {
        if parsed.relations.is_empty() {
            return Err(ParseError::NoRelations);
        }
        return parsed
            .relations
            .into_iter()
            .map(|r| {
                let relation = r.relation.trim().to_string();
                if relation.is_empty() {
                    return Err(ParseError::EmptyRelation);
                }
                Ok(RankedRelation {
                    relation,
                    score: check_score(r.score)?,
                })
            })
            .collect();
    }

    let mut out = Vec::new();
    for caps in legacy_relation_re().captures_iter(text) {
        let relation = caps["relation"].trim();
        if relation.is_empty() {
            return Err(ParseError::EmptyRelation);
        }
        let raw = &caps["score"];
        let score = raw
            .parse::<f64>()
            .map_err(|_| ParseError::InvalidScore(raw.to_string()))?;
        out.push(RankedRelation {
            relation: relation.to_string(),
            score: check_score(score)?,
        });
    }
    if out.is_empty() {
        return Err(ParseError::NoRelations);
    }
    Ok(out)
}

/// Parse candidate weights. Count alignment is checked by the caller.
pub fn parse_candidate_scores(text: &str) -> Result<Vec<f64>, ParseError> {
    if let Ok(parsed) = serde_json::from_str::<ScoresJson>(strip_code_fence(text)) {
        let scores = match parsed {
            ScoresJson::Object { scores } | ScoresJson::Bare(scores) => scores,
        };
        if scores.is_empty() {
            return Err(ParseError::NoScores);
        }
        return scores.into_iter().map(check_score).collect();
    }

    let scores: Vec<f64> = decimal_re()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    if scores.is_empty() {
        return Err(ParseError::NoScores);
    }
    Ok(scores)
}

/// Content of the first `{...}` span, if there is one.
pub fn extract_braced(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = start + text[start..].find('}')?;
    Some(&text[start + 1..end])
}

fn is_yes(token: &str) -> bool {
    let normalized: String = token
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    normalized == "yes"
}

/// Parse a sufficiency verdict. Anything other than an explicit "yes" is "no".
pub fn parse_decision(text: &str) -> bool {
    match serde_json::from_str::<DecisionJson>(strip_code_fence(text)) {
        Ok(DecisionJson::Flag { sufficient }) => sufficient,
        Ok(DecisionJson::Answer { answer }) => is_yes(&answer),
        Err(_) => extract_braced(text).is_some_and(is_yes),
    }
}

/// Answer text: the `answer` field of a JSON reply, else the reply itself.
pub fn parse_answer(text: &str) -> String {
    #[derive(Deserialize)]
    struct AnswerJson {
        answer: String,
    }

    match serde_json::from_str::<AnswerJson>(strip_code_fence(text)) {
        Ok(parsed) => parsed.answer,
        Err(_) => text.trim().to_string(),
    }
}

fn verdict_of(decision: &str) -> Option<Verdict> {
    match decision.trim().to_lowercase().as_str() {
        "correct" => Some(Verdict::Correct),
        "incorrect" => Some(Verdict::Incorrect),
        _ => None,
    }
}

/// Parse a judge reply: a `{"decision": ...}` object, possibly wrapped in
/// prose, else the first standalone "Correct"/"Incorrect" word.
pub fn parse_verdict(text: &str) -> Result<Verdict, ParseError> {
    let text = strip_code_fence(text);
    let parsed = serde_json::from_str::<VerdictJson>(text).ok().or_else(|| {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        (end > start)
            .then(|| serde_json::from_str::<VerdictJson>(&text[start..=end]).ok())
            .flatten()
    });
    if let Some(parsed) = parsed {
        return verdict_of(&parsed.decision).ok_or(ParseError::NoVerdict);
    }

    verdict_re()
        .find(text)
        .and_then(|m| verdict_of(m.as_str()))
        .ok_or(ParseError::NoVerdict)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_ranking_json() {
        let text = r#"{"relations": [{"relation": "brand", "score": 0.7}, {"relation": " category ", "score": 0.3}]}"#;
        let ranked = parse_relation_ranking(text).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[1].relation, "category");
        assert_eq!(ranked[0].score, 0.7);
    }

    #[test]
    fn test_relation_ranking_fenced_json() {
        let text = "```json\n{\"relations\": [{\"relation\": \"brand\", \"score\": 1.0}]}\n```";
        assert_eq!(parse_relation_ranking(text).unwrap()[0].relation, "brand");
    }

    #[test]
    fn test_relation_ranking_legacy() {
        let text = "1. {brand (Score: 0.6)}: the maker.\n2. {also_bought (Score: 0.4)}: related.";
        let ranked = parse_relation_ranking(text).unwrap();
        assert_eq!(
            ranked,
            vec![
                RankedRelation {
                    relation: "brand".to_string(),
                    score: 0.6
                },
                RankedRelation {
                    relation: "also_bought".to_string(),
                    score: 0.4
                },
            ]
        );
    }

    #[test]
    fn test_relation_ranking_errors() {
        assert_eq!(
            parse_relation_ranking("I cannot help with that."),
            Err(ParseError::NoRelations)
        );
        assert_eq!(
            parse_relation_ranking(r#"{"relations": []}"#),
            Err(ParseError::NoRelations)
        );
        assert_eq!(
            parse_relation_ranking(r#"{"relations": [{"relation": "", "score": 0.5}]}"#),
            Err(ParseError::EmptyRelation)
        );
        assert!(matches!(
            parse_relation_ranking(r#"{"relations": [{"relation": "brand", "score": -1.0}]}"#),
            Err(ParseError::InvalidScore(_))
        ));
        assert!(matches!(
            parse_relation_ranking("{brand (Score: 0.1.2)}"),
            Err(ParseError::InvalidScore(_))
        ));
    }

    #[test]
    fn test_candidate_scores_shapes() {
        assert_eq!(
            parse_candidate_scores(r#"{"scores": [0.5, 0.25, 0.25]}"#).unwrap(),
            vec![0.5, 0.25, 0.25]
        );
        assert_eq!(parse_candidate_scores("[1, 0]").unwrap(), vec![1.0, 0.0]);
        assert_eq!(
            parse_candidate_scores("Scores: 0.8, 0.1 and 0.1").unwrap(),
            vec![0.8, 0.1, 0.1]
        );
        assert_eq!(parse_candidate_scores("none"), Err(ParseError::NoScores));
    }

    #[test]
    fn test_decision() {
        assert!(parse_decision(r#"{"sufficient": true}"#));
        assert!(!parse_decision(r#"{"sufficient": false}"#));
        assert!(parse_decision(r#"{"answer": " Yes "}"#));
        assert!(parse_decision("{Yes}. The triplets name the brand."));
        assert!(parse_decision("{ y e s }"));
        assert!(!parse_decision("{No}. Need more."));
        assert!(!parse_decision("Yes, but no braces"));
        assert!(!parse_decision("} yes {"));
    }

    #[test]
    fn test_extract_braced() {
        assert_eq!(extract_braced("The answer is {Acme}."), Some("Acme"));
        assert_eq!(extract_braced("{a} and {b}"), Some("a"));
        assert_eq!(extract_braced("no braces"), None);
        assert_eq!(extract_braced("{unterminated"), None);
    }

    #[test]
    fn test_answer() {
        assert_eq!(parse_answer(r#"{"answer": "Acme"}"#), "Acme");
        assert_eq!(parse_answer("  {Acme} \n"), "{Acme}");
    }

    #[test]
    fn test_verdict() {
        assert_eq!(
            parse_verdict(r#"{"decision": "Correct", "reason": "names Acme"}"#),
            Ok(Verdict::Correct)
        );
        assert_eq!(
            parse_verdict("```json\n{\"decision\": \"incorrect\"}\n```"),
            Ok(Verdict::Incorrect)
        );
        assert_eq!(
            parse_verdict("Your Judgment:\n{\"decision\": \"Incorrect\", \"reason\": \"no answer\"}"),
            Ok(Verdict::Incorrect)
        );
        assert_eq!(parse_verdict("Incorrect. It names Zenith."), Ok(Verdict::Incorrect));
        assert_eq!(parse_verdict("The answer is correct."), Ok(Verdict::Correct));
        assert_eq!(parse_verdict(r#"{"decision": "Maybe"}"#), Err(ParseError::NoVerdict));
        assert_eq!(parse_verdict("Correctness unclear"), Err(ParseError::NoVerdict));
    }
}
