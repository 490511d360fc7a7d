//! Topic-entity linking: pull the entity mention out of a question and
//! match it against graph entity names.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::graph::EntityId;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "the", "in", "of", "for", "with", "on", "at", "to", "is", "am", "are", "was",
    "were",
];

fn mention_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)item '(.*?)'",
            r"(?i)(?:brand of|item|with|query:)\s+((?:[\w\s'-:]+(?:\s\(.+?\))?)+?)(?:\?|\s+have|\s+cost|\s+fall|\s+classified|\s+belong to)",
            r#"(?i)history:\s*\[\s*"(.*?)""#,
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid mention pattern"))
        .collect()
    })
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("valid word regex"))
}

/// Entity mention in a question, from the first pattern that matches.
pub fn extract_topic_entity(question: &str) -> Option<String> {
    mention_patterns()
        .iter()
        .find_map(|re| re.captures(question))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Lowercased index words of a name: no stop words, no single characters.
fn index_words(text: &str) -> HashSet<String> {
    word_re()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| w.chars().count() > 1 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Lowercase, non-alphanumerics to spaces, trimmed.
fn normalize(text: &str) -> Vec<char> {
    let mapped: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    mapped.trim().chars().collect()
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Similarity in 0..=100 from the insert/delete edit distance of the normalized strings.
pub fn fuzzy_ratio(a: &str, b: &str) -> u8 {
    let (a, b) = (normalize(a), normalize(b));
    let total = a.len() + b.len();
    if total == 0 {
        return 0;
    }
    let ratio = 200.0 * lcs_len(&a, &b) as f64 / total as f64;
    ratio.round() as u8
}

/// A linked topic entity.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedEntity {
    pub id: EntityId,
    pub name: String,
    /// 100 for exact name matches.
    pub score: u8,
}

/// Name-to-entity resolver over a fixed set of graph entities.
pub struct EntityLinker {
    by_name: HashMap<String, EntityId>,
    index: HashMap<String, Vec<String>>,
    threshold: u8,
}

impl EntityLinker {
    /// Build from `(id, name)` pairs; for repeated names the last id wins.
    pub fn new<I>(entities: I, threshold: u8) -> Self
    where
        I: IntoIterator<Item = (EntityId, String)>,
    {
        let mut by_name = HashMap::new();
        for (id, name) in entities {
            by_name.insert(name, id);
        }

        let mut index: HashMap<String, Vec<String>> = HashMap::new();
        for name in by_name.keys() {
            for word in index_words(name) {
                index.entry(word).or_default().push(name.clone());
            }
        }
        for names in index.values_mut() {
            names.sort();
        }

        log::info!(
            "Entity linker ready: {} names, {} index words",
            by_name.len(),
            index.len()
        );
        Self {
            by_name,
            index,
            threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Resolve a mention: exact name first, else the best fuzzy match at or above the threshold.
    pub fn resolve(&self, mention: &str) -> Option<LinkedEntity> {
        if let Some(id) = self.by_name.get(mention) {
            return Some(LinkedEntity {
                id: id.clone(),
                name: mention.to_string(),
                score: 100,
            });
        }

        let mut candidates: Vec<&String> = index_words(mention)
            .iter()
            .filter_map(|word| self.index.get(word))
            .flatten()
            .collect();
        candidates.sort();
        candidates.dedup();

        let mut best: Option<(&String, u8)> = None;
        for name in candidates {
            let score = fuzzy_ratio(mention, name);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((name, score));
            }
        }

        let (name, score) = best?;
        if score < self.threshold {
            log::debug!("Best match {:?} for {:?} scored {} < {}", name, mention, score, self.threshold);
            return None;
        }
        Some(LinkedEntity {
            id: self.by_name[name].clone(),
            name: name.clone(),
            score,
        })
    }

    /// Extract the mention from `question` and resolve it.
    pub fn link_question(&self, question: &str) -> Option<LinkedEntity> {
        let mention = extract_topic_entity(question)?;
        self.resolve(&mention)
    }
}
