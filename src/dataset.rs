//! QA datasets as JSON Lines.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Result, TogError};
use crate::reasoning::QuestionInput;

/// One benchmark question. Unknown fields are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaItem {
    #[serde(default)]
    pub question: String,
    /// Ground truth: a string, a list of strings, or absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_entity_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QaItem {
    pub fn is_linked(&self) -> bool {
        self.topic_entity_id.is_some()
    }

    /// Ground-truth answers as strings.
    pub fn answers(&self) -> Vec<String> {
        match &self.answer {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.to_string()],
        }
    }

    /// Engine input; the topic name falls back to the id when missing.
    pub fn to_input(&self) -> QuestionInput {
        let topic_entities = match &self.topic_entity_id {
            Some(id) => {
                let name = self.topic_entity_name.clone().unwrap_or_else(|| id.clone());
                vec![(id.clone(), name)]
            }
            None => Vec::new(),
        };
        QuestionInput {
            question: self.question.clone(),
            topic_entities,
        }
    }
}

/// Read one JSON value per non-blank line.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|e| {
            TogError::Parse(format!("{} line {}: {}", path.display(), index + 1, e))
        })?;
        out.push(value);
    }
    Ok(out)
}

/// Write one JSON value per line, replacing the file.
pub fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_extra_fields_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("qa.jsonl");
        std::fs::write(
            &path,
            "{\"qid\": \"easy_1\", \"question\": \"What brand is Widget?\", \"answer\": \"Acme\"}\n\n",
        )
        .unwrap();

        let mut items: Vec<QaItem> = read_jsonl(&path).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].extra["qid"], "easy_1");
        assert!(!items[0].is_linked());

        items[0].topic_entity_id = Some("i1".to_string());
        write_jsonl(&path, &items).unwrap();
        let reread: Vec<Value> = read_jsonl(&path).unwrap();
        assert_eq!(reread[0]["qid"], "easy_1");
        assert_eq!(reread[0]["topic_entity_id"], "i1");
        assert!(reread[0].get("topic_entity_name").is_none());
    }

    #[test]
    fn test_answers_shapes() {
        let item: QaItem = serde_json::from_value(json!({"question": "q", "answer": ["A", 3, null]})).unwrap();
        assert_eq!(item.answers(), vec!["A", "3"]);
        let item: QaItem = serde_json::from_value(json!({"question": "q"})).unwrap();
        assert!(item.answers().is_empty());
    }

    #[test]
    fn test_to_input() {
        let item: QaItem = serde_json::from_value(json!({
            "question": "q",
            "topic_entity_id": "i1"
        }))
        .unwrap();
        assert_eq!(
            item.to_input().topic_entities,
            vec![("i1".to_string(), "i1".to_string())]
        );
    }

    #[test]
    fn test_bad_line_reports_position() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"question\": \"ok\"}\nnot json\n").unwrap();
        let err = read_jsonl::<QaItem>(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
