//! Labeled queries.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EvalError, Result};
use crate::utils::fs::read_records;

/// A query paired with the id of the one document that answers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthEntry {
    /// Expected document id.
    pub document: String,
    #[serde(alias = "query")]
    pub question: String,
    pub company: String,
    /// Any other metadata carried by the source file.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl GroundTruthEntry {
    pub fn new(
        document: impl Into<String>,
        question: impl Into<String>,
        company: impl Into<String>,
    ) -> Self {
        Self {
            document: document.into(),
            question: question.into(),
            company: company.into(),
            extra: BTreeMap::new(),
        }
    }
}

/// Load entries from a JSON array or JSON Lines file.
pub fn load_ground_truth(path: impl AsRef<Path>) -> Result<Vec<GroundTruthEntry>> {
    let path = path.as_ref();
    let entries: Vec<GroundTruthEntry> = read_records(path)?;
    if let Some(position) = entries.iter().position(|entry| entry.document.trim().is_empty()) {
        return Err(EvalError::Validation(format!(
            "{}: entry {} has an empty document id",
            path.display(),
            position + 1
        )));
    }
    tracing::debug!(path = %path.display(), entries = entries.len(), "loaded ground truth");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn extra_metadata_is_preserved() {
        let raw = r#"{"document":"1a2b3c4d","question":"What drove revenue?","company":"ACME","section":"MD&A"}"#;
        let entry: GroundTruthEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.document, "1a2b3c4d");
        assert_eq!(entry.extra["section"], "MD&A");

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["section"], "MD&A");
    }

    #[test]
    fn query_is_accepted_as_question() {
        let raw = r#"{"document":"1a2b3c4d","query":"Net income?","company":"ACME"}"#;
        let entry: GroundTruthEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.question, "Net income?");
    }

    #[test]
    fn load_rejects_blank_document_ids() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gt.jsonl");
        std::fs::write(
            &path,
            "{\"document\":\"a\",\"question\":\"q\",\"company\":\"ACME\"}\n\
             {\"document\":\" \",\"question\":\"q\",\"company\":\"ACME\"}\n",
        )
        .unwrap();

        let err = load_ground_truth(&path).unwrap_err();
        assert!(matches!(err, EvalError::Validation(msg) if msg.contains("entry 2")));
    }
}
