//! Filing passages and their vector enrichment.
//!
//! A [`Document`] carries the filing metadata, the passage text and three
//! embeddings of the same width:
//!
//! | field             | embedded content                                       |
//! |-------------------|--------------------------------------------------------|
//! | `text_vector`     | `text`                                                 |
//! | `non_text_vector` | `company reporting_period filing_type section`         |
//! | `all_vector`      | `company reporting_period filing_type section text`    |
//!
//! Identifiers are the first [`ID_HEX_LEN`] hex characters of the MD5 of the
//! text, so ids match ground truth written against the same scheme. Truncation makes collisions possible: with 32 bits the birthday
//! bound reaches ~1% at roughly 9,300 distinct passages, so corpora beyond a
//! few thousand passages should run [`find_id_collisions`] before indexing.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use md5::{Digest, Md5};

use crate::encoder::Encoder;
use crate::error::{EvalError, Result};
use crate::utils::fs::{read_records, write_records};

/// Number of hex characters kept from the content digest.
pub const ID_HEX_LEN: usize = 8;

/// Names of the dense-vector fields every enriched document carries.
pub const VECTOR_FIELDS: [&str; 3] = ["text_vector", "non_text_vector", "all_vector"];

/// Source fields returned by searches unless configured otherwise.
pub const DEFAULT_SOURCE_FIELDS: [&str; 6] = [
    "id",
    "company",
    "reporting_period",
    "filing_type",
    "section",
    "text",
];

/// Deterministic content identifier: truncated MD5 of `text`.
#[must_use]
pub fn generate_document_id(text: &str) -> String {
    let digest = Md5::digest(text.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(ID_HEX_LEN);
    id
}

/// One filing passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: String,
    pub company: String,
    #[serde(default)]
    pub reporting_period: String,
    #[serde(default)]
    pub filing_type: String,
    #[serde(default)]
    pub section: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_vector: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_text_vector: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_vector: Option<Vec<f32>>,
}

impl Document {
    pub fn new(
        company: impl Into<String>,
        reporting_period: impl Into<String>,
        filing_type: impl Into<String>,
        section: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        Self {
            id: generate_document_id(&text),
            company: company.into(),
            reporting_period: reporting_period.into(),
            filing_type: filing_type.into(),
            section: section.into(),
            text,
            text_vector: None,
            non_text_vector: None,
            all_vector: None,
        }
    }

    /// Fill a missing identifier from the text.
    #[must_use]
    pub fn with_generated_id(mut self) -> Self {
        if self.id.is_empty() {
            self.id = generate_document_id(&self.text);
        }
        self
    }

    /// Metadata fields joined with single spaces, excluding `text`.
    #[must_use]
    pub fn non_text_content(&self) -> String {
        [
            self.company.as_str(),
            self.reporting_period.as_str(),
            self.filing_type.as_str(),
            self.section.as_str(),
        ]
        .join(" ")
    }

    /// Metadata fields followed by `text`.
    #[must_use]
    pub fn all_content(&self) -> String {
        format!("{} {}", self.non_text_content(), self.text)
    }

    /// Vector stored under a dense-vector field name.
    #[must_use]
    pub fn vector(&self, field: &str) -> Option<&[f32]> {
        match field {
            "text_vector" => self.text_vector.as_deref(),
            "non_text_vector" => self.non_text_vector.as_deref(),
            "all_vector" => self.all_vector.as_deref(),
            _ => None,
        }
    }

    /// Whether all three vector fields are present.
    #[must_use]
    pub fn is_encoded(&self) -> bool {
        VECTOR_FIELDS.iter().all(|field| self.vector(field).is_some())
    }

    /// Textual value of a source field, for lexical matching and projection.
    #[must_use]
    pub fn text_field(&self, field: &str) -> Option<&str> {
        match field {
            "id" => Some(&self.id),
            "company" => Some(&self.company),
            "reporting_period" => Some(&self.reporting_period),
            "filing_type" => Some(&self.filing_type),
            "section" => Some(&self.section),
            "text" => Some(&self.text),
            _ => None,
        }
    }
}

/// Compute the three vector fields of one document.
pub fn encode_document(doc: &mut Document, encoder: &dyn Encoder) -> Result<()> {
    doc.text_vector = Some(encoder.encode(&doc.text)?);
    doc.non_text_vector = Some(encoder.encode(&doc.non_text_content())?);
    doc.all_vector = Some(encoder.encode(&doc.all_content())?);
    Ok(())
}

/// Encode every document, then check the corpus-wide dimensionality invariant.
pub fn encode_documents(docs: &mut [Document], encoder: &dyn Encoder) -> Result<()> {
    encode_documents_with(docs, encoder, |_| {})
}

/// [`encode_documents`] calling `on_progress` with the number of documents encoded.
pub fn encode_documents_with(
    docs: &mut [Document],
    encoder: &dyn Encoder,
    mut on_progress: impl FnMut(usize),
) -> Result<()> {
    for (done, doc) in docs.iter_mut().enumerate() {
        encode_document(doc, encoder).map_err(|err| match err {
            EvalError::Encoding(msg) => EvalError::Encoding(format!("document {}: {msg}", doc.id)),
            other => other,
        })?;
        on_progress(done + 1);
    }
    let dims = corpus_dims(docs)?;
    tracing::info!(documents = docs.len(), dims = ?dims, encoder = encoder.name(), "encoded corpus");
    Ok(())
}

/// Shared dimensionality of all present vectors, `None` when nothing is encoded.
///
/// Any vector whose width differs from the first one seen is an error: a
/// corpus must never mix dimensionalities.
pub fn corpus_dims(docs: &[Document]) -> Result<Option<usize>> {
    let mut dims: Option<usize> = None;
    for doc in docs {
        for field in VECTOR_FIELDS {
            let Some(vector) = doc.vector(field) else {
                continue;
            };
            match dims {
                None => dims = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    return Err(EvalError::Encoding(format!(
                        "document {} field {field} has {} dimensions, corpus has {expected}",
                        doc.id,
                        vector.len()
                    )));
                }
                Some(_) => {}
            }
        }
    }
    Ok(dims)
}

/// Distinct texts that truncate to the same identifier, keyed by identifier.
#[must_use]
pub fn find_id_collisions(docs: &[Document]) -> Vec<(String, Vec<usize>)> {
    let mut by_id: HashMap<String, Vec<usize>> = HashMap::new();
    for (position, doc) in docs.iter().enumerate() {
        let id = generate_document_id(&doc.text);
        let entry = by_id.entry(id).or_default();
        if entry.iter().all(|&other| docs[other].text != doc.text) {
            entry.push(position);
        }
    }

    let mut collisions: Vec<(String, Vec<usize>)> = by_id
        .into_iter()
        .filter(|(_, positions)| positions.len() > 1)
        .collect();
    collisions.sort_by(|a, b| a.0.cmp(&b.0));
    collisions
}

/// Load a corpus, generating identifiers where they are missing.
pub fn load_documents(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let docs: Vec<Document> = read_records(path)?;
    Ok(docs.into_iter().map(Document::with_generated_id).collect())
}

pub fn save_documents(path: impl AsRef<Path>, docs: &[Document]) -> Result<()> {
    write_records(path, docs)
}
