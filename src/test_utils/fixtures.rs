use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::corpus::{Document, encode_documents, save_documents};
use crate::encoder::HashEncoder;
use crate::eval::GroundTruthEntry;
use crate::utils::fs::write_records;

/// Passages from two companies with disjoint vocabulary per passage.
#[must_use]
pub fn sample_documents() -> Vec<Document> {
    [
        ("ACME", "FY2023", "10-K", "MD&A", "Revenue grew twelve percent on strong anvil shipments to western distributors."),
        ("ACME", "FY2023", "10-K", "Risk Factors", "Competition from rocket skate manufacturers could erode margins."),
        ("ACME", "FY2023", "10-Q", "Liquidity", "Cash reserves cover eighteen months of planned capital expenditure."),
        ("ACME", "FY2022", "10-K", "Legal Proceedings", "A coyote filed suit alleging defective catapult springs."),
        ("Globex", "FY2023", "10-K", "MD&A", "Subscription income doubled after the volcano lair platform launch."),
        ("Globex", "FY2023", "10-K", "Risk Factors", "Regulators may restrict doomsday device exports to allied nations."),
        ("Globex", "FY2022", "10-Q", "Liquidity", "Revolving credit facility was extended through twenty twenty seven."),
    ]
    .into_iter()
    .map(|(company, period, filing_type, section, text)| {
        Document::new(company, period, filing_type, section, text)
    })
    .collect()
}

/// [`sample_documents`] encoded with a [`HashEncoder`] of width `dims`.
#[must_use]
pub fn encoded_sample(dims: usize) -> Vec<Document> {
    let mut docs = sample_documents();
    encode_documents(&mut docs, &HashEncoder::new(dims)).expect("hash encoding succeeds");
    docs
}

/// One entry per document, asking with the passage text itself.
#[must_use]
pub fn self_ground_truth(docs: &[Document]) -> Vec<GroundTruthEntry> {
    docs.iter()
        .map(|doc| GroundTruthEntry::new(doc.id.clone(), doc.text.clone(), doc.company.clone()))
        .collect()
}

/// Test fixture providing an isolated working directory.
pub struct EvalFixture {
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl Default for EvalFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalFixture {
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        Self { temp_dir, root }
    }

    #[must_use]
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    pub fn write_corpus(&self, relative: &str, docs: &[Document]) -> PathBuf {
        let path = self.path(relative);
        save_documents(&path, docs).expect("Failed to write corpus");
        path
    }

    pub fn write_ground_truth(&self, relative: &str, entries: &[GroundTruthEntry]) -> PathBuf {
        let path = self.path(relative);
        write_records(&path, entries).expect("Failed to write ground truth");
        path
    }

    /// Write `rag-eval.toml` with a hash encoder of width `dims`.
    pub fn write_hash_config(&self, dims: usize) -> PathBuf {
        self.write_file(
            crate::config::PROJECT_CONFIG_FILE,
            &format!("[encoder]\nbackend = \"hash\"\ndims = {dims}\n"),
        )
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
