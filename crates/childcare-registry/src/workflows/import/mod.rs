//! Legacy import pipeline: decode, parse, deduplicate, and upsert the
//! historical client export into the `parent` and `child` collections.
//!
//! The pipeline is idempotent: identity keys and document ids are stable
//! functions of the input, and the fill-only merge never rewrites populated
//! fields, so re-running the import over the same file updates documents in
//! place instead of duplicating them.

mod encoding;

pub mod aggregate;
pub mod docid;
pub mod identity;
pub mod normalize;
pub mod parser;

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::info;

use crate::config::ImportConfig;
use crate::store::{to_document, BatchWriter, Document, DocumentStore, Patch, StoreError, WriteOp};

use aggregate::{ChildDraft, DedupAggregator};

pub const PARENT_COLLECTION: &str = "parent";
pub const CHILD_COLLECTION: &str = "child";

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read legacy export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid legacy export data: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What an import run did (or, for a dry run, would have done).
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub rows: usize,
    pub unique_parents: usize,
    pub unique_children: usize,
    pub written_parents: usize,
    pub written_children: usize,
    pub dry_run: bool,
    /// First few canonical documents, echoed by dry runs for eyeballing.
    pub parent_samples: Vec<(String, Document)>,
    pub child_samples: Vec<(String, Document)>,
}

pub struct LegacyImporter<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    config: ImportConfig,
}

impl<'a, S: DocumentStore + ?Sized> LegacyImporter<'a, S> {
    pub fn new(store: &'a S, config: ImportConfig) -> Self {
        Self { store, config }
    }

    /// Import a legacy export file. A dry run aggregates and reports without
    /// touching the store.
    pub fn run_path(&self, path: &Path, dry_run: bool) -> Result<ImportSummary, ImportError> {
        let bytes = std::fs::read(path)?;
        self.run_bytes(&bytes, dry_run)
    }

    pub fn run_bytes(&self, bytes: &[u8], dry_run: bool) -> Result<ImportSummary, ImportError> {
        let text = encoding::decode_legacy(bytes);
        let records = parser::parse_rows(text.as_bytes())?;

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut aggregator = DedupAggregator::new(&self.config.default_country_code);
        for record in &records {
            aggregator.absorb(record, &now);
        }

        let parent_docs: Vec<(String, Document)> = aggregator
            .parents()
            .map(|draft| Ok((draft.doc_id.clone(), to_document(&draft.entity)?)))
            .collect::<Result<_, StoreError>>()?;
        let child_docs: Vec<(String, Document)> = aggregator
            .children()
            .map(|draft| Ok((draft.doc_id.clone(), child_document(draft)?)))
            .collect::<Result<_, StoreError>>()?;

        let mut summary = ImportSummary {
            rows: aggregator.rows(),
            unique_parents: aggregator.parent_count(),
            unique_children: aggregator.child_count(),
            written_parents: 0,
            written_children: 0,
            dry_run,
            parent_samples: parent_docs
                .iter()
                .take(self.config.sample_count)
                .cloned()
                .collect(),
            child_samples: child_docs
                .iter()
                .take(self.config.sample_count)
                .cloned()
                .collect(),
        };

        if dry_run {
            info!(
                rows = summary.rows,
                parents = summary.unique_parents,
                children = summary.unique_children,
                "dry run, nothing written"
            );
            return Ok(summary);
        }

        summary.written_parents = self.write_collection(PARENT_COLLECTION, parent_docs)?;
        summary.written_children = self.write_collection(CHILD_COLLECTION, child_docs)?;

        info!(
            rows = summary.rows,
            parents = summary.written_parents,
            children = summary.written_children,
            "legacy import committed"
        );
        Ok(summary)
    }

    fn write_collection(
        &self,
        collection: &str,
        docs: Vec<(String, Document)>,
    ) -> Result<usize, ImportError> {
        let mut writer = BatchWriter::new(self.store, self.config.batch_limit);
        for (id, doc) in docs {
            writer.queue(WriteOp::merge_set(
                collection,
                &id,
                Patch::from_document(doc),
            ))?;
        }
        Ok(writer.finish()?.operations)
    }
}

fn child_document(draft: &ChildDraft) -> Result<Document, StoreError> {
    let mut doc = to_document(&draft.entity)?;
    doc.insert(
        "parentIds".to_string(),
        Value::Array(
            draft
                .parent_ids
                .iter()
                .map(|id| Value::String(id.clone()))
                .collect(),
        ),
    );
    doc.insert(
        "parentNames".to_string(),
        Value::Array(
            draft
                .parent_names
                .iter()
                .map(|name| Value::String(name.clone()))
                .collect(),
        ),
    );
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const EXPORT: &str = "\
2021.09.01\tBitītes\tAnna\tLiepa\t\t01.05.2019\tRīga\tIlze\tLiepa\t120199-12345\t29112233\tilze@example.lv\tRīga, Brīvības 1\t\tJānis\tLiepa\t\t+37128445566\tRīga, Brīvības 1\tjanis@example.lv
2021.09.01\tBitītes\tAnna\tLiepa\t\t01.05.2019\t\tIlze\tLiepa\t120199-12345\t\t\t\t\t\t\t\t\t\t
2022.01.10\tZīlītes\tOto\tOzols\t150820-54321\t20.08.2015\t\tMarta\tOzola\t\t28001122\tmarta@example.lv\t\t\t\t\t\t\t\t
";

    fn importer_config() -> ImportConfig {
        ImportConfig {
            batch_limit: 2,
            default_country_code: "371".to_string(),
            sample_count: 2,
        }
    }

    #[test]
    fn aggregates_and_writes_canonical_collections() {
        let store = MemoryStore::new();
        let importer = LegacyImporter::new(&store, importer_config());

        let summary = importer
            .run_bytes(EXPORT.as_bytes(), false)
            .expect("import");

        assert_eq!(summary.rows, 3);
        assert_eq!(summary.unique_parents, 3);
        assert_eq!(summary.unique_children, 2);
        assert_eq!(summary.written_parents, 3);
        assert_eq!(summary.written_children, 2);

        let ilze = store
            .get(PARENT_COLLECTION, "pk-12019912345")
            .expect("get")
            .expect("present");
        assert_eq!(ilze["phone"], "29112233");
        assert_eq!(ilze["phoneE164"], "+37129112233");
        assert_eq!(ilze["email"], "ilze@example.lv");

        let anna = store
            .get(CHILD_COLLECTION, "nm-anna-liepa-20190501")
            .expect("get")
            .expect("present");
        assert_eq!(anna["status"], "finished");
        let parent_ids = anna["parentIds"].as_array().expect("array");
        assert_eq!(parent_ids.len(), 2);
        assert!(parent_ids.contains(&serde_json::json!("pk-12019912345")));
        assert!(parent_ids.contains(&serde_json::json!("ph-37128445566")));

        let oto = store
            .get(CHILD_COLLECTION, "cpk-15082054321")
            .expect("get")
            .expect("present");
        assert_eq!(oto["dob"], "2015-08-20");
    }

    #[test]
    fn rerunning_the_import_is_idempotent() {
        let store = MemoryStore::new();
        let importer = LegacyImporter::new(&store, importer_config());

        let first = importer
            .run_bytes(EXPORT.as_bytes(), false)
            .expect("first run");
        let before: Vec<String> = store
            .list(CHILD_COLLECTION)
            .expect("list")
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let second = importer
            .run_bytes(EXPORT.as_bytes(), false)
            .expect("second run");
        let after: Vec<String> = store
            .list(CHILD_COLLECTION)
            .expect("list")
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        assert_eq!(first.unique_parents, second.unique_parents);
        assert_eq!(first.unique_children, second.unique_children);
        assert_eq!(before, after);
        assert_eq!(store.document_count(PARENT_COLLECTION), 3);
        assert_eq!(store.document_count(CHILD_COLLECTION), 2);
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let store = MemoryStore::new();
        let importer = LegacyImporter::new(&store, importer_config());

        let summary = importer
            .run_bytes(EXPORT.as_bytes(), true)
            .expect("dry run");

        assert!(summary.dry_run);
        assert_eq!(summary.unique_parents, 3);
        assert_eq!(summary.written_parents, 0);
        assert_eq!(summary.parent_samples.len(), 2);
        assert_eq!(store.document_count(PARENT_COLLECTION), 0);
        assert_eq!(store.document_count(CHILD_COLLECTION), 0);
    }

    #[test]
    fn utf16_export_decodes_before_parsing() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in EXPORT.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }

        let store = MemoryStore::new();
        let importer = LegacyImporter::new(&store, importer_config());
        let summary = importer.run_bytes(&bytes, true).expect("dry run");
        assert_eq!(summary.unique_children, 2);
    }

    #[test]
    fn unreadable_file_is_fatal() {
        let store = MemoryStore::new();
        let importer = LegacyImporter::new(&store, importer_config());
        let result = importer.run_path(Path::new("/nonexistent/legacy.csv"), false);
        assert!(matches!(result, Err(ImportError::Io(_))));
    }
}
