use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::parser::parse_archive_filename;
use crate::record::{ArchiveEntry, ArchiveRecord};

/// Default location of the metadata document
pub const DEFAULT_INFO_FILE: &str = "logs/archive_info.json";

/// Whether an upsert replaced an existing entry or appended a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Updated,
    Inserted,
}

/// JSON list of archive entries keyed by `filename`.
///
/// Every call does a full read-modify-write of the file without locking,
/// so callers must not run two stores against the same path concurrently.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new(DEFAULT_INFO_FILE)
    }
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert `record`, or replace the entry with the same filename in place.
    pub fn upsert(&self, record: &ArchiveRecord) -> Result<Upserted, StoreError> {
        let mut document = self.load_document();
        let entry = serde_json::to_value(record.to_entry(Local::now()))?;

        let existing = document
            .iter()
            .position(|v| v.get("filename").and_then(Value::as_str) == Some(record.filename.as_str()));

        let outcome = match existing {
            Some(i) => {
                document[i] = entry;
                Upserted::Updated
            }
            None => {
                document.push(entry);
                Upserted::Inserted
            }
        };

        self.save_document(&document)?;
        match outcome {
            Upserted::Updated => info!("Updated archive info: {}", record.filename),
            Upserted::Inserted => info!("Added archive info: {}", record.filename),
        }
        Ok(outcome)
    }

    /// Record a successful extraction of `filename` into `extract_dir`.
    pub fn mark_extracted(
        &self,
        filename: &str,
        extract_dir: impl AsRef<Path>,
        extraction_time: DateTime<Local>,
    ) -> Result<Upserted, StoreError> {
        let record = parse_archive_filename(filename)
            .ok_or_else(|| StoreError::NotAnArchiveName(filename.to_string()))?
            .with_extraction(extract_dir.as_ref().to_string_lossy(), extraction_time);
        self.upsert(&record)
    }

    /// Typed view of the document. Entries of unknown shape are skipped.
    pub fn load_entries(&self) -> Vec<ArchiveEntry> {
        self.load_document()
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()
    }

    pub fn find(&self, filename: &str) -> Option<ArchiveEntry> {
        self.load_entries().into_iter().find(|e| e.filename == filename)
    }

    /// Missing or unreadable documents load as an empty list.
    fn load_document(&self) -> Vec<Value> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Cannot read archive info file {}, starting fresh: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(list)) => list,
            Ok(_) => {
                warn!("Archive info file {} is not a JSON list, starting fresh", self.path.display());
                Vec::new()
            }
            Err(e) => {
                warn!("Archive info file {} is corrupt, starting fresh: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Write to a sibling temp file, then rename over the target.
    fn save_document(&self, document: &[Value]) -> Result<(), StoreError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| StoreError::Io { path, source }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let mut temp_name = self.path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp_path = self.path.with_file_name(temp_name);

        let written = File::create(&temp_path)
            .map_err(io_err(&temp_path))
            .and_then(|file| -> Result<(), StoreError> {
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, document)?;
                writer.flush().map_err(io_err(&temp_path))?;
                drop(writer);
                fs::rename(&temp_path, &self.path).map_err(io_err(&self.path))
            });

        // Never leave a stale temp file behind on failure
        if written.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const NAME_A: &str = "chalaoshi_csv20250502_5399305_2696_26893D_sha256.zip";
    const NAME_B: &str = "chalaoshi_csv20250601_5400000_12_ABCDEF_md5.zip";

    fn record(name: &str) -> ArchiveRecord {
        parse_archive_filename(name).unwrap()
    }

    #[test]
    fn test_missing_file_creates_document() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("nested/logs/archive_info.json"));
        assert!(store.load_entries().is_empty());

        assert_eq!(store.upsert(&record(NAME_A)).unwrap(), Upserted::Inserted);
        assert!(store.path().exists());
        assert!(!dir.path().join("nested/logs/archive_info.json.tmp").exists());
        assert_eq!(store.load_entries().len(), 1);
    }

    #[test]
    fn test_upsert_same_filename_replaces() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("archive_info.json"));

        store.upsert(&record(NAME_A)).unwrap();
        let mut changed = record(NAME_A);
        changed.floor_number = "9999".to_string();
        assert_eq!(store.upsert(&changed).unwrap(), Upserted::Updated);

        let entries = store.load_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].floor_number, "9999");
    }

    #[test]
    fn test_insertion_order_preserved() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("archive_info.json"));

        store.upsert(&record(NAME_A)).unwrap();
        store.upsert(&record(NAME_B)).unwrap();
        // updating the first entry keeps it first
        store.upsert(&record(NAME_A)).unwrap();

        let names: Vec<_> = store.load_entries().into_iter().map(|e| e.filename).collect();
        assert_eq!(names, vec![NAME_A, NAME_B]);
    }

    #[test]
    fn test_reload_reproduces_fields() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("archive_info.json"));
        let r = record(NAME_A);
        store.upsert(&r).unwrap();

        let e = store.find(NAME_A).unwrap();
        assert_eq!(e.filename, r.filename);
        assert_eq!(e.date_str, "20250502");
        assert_eq!(e.date_formatted, "2025-05-02");
        assert_eq!(e.post_id, "5399305");
        assert_eq!(e.floor_number, "2696");
        assert_eq!(e.author_id, "匿名26893D");
        assert_eq!(e.encryption_method, "sha256");
        assert_eq!(e.forum_url, "https://cc98.org/5399305/");
        assert_eq!(e.password_description, r.password_description());
        assert!(!e.is_extracted());

        let reloaded = MetadataStore::new(store.path()).find(NAME_A).unwrap();
        assert_eq!(reloaded, e);
    }

    #[test]
    fn test_corrupt_document_degrades_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive_info.json");
        fs::write(&path, "{ not json").unwrap();

        let store = MetadataStore::new(&path);
        assert!(store.load_entries().is_empty());
        assert_eq!(store.upsert(&record(NAME_A)).unwrap(), Upserted::Inserted);
        assert_eq!(store.load_entries().len(), 1);

        fs::write(&path, r#"{"filename": "x"}"#).unwrap();
        store.upsert(&record(NAME_B)).unwrap();
        assert_eq!(store.load_entries().len(), 1);
    }

    #[test]
    fn test_foreign_entries_preserved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive_info.json");
        fs::write(&path, r#"[{"filename": "other.zip", "note": "kept"}]"#).unwrap();

        let store = MetadataStore::new(&path);
        store.upsert(&record(NAME_A)).unwrap();

        let raw: Vec<Value> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0]["note"], "kept");
        assert_eq!(raw[1]["filename"], NAME_A);
        assert!(raw[1].get("updatedAt").is_some());
    }

    #[test]
    fn test_mark_extracted() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("archive_info.json"));
        store.upsert(&record(NAME_B)).unwrap();
        store.upsert(&record(NAME_A)).unwrap();

        let when = Local::now();
        assert_eq!(store.mark_extracted(NAME_A, "extracted/a", when).unwrap(), Upserted::Updated);

        let entries = store.load_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].filename, NAME_A);
        assert!(entries[1].is_extracted());
        assert_eq!(entries[1].extract_dir.as_deref(), Some("extracted/a"));
        assert_eq!(entries[1].extraction_time, Some(when));
        assert!(!entries[0].is_extracted());

        assert!(matches!(
            store.mark_extracted("random.zip", "x", when),
            Err(StoreError::NotAnArchiveName(_))
        ));
    }

    #[test]
    fn test_unwritable_path_reports_failure() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a dir").unwrap();

        let store = MetadataStore::new(blocker.join("archive_info.json"));
        assert!(matches!(store.upsert(&record(NAME_A)), Err(StoreError::Io { .. })));
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "file, not a dir");
    }

    #[test]
    fn test_failed_replace_removes_temp_file() {
        let dir = tempdir().unwrap();
        // a directory where the document should go makes the final rename fail
        let target = dir.path().join("archive_info.json");
        fs::create_dir_all(target.join("occupied")).unwrap();

        let store = MetadataStore::new(&target);
        assert!(matches!(store.upsert(&record(NAME_A)), Err(StoreError::Io { .. })));
        assert!(!dir.path().join("archive_info.json.tmp").exists());
        assert!(target.is_dir());
    }

    #[test]
    fn test_document_keeps_field_order() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("archive_info.json"));
        store.mark_extracted(NAME_A, "extracted", Local::now()).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        let keys = [
            "\"filename\"",
            "\"dateStr\"",
            "\"dateFormatted\"",
            "\"postId\"",
            "\"floorNumber\"",
            "\"authorId\"",
            "\"encryptionMethod\"",
            "\"forumUrl\"",
            "\"passwordDescription\"",
            "\"updatedAt\"",
            "\"extracted\"",
            "\"extractDir\"",
            "\"extractionTime\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| text.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", text);
    }
}
