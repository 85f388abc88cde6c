use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Prefix the forum shows in front of anonymous author ids.
pub const ANONYMOUS_PREFIX: &str = "匿名";

const FORUM_BASE_URL: &str = "https://cc98.org";

/// Extraction status attached once an archive has been unpacked.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub extract_dir: String,
    pub extraction_time: DateTime<Local>,
}

/// Metadata parsed from one archive filename.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveRecord {
    /// Bare archive filename, unique key in the metadata store
    pub filename: String,
    /// Date embedded in the filename
    pub date: NaiveDate,
    /// Forum post holding the password source
    pub post_id: String,
    /// Floor within the post
    pub floor_number: String,
    /// Author of that floor, without the anonymity prefix
    pub author_id: String,
    /// Hash algorithm applied to the floor content, e.g. "sha256"
    pub encryption_method: String,
    /// Set only after a successful extraction
    pub extraction: Option<Extraction>,
}

impl ArchiveRecord {
    /// Date as it appears in the filename (`YYYYMMDD`).
    pub fn date_str(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    /// Date as `YYYY-MM-DD`.
    pub fn date_formatted(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn display_author(&self) -> String {
        format!("{}{}", ANONYMOUS_PREFIX, self.author_id)
    }

    pub fn forum_url(&self) -> String {
        format!("{}/{}/", FORUM_BASE_URL, self.post_id)
    }

    /// Human-readable hint telling where the archive password comes from.
    pub fn password_description(&self) -> String {
        format!(
            "{} 中 {}楼 {} 发表内容的{}哈希",
            self.forum_url(),
            self.floor_number,
            self.display_author(),
            self.encryption_method
        )
    }

    pub fn is_extracted(&self) -> bool {
        self.extraction.is_some()
    }

    /// Same record, marked as extracted into `extract_dir`.
    pub fn with_extraction(
        mut self,
        extract_dir: impl Into<String>,
        extraction_time: DateTime<Local>,
    ) -> Self {
        self.extraction = Some(Extraction {
            extract_dir: extract_dir.into(),
            extraction_time,
        });
        self
    }

    /// Stored representation, stamped with `updated_at`.
    pub fn to_entry(&self, updated_at: DateTime<Local>) -> ArchiveEntry {
        ArchiveEntry {
            filename: self.filename.clone(),
            date_str: self.date_str(),
            date_formatted: self.date_formatted(),
            post_id: self.post_id.clone(),
            floor_number: self.floor_number.clone(),
            author_id: self.display_author(),
            encryption_method: self.encryption_method.clone(),
            forum_url: self.forum_url(),
            password_description: self.password_description(),
            updated_at,
            extracted: self.extraction.as_ref().map(|_| true),
            extract_dir: self.extraction.as_ref().map(|e| e.extract_dir.clone()),
            extraction_time: self.extraction.as_ref().map(|e| e.extraction_time),
        }
    }
}

/// One element of the JSON metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    pub filename: String,
    pub date_str: String,
    pub date_formatted: String,
    pub post_id: String,
    pub floor_number: String,
    /// Author id with the anonymity prefix
    pub author_id: String,
    pub encryption_method: String,
    pub forum_url: String,
    pub password_description: String,
    pub updated_at: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_time: Option<DateTime<Local>>,
}

impl ArchiveEntry {
    pub fn is_extracted(&self) -> bool {
        self.extracted.unwrap_or(false)
    }
}
