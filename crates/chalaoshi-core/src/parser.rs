use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::record::ArchiveRecord;

/// `chalaoshi_csv<YYYYMMDD>_<post>_<floor>_<author>_<method>.zip`
static ARCHIVE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^chalaoshi_csv(?P<date>[0-9]{8})_(?P<post>[0-9]+)_(?P<floor>[0-9]+)_(?P<author>[^_]+)_(?P<method>[^.]+)\.zip$",
    )
    .unwrap()
});

/// Parse a bare archive filename. Returns `None` when the name does not
/// follow the naming scheme or embeds an impossible date.
pub fn parse_archive_filename(filename: &str) -> Option<ArchiveRecord> {
    let Some(caps) = ARCHIVE_NAME_RE.captures(filename) else {
        warn!("Archive filename does not follow the naming scheme: {}", filename);
        return None;
    };

    let date_str = &caps["date"];
    // Calendar years start at 1; chrono alone would accept year 0000
    let date = match NaiveDate::parse_from_str(date_str, "%Y%m%d") {
        Ok(d) if d.year() >= 1 => d,
        _ => {
            warn!("Invalid date {} in archive filename {}", date_str, filename);
            return None;
        }
    };

    let record = ArchiveRecord {
        filename: filename.to_string(),
        date,
        post_id: caps["post"].to_string(),
        floor_number: caps["floor"].to_string(),
        author_id: caps["author"].to_string(),
        encryption_method: caps["method"].to_string(),
        extraction: None,
    };
    debug!(?record, "Parsed archive filename");

    Some(record)
}
