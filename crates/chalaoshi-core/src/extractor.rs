use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::Local;
use encoding_rs::GBK;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};
use zip::ZipArchive;

use crate::config::Config;
use crate::parser::parse_archive_filename;
use crate::passwords::PasswordBook;
use crate::store::MetadataStore;

/// Extracts configured archives and keeps the metadata store up to date.
pub struct Extractor {
    config: Config,
    store: MetadataStore,
}

impl Extractor {
    pub fn new(config: Config) -> Self {
        let store = MetadataStore::new(config.metadata.info_file.clone());
        Self { config, store }
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Check the file name against the configured suffixes (".zip", ".tar.gz", ...)
    pub fn is_supported_format(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_lowercase();
        self.config
            .extract
            .supported_formats
            .iter()
            .any(|fmt| name.len() > fmt.len() && name.ends_with(&fmt.to_lowercase()))
    }

    /// Extract one archive, trying `password` or else the configured list.
    ///
    /// Returns `Ok(false)` when the archive is missing, unsupported, or no
    /// candidate password opens it.
    pub fn extract_file(
        &self,
        archive_path: &Path,
        extract_dir: Option<&Path>,
        password: Option<&str>,
    ) -> anyhow::Result<bool> {
        if !archive_path.exists() {
            error!("Archive not found: {}", archive_path.display());
            return Ok(false);
        }
        if !self.is_supported_format(archive_path) {
            error!("Unsupported archive format: {}", archive_path.display());
            return Ok(false);
        }

        let filename = archive_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("");
        let record = parse_archive_filename(filename);
        if let Some(ref r) = record {
            if let Err(e) = self.store.upsert(r) {
                warn!("Failed to save archive info for {}: {}", filename, e);
            }
        }

        let extract_dir = extract_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.extract.default_extract_dir.clone());
        fs::create_dir_all(&extract_dir)?;

        // A populated target only warns; files are written over regardless.
        if !self.config.extract.overwrite_existing && fs::read_dir(&extract_dir)?.next().is_some() {
            warn!("Extract directory is not empty and overwrite is off: {}", extract_dir.display());
        }

        if !is_zip(archive_path) {
            error!("Only ZIP archives can be extracted: {}", archive_path.display());
            return Ok(false);
        }

        let candidates = match password {
            Some(p) => vec![p.to_string()],
            None => PasswordBook::new(&self.config.passwords).passwords_for(archive_path),
        };

        info!("Extracting {} -> {}", archive_path.display(), extract_dir.display());

        for pwd in &candidates {
            debug!("Trying password: {}", if pwd.is_empty() { "(empty)" } else { "***" });

            match extract_zip(archive_path, &extract_dir, pwd) {
                Ok(count) => {
                    if pwd.is_empty() {
                        info!("Extracted {} files, no password needed", count);
                    } else {
                        info!("Extracted {} files with password ***", count);
                    }
                    if record.is_some() {
                        if let Err(e) = self.store.mark_extracted(filename, &extract_dir, Local::now()) {
                            warn!("Failed to record extraction of {}: {}", filename, e);
                        }
                    }
                    return Ok(true);
                }
                Err(e) => debug!("Extraction attempt failed: {}", e),
            }
        }

        error!("Extraction failed, no password worked: {}", archive_path.display());
        Ok(false)
    }

    /// Run every `[[extract_tasks]]` entry in order.
    pub fn extract_from_config(&self) -> Vec<(PathBuf, bool)> {
        let mut results = Vec::new();

        for task in &self.config.extract_tasks {
            let Some(archive_path) = &task.archive_path else {
                warn!("Skipping extract task without archive_path");
                continue;
            };
            // An empty password means "use the configured list"
            let password = task.password.as_deref().filter(|p| !p.is_empty());

            let ok = match self.extract_file(archive_path, task.extract_dir.as_deref(), password) {
                Ok(ok) => ok,
                Err(e) => {
                    error!("Extraction of {} failed: {}", archive_path.display(), e);
                    false
                }
            };
            results.push((archive_path.clone(), ok));
        }

        results
    }
}

/// Entry names of a ZIP archive.
pub fn list_archive_contents(archive_path: &Path) -> anyhow::Result<Vec<String>> {
    if !is_zip(archive_path) {
        anyhow::bail!("Only ZIP archives can be listed: {}", archive_path.display());
    }
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        names.push(decode_zip_name(entry.name_raw()));
    }
    Ok(names)
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("zip"))
}

/// Decode ZIP entry name, trying UTF-8 first, then GBK
fn decode_zip_name(raw: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(raw) {
        return s.to_string();
    }

    // Chinese Windows archivers write names in GBK without the UTF-8 flag
    let (decoded, _, had_errors) = GBK.decode(raw);
    if !had_errors {
        return decoded.into_owned();
    }

    String::from_utf8_lossy(raw).into_owned()
}

/// Relative path for an entry, or `None` if it would escape the target.
fn safe_relative_path(name: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(&name.replace('\\', "/")).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Test every entry with `password`, then write them all out.
fn extract_zip(archive_path: &Path, extract_dir: &Path, password: &str) -> anyhow::Result<usize> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    // Reading each entry fully checks the password and CRCs before anything is written
    for i in 0..archive.len() {
        let mut entry = if password.is_empty() {
            archive.by_index(i)?
        } else {
            archive.by_index_decrypt(i, password.as_bytes())?
        };
        io::copy(&mut entry, &mut io::sink())?;
    }

    let pb = ProgressBar::new(archive.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} extracting {msg}")
            .unwrap(),
    );
    pb.set_message(
        archive_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string(),
    );

    let mut written = 0;
    for i in 0..archive.len() {
        pb.inc(1);
        let mut entry = if password.is_empty() {
            archive.by_index(i)?
        } else {
            archive.by_index_decrypt(i, password.as_bytes())?
        };

        let name = decode_zip_name(entry.name_raw());
        let Some(relative) = safe_relative_path(&name) else {
            warn!("Skipping entry with unsafe path: {}", name);
            continue;
        };
        let dest = extract_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out_file = File::create(&dest)?;
        io::copy(&mut entry, &mut out_file)?;
        written += 1;
    }

    pb.finish_and_clear();
    Ok(written)
}
