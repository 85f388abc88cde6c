use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{PasswordConfig, PasswordEntry};

/// Resolves candidate passwords for an archive from configuration.
pub struct PasswordBook<'a> {
    config: &'a PasswordConfig,
}

impl<'a> PasswordBook<'a> {
    pub fn new(config: &'a PasswordConfig) -> Self {
        Self { config }
    }

    /// File-specific passwords first, then the defaults, without duplicates.
    pub fn passwords_for(&self, archive_path: &Path) -> Vec<String> {
        let filename = archive_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("");

        let specific = self
            .config
            .file_passwords
            .get(filename)
            .map(|entries| entries.iter().map(resolve).collect::<Vec<_>>())
            .unwrap_or_default();

        let mut passwords: Vec<String> = Vec::new();
        for pwd in specific.into_iter().chain(self.config.default_passwords.iter().cloned()) {
            if !passwords.contains(&pwd) {
                passwords.push(pwd);
            }
        }
        passwords
    }
}

fn resolve(entry: &PasswordEntry) -> String {
    match entry {
        PasswordEntry::Plain(pwd) => pwd.clone(),
        PasswordEntry::Typed { content, kind } if kind == "raw" => {
            debug!("Hashing raw password content with SHA-256");
            sha256_hex(content)
        }
        PasswordEntry::Typed { content, .. } => content.clone(),
    }
}

/// Lowercase hex SHA-256 of the UTF-8 bytes of `content`.
pub fn sha256_hex(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
