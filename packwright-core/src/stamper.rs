//! Rewriting the version-declaration artifact of a unit.

use std::fs;
use std::path::{Path, PathBuf};

use regex::{NoExpand, Regex};
use tracing::info;
use walkdir::WalkDir;

use crate::config::StampConfig;
use crate::error::{Error, Result};
use crate::unit::ProjectUnit;

/// Directories never searched for the version artifact.
const SKIPPED_DIRS: &[&str] = &[".git", "bin", "obj", "packages", "node_modules"];

/// Text encodings a version artifact is written back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    /// Detects the encoding from a byte-order mark and decodes the text.
    ///
    /// # Errors
    ///
    /// Returns an expectation failure if the bytes are not valid text.
    pub fn decode(bytes: &[u8]) -> Result<(Self, String)> {
        let invalid = || Error::expectation("version artifact is not valid UTF-8 or UTF-16 text");

        if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
            let text = String::from_utf8(rest.to_vec()).map_err(|_| invalid())?;
            return Ok((TextEncoding::Utf8Bom, text));
        }
        if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
            let units = Self::utf16_units(rest, u16::from_le_bytes).ok_or_else(invalid)?;
            let text = String::from_utf16(&units).map_err(|_| invalid())?;
            return Ok((TextEncoding::Utf16Le, text));
        }
        if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
            let units = Self::utf16_units(rest, u16::from_be_bytes).ok_or_else(invalid)?;
            let text = String::from_utf16(&units).map_err(|_| invalid())?;
            return Ok((TextEncoding::Utf16Be, text));
        }

        let text = String::from_utf8(bytes.to_vec()).map_err(|_| invalid())?;
        Ok((TextEncoding::Utf8, text))
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Utf8Bom => {
                let mut bytes = vec![0xEF, 0xBB, 0xBF];
                bytes.extend_from_slice(text.as_bytes());
                bytes
            }
            TextEncoding::Utf16Le => {
                let mut bytes = vec![0xFF, 0xFE];
                bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
                bytes
            }
            TextEncoding::Utf16Be => {
                let mut bytes = vec![0xFE, 0xFF];
                bytes.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
                bytes
            }
        }
    }

    fn utf16_units(bytes: &[u8], convert: fn([u8; 2]) -> u16) -> Option<Vec<u16>> {
        if bytes.len() % 2 != 0 {
            return None;
        }
        Some(
            bytes
                .chunks_exact(2)
                .map(|pair| convert([pair[0], pair[1]]))
                .collect(),
        )
    }
}

/// A version artifact that was rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedFile {
    pub path: PathBuf,
    /// Path relative to the unit's repository root, as VCS commands expect.
    pub repository_relative: PathBuf,
}

/// Substitutes a new version into each unit's version artifact.
#[derive(Debug, Clone)]
pub struct VersionStamper {
    file_name: String,
    pattern: Regex,
    replacement: String,
}

impl VersionStamper {
    /// # Errors
    ///
    /// Returns an error if the configured pattern is not a valid regex.
    pub fn new(config: &StampConfig) -> Result<Self> {
        Ok(Self {
            file_name: config.file_name.clone(),
            pattern: Regex::new(&config.pattern)?,
            replacement: config.replacement.clone(),
        })
    }

    /// Finds the unit's version artifact by its well-known file name.
    ///
    /// # Errors
    ///
    /// Returns an expectation failure when the unit has no such file.
    pub fn locate(&self, unit: &ProjectUnit) -> Result<PathBuf> {
        let mut matches: Vec<PathBuf> = WalkDir::new(unit.project_dir())
            .into_iter()
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !(entry.depth() > 0
                    && entry.file_type().is_dir()
                    && SKIPPED_DIRS.contains(&name.as_ref()))
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && entry.file_name() == self.file_name.as_str())
            .map(|entry| entry.into_path())
            .collect();

        matches.sort_by_key(|path| path.components().count());
        matches.into_iter().next().ok_or_else(|| {
            Error::expectation(format!(
                "Project {} does not contain a document named {}.",
                unit.name, self.file_name
            ))
        })
    }

    /// Rewrites the unit's version declaration to `version`.
    ///
    /// # Errors
    ///
    /// Fails when the artifact is missing, unreadable, or declares no version.
    pub fn stamp(&self, unit: &ProjectUnit, version: &str) -> Result<StampedFile> {
        let path = self.locate(unit)?;
        self.stamp_file(&path, version)?;

        info!("Updated {} version to {}.", unit.name, version);

        let repository_relative = path
            .strip_prefix(unit.repository.root())
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone());

        Ok(StampedFile {
            path,
            repository_relative,
        })
    }

    /// Rewrites one file in place, keeping its original encoding.
    pub fn stamp_file(&self, path: &Path, version: &str) -> Result<()> {
        let bytes = fs::read(path)?;
        let (encoding, text) = TextEncoding::decode(&bytes).map_err(|_| {
            Error::expectation(format!("{} is not valid UTF-8 or UTF-16 text.", path.display()))
        })?;

        if !self.pattern.is_match(&text) {
            return Err(Error::expectation(format!(
                "{} has no version declaration matching {}.",
                path.display(),
                self.pattern.as_str()
            )));
        }

        let declaration = self.replacement.replace("{version}", version);
        let updated = self.pattern.replace_all(&text, NoExpand(&declaration));

        fs::write(path, encoding.encode(&updated))?;
        Ok(())
    }
}
