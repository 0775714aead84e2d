use super::ConfigStorage;
use crate::error::{Error, Result};
use crate::names::validate_name;
use crate::types::ConfigDocument;
use camino::{Utf8Path, Utf8PathBuf};
use serde_yaml_ng::Mapping;
use std::fs;
use std::io::ErrorKind;
use tracing::debug;

/// Extension of document files
const FILE_EXTENSION: &str = "yml";

/// Directory storage with one `<name>.yml` file per document
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: Utf8PathBuf,
}

impl FileStorage {
    /// Create a storage over `dir`; the directory is created on first write
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Path of the file holding `name`
    pub fn file_path(&self, name: &str) -> Utf8PathBuf {
        self.dir.join(format!("{}.{}", name, FILE_EXTENSION))
    }

    /// Path of `name`, refusing names that would resolve outside `dir`
    ///
    /// Reads stay lenient about the other name rules so that badly named
    /// files can still be listed, read and reported by validation.
    fn checked_path(&self, name: &str) -> Result<Utf8PathBuf> {
        if name.is_empty() {
            return Err(Error::invalid_name(name, "name is empty"));
        }
        if let Some(c) = name.chars().find(|c| matches!(c, '/' | '\\')) {
            return Err(Error::invalid_name(
                name,
                format!("name contains the illegal character '{}'", c),
            ));
        }
        Ok(self.file_path(name))
    }
}

impl ConfigStorage for FileStorage {
    fn label(&self) -> String {
        format!("file:{}", self.dir)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.checked_path(name)?.is_file())
    }

    fn read(&self, name: &str) -> Result<ConfigDocument> {
        let path = self.checked_path(name)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::not_found(name)
            } else {
                Error::Io(e)
            }
        })?;
        ConfigDocument::from_yaml(name, &content)
    }

    fn write(&self, name: &str, data: &Mapping) -> Result<()> {
        validate_name(name)?;
        fs::create_dir_all(&self.dir)?;

        let content = serde_yaml_ng::to_string(data)?;
        let path = self.file_path(name);
        let temp_path = self.dir.join(format!(".{}.{}.tmp", name, FILE_EXTENSION));

        fs::write(&temp_path, content).map_err(|e| Error::write(name, e.to_string()))?;
        fs::rename(&temp_path, &path).map_err(|e| Error::write(name, e.to_string()))?;

        debug!("Wrote {}", path);
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        fs::remove_file(self.checked_path(name)?).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::not_found(name)
            } else {
                Error::write(name, e.to_string())
            }
        })
    }

    fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let suffix = format!(".{}", FILE_EXTENSION);
        let mut names = Vec::new();
        for entry in self.dir.read_dir_utf8()? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if file_name.starts_with('.') {
                continue;
            }
            if let Some(name) = file_name.strip_suffix(&suffix) {
                if name.starts_with(prefix) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
