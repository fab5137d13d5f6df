//! Packaging captured slices into the final artifact

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use log::debug;
use sha2::{Digest, Sha256};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::{Error, Result};

/// One captured slice, named and encoded
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSlice {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Final output of an export: a lone image or a zip of all slices
#[derive(Debug, Clone, PartialEq)]
pub enum ExportArtifact {
    Single(ExportSlice),
    Archive {
        filename: String,
        data: Vec<u8>,
        /// Slice filenames in plan order
        entries: Vec<String>,
    },
}

impl ExportArtifact {
    pub fn filename(&self) -> &str {
        match self {
            ExportArtifact::Single(slice) => &slice.filename,
            ExportArtifact::Archive { filename, .. } => filename,
        }
    }

    pub fn data(&self) -> &[u8] {
        match self {
            ExportArtifact::Single(slice) => &slice.data,
            ExportArtifact::Archive { data, .. } => data,
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, ExportArtifact::Archive { .. })
    }

    /// Names of the images inside the artifact
    pub fn entries(&self) -> Vec<&str> {
        match self {
            ExportArtifact::Single(slice) => vec![slice.filename.as_str()],
            ExportArtifact::Archive { entries, .. } => entries.iter().map(String::as_str).collect(),
        }
    }

    /// Hex SHA-256 of the artifact bytes
    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(self.data()))
    }

    /// Write the artifact into `dir` (created if missing) and return its path.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.filename());
        std::fs::write(&path, self.data())?;
        Ok(path)
    }
}

/// One slice is returned as is; several are zipped into `{base_name}.zip`.
pub fn package(mut slices: Vec<ExportSlice>, base_name: &str) -> Result<ExportArtifact> {
    match slices.len() {
        0 => Err(Error::PackagingFailure("no slices to package".into())),
        1 => Ok(ExportArtifact::Single(slices.remove(0))),
        n => {
            let data = build_zip(&slices)?;
            debug!("packed {} slices into {}.zip ({} bytes)", n, base_name, data.len());
            Ok(ExportArtifact::Archive {
                filename: format!("{}.zip", base_name),
                data,
                entries: slices.into_iter().map(|s| s.filename).collect(),
            })
        }
    }
}

fn build_zip(slices: &[ExportSlice]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    // fixed timestamp so identical slices give identical archives
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for slice in slices {
        zip.start_file(slice.filename.as_str(), options)?;
        zip.write_all(&slice.data)
            .map_err(|e| Error::PackagingFailure(format!("failed to write {}: {}", slice.filename, e)))?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}
