//! Reading `Requires-Dist` out of wheel archives.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::environment::TargetEnvironment;
use crate::core::marker;
use crate::core::specifier::{Requirement, Specifier};
use crate::metadata::DependencyReader;

/// Error reading wheel metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to open {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a readable wheel archive", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{} has no .dist-info/METADATA entry", .path.display())]
    Missing { path: PathBuf },

    #[error("failed to read metadata from {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Core metadata fields of a wheel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WheelMetadata {
    pub name: Option<String>,
    pub version: Option<String>,
    /// Raw `Requires-Dist` values in file order.
    pub requires_dist: Vec<String>,
}

impl WheelMetadata {
    /// Parse the header block of a METADATA file.
    pub fn parse(text: &str) -> Self {
        let mut headers: Vec<(String, String)> = Vec::new();
        for line in text.lines() {
            if line.is_empty() {
                break;
            }
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                headers.push((key.trim().to_string(), value.trim().to_string()));
            }
        }

        let mut metadata = WheelMetadata::default();
        for (key, value) in headers {
            match key.to_ascii_lowercase().as_str() {
                "name" => metadata.name = Some(value),
                "version" => metadata.version = Some(value),
                "requires-dist" => metadata.requires_dist.push(value),
                _ => {}
            }
        }
        metadata
    }
}

fn is_metadata_entry(name: &str) -> bool {
    let mut parts = name.split('/');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(dir), Some("METADATA"), None) if dir.ends_with(".dist-info")
    )
}

/// Read the metadata of a wheel file.
pub fn read_metadata(path: &Path) -> Result<WheelMetadata, MetadataError> {
    let file = File::open(path).map_err(|source| MetadataError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|source| MetadataError::Archive {
            path: path.to_path_buf(),
            source,
        })?;

    let entry_name = archive
        .file_names()
        .filter(|name| is_metadata_entry(name))
        .min()
        .map(str::to_string)
        .ok_or_else(|| MetadataError::Missing {
            path: path.to_path_buf(),
        })?;

    let mut entry = archive
        .by_name(&entry_name)
        .map_err(|source| MetadataError::Archive {
            path: path.to_path_buf(),
            source,
        })?;
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|source| MetadataError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(WheelMetadata::parse(&text))
}

/// Reads wheel dependencies applicable to a target environment.
#[derive(Debug, Clone)]
pub struct WheelMetadataReader {
    env: TargetEnvironment,
}

impl WheelMetadataReader {
    pub fn new(env: TargetEnvironment) -> Self {
        WheelMetadataReader { env }
    }

    /// Keep the requirements whose marker holds for the target.
    pub fn applicable(&self, requires_dist: &[String]) -> Vec<Specifier> {
        let mut kept = Vec::new();
        for raw in requires_dist {
            match Requirement::parse(raw) {
                Ok(req) => match req.marker.as_deref() {
                    None => kept.push(Specifier::new(raw.as_str())),
                    Some(condition) => match marker::evaluate(condition, &self.env) {
                        Ok(true) => kept.push(Specifier::new(raw.as_str())),
                        Ok(false) => debug!("not applicable to target: {}", raw),
                        Err(e) => debug!("ignoring `{}`: {}", raw, e),
                    },
                },
                // A malformed requirement is only usable if nothing conditions it.
                Err(e) if raw.contains(';') => debug!("ignoring `{}`: {}", raw, e),
                Err(e) => {
                    debug!("keeping unparsed requirement `{}`: {}", raw, e);
                    kept.push(Specifier::new(raw.as_str()));
                }
            }
        }
        kept
    }
}

impl DependencyReader for WheelMetadataReader {
    fn dependencies(&self, artifact: &Path) -> Vec<Specifier> {
        match read_metadata(artifact) {
            Ok(metadata) => self.applicable(&metadata.requires_dist),
            Err(e) => {
                warn!("{}", e);
                Vec::new()
            }
        }
    }
}
