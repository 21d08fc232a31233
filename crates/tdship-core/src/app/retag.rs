//! File retag - rewrite a task definition JSON file with a new image tag.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;

use crate::domain::{ImageTag, SanitizeError, TaskDefinition, strip_envelope};

/// RetagFileError carries the path of the file that could not be read,
/// parsed, sanitized or written.
#[derive(Debug, Error)]
pub enum RetagFileError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: {source}", .path.display())]
    Sanitize {
        path: PathBuf,
        #[source]
        source: SanitizeError,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Read `input`, sanitize and retag it, and write the clean document to
/// `output` (which may be the same path).
///
/// The input may be a `describe-task-definition` response (with the
/// `taskDefinition` envelope) or a bare document, e.g. a file this function
/// wrote earlier. The output never has the envelope.
#[tracing::instrument(skip_all, fields(input = %input.display(), tag = %tag))]
pub fn retag_file(input: &Path, output: &Path, tag: &ImageTag) -> Result<TaskDefinition, RetagFileError> {
    let contents = fs::read(input).map_err(|source| RetagFileError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    let raw: Value = serde_json::from_slice(&contents).map_err(|source| RetagFileError::Parse {
        path: input.to_path_buf(),
        source,
    })?;

    let definition =
        TaskDefinition::sanitize(strip_envelope(&raw), tag).map_err(|source| RetagFileError::Sanitize {
            path: input.to_path_buf(),
            source,
        })?;

    let rendered = render(&definition).map_err(|source| RetagFileError::Write {
        path: output.to_path_buf(),
        source: source.into(),
    })?;
    fs::write(output, rendered).map_err(|source| RetagFileError::Write {
        path: output.to_path_buf(),
        source,
    })?;

    tracing::info!(
        output = %output.display(),
        family = %definition.family,
        containers = definition.container_definitions.len(),
        "task definition rewritten"
    );
    Ok(definition)
}

/// Pretty JSON with 4-space indentation and a trailing newline.
pub fn render(definition: &TaskDefinition) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    definition.serialize(&mut ser)?;
    buf.push(b'\n');
    // serde_json only emits UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
