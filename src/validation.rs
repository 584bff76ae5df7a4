use std::fs::File;
use std::io;
use std::path::Path;

use thiserror::Error;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Reasons an inbound file is rejected before processing starts
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Filename is empty. Please provide filename.")]
    MissingFileName,

    #[error("MaxInboundFileSizeMb has not been set in the config. Please provide a valid configuration value.")]
    MissingSizeLimit,

    #[error("Inbound file {0} could not be located. Please ensure that the file exists and is correctly named.")]
    NotFound(String),

    #[error("Inbound file {0} is not a regular file.")]
    NotAFile(String),

    #[error("Inbound file exists but is empty. Please check the file and verify that it is complete.")]
    Empty,

    #[error("Inbound file exceeds size limit of {limit} bytes. Please use a smaller file.")]
    TooLarge { limit: u64, size: u64 },

    #[error("Inbound file {0} was found but is not readable. Please ensure that the file has correct permission.")]
    NotReadable(String),

    #[error("Inbound file {path} could not be inspected: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Check that the inbound file exists, is non-empty, within the size limit
/// and readable. Returns the file size in bytes.
pub fn validate_input_file(path: &Path, max_inbound_file_size_mb: u64) -> Result<u64, ValidationError> {
    let display = path.display().to_string();
    if display.is_empty() {
        return Err(ValidationError::MissingFileName);
    }
    if max_inbound_file_size_mb == 0 {
        return Err(ValidationError::MissingSizeLimit);
    }

    let metadata = match path.metadata() {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ValidationError::NotFound(display))
        }
        Err(source) => return Err(ValidationError::Io { path: display, source }),
    };
    if !metadata.is_file() {
        return Err(ValidationError::NotAFile(display));
    }

    let size = metadata.len();
    if size == 0 {
        return Err(ValidationError::Empty);
    }

    let limit = max_inbound_file_size_mb.saturating_mul(BYTES_PER_MB);
    if size > limit {
        return Err(ValidationError::TooLarge { limit, size });
    }

    match File::open(path) {
        Ok(_) => Ok(size),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            Err(ValidationError::NotReadable(display))
        }
        Err(source) => Err(ValidationError::Io { path: display, source }),
    }
}
