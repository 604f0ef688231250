use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;

pub type JqResult<T> = std::result::Result<T, JacquardError>;

#[derive(Debug, Error)]
pub enum JacquardError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Regex(#[from] regex::Error),
    #[error(transparent)]
    ParseInt(#[from] ParseIntError),
    #[error(transparent)]
    ParseFloat(#[from] ParseFloatError),
    #[error("VCF file is missing its column header line: {file_name}")]
    MissingColumnHeader { file_name: String },
    #[error("VCF file has no metaheaders ('##' lines): {file_name}")]
    MissingMetaheaders { file_name: String },
    #[error("INFO field [{key}] already exists on record ({coordinate})")]
    DuplicateInfoField { key: String, coordinate: String },
    #[error("FORMAT tag [{tag}] already exists on record ({coordinate})")]
    DuplicateFormatTag { tag: String, coordinate: String },
    #[error(
        "Sample set mismatch adding FORMAT tag [{tag}] ({coordinate}): \
         expected samples {expected:?}, got {actual:?}"
    )]
    SampleMismatch {
        tag: String,
        coordinate: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error(
        "Unable to parse normal/tumor sample names from MuTect metaheader in {file_name}. \
         Is this a MuTect VCF?"
    )]
    UnparsableMutectHeader { file_name: String },
    #[error("Input file {file_name} is not sorted by coordinate ({coordinate}); sort it and retry")]
    UnsortedInput {
        file_name: String,
        coordinate: String,
    },
    #[error(
        "Inconsistent multi-allelic value lengths ({coordinate}): cannot aggregate {values:?}"
    )]
    InconsistentMultAltValues {
        coordinate: String,
        values: Vec<String>,
    },
    #[error("Cannot aggregate an empty set of values ({coordinate})")]
    EmptyAggregation { coordinate: String },
}

impl JacquardError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[macro_export]
macro_rules! jq_error {
    ($($arg:tt)*) => {
        $crate::error::JacquardError::message(format!($($arg)*))
    };
}
