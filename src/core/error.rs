// Error handling for the RHD reader

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RhdError>;

#[derive(Error, Debug)]
pub enum RhdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Not an RHD file, or a field whose value the format does not allow.
    #[error("Format error at byte {offset}: {reason}")]
    Format { offset: u64, reason: String },

    /// An RHD file that ends early: mid-table in the header or mid-block in the body.
    #[error("Truncated input at byte {offset} while reading {context}")]
    Truncated { offset: u64, context: String },

    #[error("Channel metadata mismatch in {group}: header declares {declared}, table holds {found}")]
    ChannelMetadata {
        group: String,
        declared: usize,
        found: usize,
    },

    #[error("Invalid options: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Index {index} out of range for container of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Cannot resolve lazy item {key}: {reason}")]
    Unresolvable { key: String, reason: String },
}

impl RhdError {
    pub fn format(offset: u64, reason: impl Into<String>) -> Self {
        RhdError::Format {
            offset,
            reason: reason.into(),
        }
    }

    pub fn truncated(offset: u64, context: impl Into<String>) -> Self {
        RhdError::Truncated {
            offset,
            context: context.into(),
        }
    }

    /// True when the input is not (a supported version of) the RHD format.
    pub fn is_format_error(&self) -> bool {
        matches!(self, RhdError::Format { .. })
    }

    /// True when the input is RHD but damaged or cut short.
    pub fn is_truncated(&self) -> bool {
        matches!(self, RhdError::Truncated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_and_truncated_are_distinguishable() {
        let fmt = RhdError::format(0, "bad magic");
        let trunc = RhdError::truncated(12, "notes");
        assert!(fmt.is_format_error() && !fmt.is_truncated());
        assert!(trunc.is_truncated() && !trunc.is_format_error());
        assert_eq!(
            trunc.to_string(),
            "Truncated input at byte 12 while reading notes"
        );
    }
}
