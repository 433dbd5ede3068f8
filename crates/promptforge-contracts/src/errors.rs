use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Every way a single generation run can fail.
///
/// All variants are terminal for the invocation; nothing here is retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("missing file for declared image `{declared}` ({origin}); supplied {supplied} file(s)")]
    MissingFile {
        declared: String,
        origin: String,
        supplied: usize,
    },

    #[error("unreadable image {}: {reason}", path.display())]
    UnreadableImage { path: PathBuf, reason: String },

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("write error: {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    MissingFile,
    UnreadableImage,
    Authentication,
    Upstream,
    Transport,
    Write,
}

/// Who has to act to get past an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Input,
    Credentials,
    Retryable,
    Environment,
}

impl PipelineError {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema(_) => ErrorKind::Schema,
            Self::MissingFile { .. } => ErrorKind::MissingFile,
            Self::UnreadableImage { .. } => ErrorKind::UnreadableImage,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Write { .. } => ErrorKind::Write,
        }
    }

    pub fn class(&self) -> ErrorClass {
        self.kind().class()
    }
}

impl ErrorKind {
    pub fn class(self) -> ErrorClass {
        match self {
            Self::Schema | Self::MissingFile | Self::UnreadableImage => ErrorClass::Input,
            Self::Authentication => ErrorClass::Credentials,
            Self::Upstream | Self::Transport => ErrorClass::Retryable,
            Self::Write => ErrorClass::Environment,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "SchemaError",
            Self::MissingFile => "MissingFileError",
            Self::UnreadableImage => "UnreadableImageError",
            Self::Authentication => "AuthenticationError",
            Self::Upstream => "UpstreamError",
            Self::Transport => "TransportError",
            Self::Write => "WriteError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorClass {
    pub fn hint(self) -> &'static str {
        match self {
            Self::Input => "fix the prompt document or the supplied images",
            Self::Credentials => "set GEMINI_API_KEY in .env or the environment",
            Self::Retryable => "try again later or rephrase the prompt",
            Self::Environment => "check permissions and free space of the output directory",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{ErrorClass, ErrorKind, PipelineError};

    #[test]
    fn kinds_map_to_remediation_classes() {
        assert_eq!(
            PipelineError::schema("bad ratio").class(),
            ErrorClass::Input
        );
        assert_eq!(
            PipelineError::MissingFile {
                declared: "a.png".to_string(),
                origin: "input_image".to_string(),
                supplied: 0,
            }
            .class(),
            ErrorClass::Input
        );
        assert_eq!(
            PipelineError::Authentication("no key".to_string()).class(),
            ErrorClass::Credentials
        );
        assert_eq!(
            PipelineError::Transport("timeout".to_string()).class(),
            ErrorClass::Retryable
        );
        assert_eq!(
            PipelineError::Upstream("blocked".to_string()).class(),
            ErrorClass::Retryable
        );
        let write = PipelineError::Write {
            path: PathBuf::from("/nope/out.png"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(write.kind(), ErrorKind::Write);
        assert_eq!(write.class(), ErrorClass::Environment);
    }

    #[test]
    fn messages_carry_context() {
        let err = PipelineError::MissingFile {
            declared: "face.png".to_string(),
            origin: "reference_images[1]".to_string(),
            supplied: 1,
        };
        let text = err.to_string();
        assert!(text.contains("face.png"));
        assert!(text.contains("reference_images[1]"));
        assert_eq!(err.kind().to_string(), "MissingFileError");
    }
}
