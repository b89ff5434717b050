use thiserror::Error;

#[derive(Error, Debug)]
pub enum SigError {
    #[error("Unrecognized signature file header: {0:?}")]
    FormatMismatch(String),

    #[error("Malformed signature line {line}: {message}: {text}")]
    Malformed {
        line: usize,
        message: String,
        text: String,
    },

    #[error("Class not found: {0}")]
    ClassNotFound(String),

    #[error("Invalid class file for {class}: {message}")]
    ClassFormat { class: String, message: String },

    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("Invalid module block: {0}")]
    Xml(String),

    #[error("Writer does not support feature {0}")]
    UnsupportedFeature(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl SigError {
    pub fn malformed(line: usize, message: impl Into<String>, text: impl Into<String>) -> Self {
        SigError::Malformed {
            line,
            message: message.into(),
            text: text.into(),
        }
    }

    pub fn class_format(class: impl Into<String>, message: impl Into<String>) -> Self {
        SigError::ClassFormat {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Stamps a line number onto a `Malformed` error raised by the line grammar.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            SigError::Malformed { message, text, .. } => SigError::Malformed {
                line,
                message,
                text,
            },
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SigError::ClassNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, SigError>;
