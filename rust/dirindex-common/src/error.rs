use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_format(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn not_implemented(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::NotImplemented {
                message: message.into(),
            }
            .into(),
        )
    }

    /// A single attribute value could not be normalized by `rule`.
    pub fn normalization_failure(rule: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::NormalizationFailure {
                rule: rule.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    /// A record in an intermediate merge stream is malformed.
    pub fn corrupt_intermediate(
        source_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Error {
        Error(
            ErrorKind::CorruptIntermediateData {
                source_name: source_name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    /// An encoded entry ID set has an inconsistent byte layout.
    pub fn malformed_encoding(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::MalformedEncoding {
                message: message.into(),
            }
            .into(),
        )
    }

    /// Wraps a failure reported by the persistent index store.
    pub fn store<E>(context: impl Into<String>, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error(
            ErrorKind::Store {
                context: context.into(),
                source: Box::new(source),
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    pub fn is_normalization_failure(&self) -> bool {
        matches!(self.kind(), ErrorKind::NormalizationFailure { .. })
    }

    pub fn is_corrupt_intermediate_data(&self) -> bool {
        matches!(self.kind(), ErrorKind::CorruptIntermediateData { .. })
    }

    pub fn is_malformed_encoding(&self) -> bool {
        matches!(self.kind(), ErrorKind::MalformedEncoding { .. })
    }

    pub fn is_store_failure(&self) -> bool {
        matches!(self.kind(), ErrorKind::Store { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("not yet implemented: {message}")]
    NotImplemented { message: String },

    #[error("invalid format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("value rejected by matching rule '{rule}': {message}")]
    NormalizationFailure { rule: String, message: String },

    #[error("corrupt intermediate data in '{source_name}': {message}")]
    CorruptIntermediateData {
        source_name: String,
        message: String,
    },

    #[error("malformed entry ID set encoding: {message}")]
    MalformedEncoding { message: String },

    #[error("index store failure: {context}")]
    Store {
        context: String,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}
