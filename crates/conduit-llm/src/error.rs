use thiserror::Error;

/// Error while turning a client request into a backend prompt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("messages must not be empty")]
    EmptyMessages,

    #[error("request contains no text content")]
    NoTextContent,

    #[error("unsupported role: {0}")]
    UnsupportedRole(String),
}

pub type Result<T> = std::result::Result<T, ConversionError>;
