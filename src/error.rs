/// Module containing the error types for Riffers
use thiserror::Error;

use crate::fourcc::FourCC;

pub type RiffResult<T> = Result<T, RiffError>;

/// Error types for Riffers
#[derive(Error, Debug)]
pub enum RiffError {
    #[error("Invalid parameter: {0}")]
    ParameterError(String),
    #[error("I/O error: {0}")]
    IOError(String),
    #[error("IO error with file")]
    FileError(#[from] std::io::Error),
    #[error("The operation was cancelled")]
    OperationCancelled,
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
    #[error("Deserialize error: {0}")]
    DeserializeError(String),
    #[error("Deserializer for {0} is already registered")]
    DeserializerExists(FourCC),
    #[error("Deserializer for {0} is not registered")]
    DeserializerNotExists(FourCC),
    #[error("Invalid index: {0}")]
    InvalidIndex(usize),
}

/// The broad category of a [`RiffError`].
///
/// Only [`ErrorKind::Deserialize`] is ever recovered from inside the crate: the
/// child resolution loop treats it as "this deserializer declined" and moves on
/// to the next candidate. Every other kind aborts the current call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parameter,
    IO,
    OperationCancelled,
    InvalidOperation,
    Serialize,
    Deserialize,
    DeserializerRegistry,
    InvalidIndex,
}

impl RiffError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RiffError::ParameterError(_) => ErrorKind::Parameter,
            RiffError::IOError(_) | RiffError::FileError(_) => ErrorKind::IO,
            RiffError::OperationCancelled => ErrorKind::OperationCancelled,
            RiffError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            RiffError::SerializeError(_) => ErrorKind::Serialize,
            RiffError::DeserializeError(_) => ErrorKind::Deserialize,
            RiffError::DeserializerExists(_) | RiffError::DeserializerNotExists(_) => {
                ErrorKind::DeserializerRegistry
            }
            RiffError::InvalidIndex(_) => ErrorKind::InvalidIndex,
        }
    }

    #[inline(always)]
    pub fn is_deserialize(&self) -> bool {
        self.kind() == ErrorKind::Deserialize
    }

    #[inline(always)]
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::OperationCancelled
    }
}
