use std::{error::Error as StdError, fmt, io};

/// A common error type.
#[derive(Debug, PartialEq)]
pub struct Error {
    description: String,
}

impl Error {
    /// Construct a new `Error` using the provided description.
    pub fn new<T: Into<String>>(description: T) -> Error {
        Error {
            description: description.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

impl StdError for Error {}

impl From<&str> for Error {
    fn from(cause: &str) -> Error {
        Error::new(cause)
    }
}

impl From<String> for Error {
    fn from(cause: String) -> Error {
        Error::new(cause)
    }
}

impl From<io::Error> for Error {
    fn from(cause: io::Error) -> Error {
        Error::new(format!("{}", cause))
    }
}

/// A common result type.
pub type Result<T> = std::result::Result<T, Error>;
