use derive_more::Display;

#[derive(Debug, Display, derive_more::Error)]
pub enum Error {
    #[display("unsupported construct: {_0}")]
    Unsupported(#[error(not(source))] String),
    #[display("invariant violated after {pass}: {message}")]
    Invariant {
        pass: &'static str,
        message: String,
    },
    #[display("entry point `{_0}` does not name a top-level function")]
    UnknownEntryPoint(#[error(not(source))] String),
}

impl Error {
    pub fn invariant(pass: &'static str, message: impl Into<String>) -> Self {
        Error::Invariant {
            pass,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
