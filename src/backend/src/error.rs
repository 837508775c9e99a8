use derive_more::Display;

#[derive(Debug, Display, derive_more::Error)]
pub enum Error {
    #[display("unsupported construct: {_0}")]
    Unsupported(#[error(not(source))] String),
    #[display("invariant violated in code generation: {_0}")]
    Invariant(#[error(not(source))] String),
    #[display("malformed Cairo: {_0}")]
    Parse(#[error(not(source))] String),
}

pub type Result<T> = std::result::Result<T, Error>;
