use thiserror::Error;

/// Everything that can go wrong across the IR, the evaluator, and the
/// codegen boundary.
///
/// Operations return the error unchanged to their caller; callers
/// short-circuit with `?` on the first failure. There are no panics on
/// ordinary errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("out of memory")]
    OutOfMemory,
    #[error("bad argument: {0}")]
    BadArgument(String),
    #[error("invalid module: {0}")]
    InvalidModule(String),
    #[error("invalid function reference")]
    InvalidFunction,
    #[error("invalid type: {0}")]
    InvalidType(String),
    #[error("invalid object format")]
    InvalidFormat,
    #[error("invalid architecture")]
    InvalidArchitecture,
    #[error("bad alignment")]
    BadAlignment,
    #[error("invalid section")]
    InvalidSection,
    #[error("section not found")]
    SectionNotFound,
    #[error("invalid symbol")]
    InvalidSymbol,
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),
    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
    #[error("unresolved symbol: {0}")]
    UnresolvedSymbol(String),
    #[error("invalid relocation")]
    InvalidRelocation,
    #[error("numeric overflow: {0}")]
    Overflow(String),
    #[error("i/o failure: {0}")]
    Io(String),
    #[error("division by zero")]
    DivideByZero,
    #[error("not implemented: {0}")]
    Unimplemented(&'static str),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
