pub mod error;
pub mod identifiers;
pub mod ports;
pub mod references;
pub mod testimony;
pub mod timestamps;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;
