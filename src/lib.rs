pub mod error;
pub mod protocol;
pub mod transport;


pub type Result<T> = std::result::Result<T, error::Error>;
