pub mod cli;
pub mod db;
pub mod setting;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
