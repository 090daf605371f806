pub mod error;
pub mod types;

pub use error::{Error, ParseError, Result};
pub use types::{Direction, MalformedNamePolicy, MigrationId};
