//! Account lookups over a tabular account source.
//!
//! Records come from an [`AccountSource`] (JSON file, HTTP endpoint, or
//! memory) and are answered in-process by [`AccountTable`].

pub mod backend;
pub mod query;
pub mod record;
pub mod source;

pub use backend::AccountBackend;
pub use query::{AccountAnswer, AccountQuery, AccountTable};
pub use record::AccountRecord;
pub use source::{AccountSource, HttpAccountSource, InMemoryAccountSource, JsonFileAccountSource};
