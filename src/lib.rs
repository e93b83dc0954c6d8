// docdelta - Invertible change model for structured documents

pub mod change;
pub mod config;
pub mod document;
pub mod history;
pub mod store;

pub use change::{Change, ChangeError, Operation};
pub use config::DocDeltaConfig;
pub use document::{Document, DocumentError};
pub use history::ChangeHistory;
