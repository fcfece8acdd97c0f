//! Collaborator traits. Each external system the pipeline talks to sits
//! behind one of these so dispatch logic never names a concrete backend.

pub mod mailer;
pub mod provider;
pub mod store;

pub use mailer::{Mailer, OutgoingEmail};
pub use provider::{CompletionRequest, Provider};
pub use store::{Fields, Filter, Record, Store};
