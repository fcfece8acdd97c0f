//! # AlgoPulse Core
//!
//! Shared vocabulary for every AlgoPulse crate: configuration, the error
//! taxonomy, domain types, and the three collaborator traits the dispatch
//! pipeline is written against.
//!
//! ```text
//! PulseConfig ──► Provider (generation)   pulse-providers
//!             ──► Mailer   (delivery)     pulse-channels
//!             ──► Store    (documents)    pulse-store
//!                     ▲
//!                     └── pulse-dispatch (bank, grouper, coordinator)
//! ```

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::PulseConfig;
pub use error::{PulseError, Result};
pub use traits::{Mailer, Provider, Store};
pub use types::{
    Bucket, Difficulty, Item, Mode, Solution, Subscriber, SubscriberDefaults, SubscriberStatus,
};
