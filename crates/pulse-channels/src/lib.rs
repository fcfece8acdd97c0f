//! # AlgoPulse Channels
//! Outbound delivery channels.

pub mod email;

pub use email::{EmailChannel, LogMailer};
