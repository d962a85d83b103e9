//! # Scout Core
//!
//! Data model and pure logic for Eden Scout, the Magic Eden wallet checker.
//!
//! This crate owns everything that does not touch the network: turning chat
//! text into wallet identifiers, mapping loosely shaped marketplace JSON into
//! strict entities, filtering those entities and assembling a [`WalletReport`].

pub mod classifier;
pub mod error;
pub mod filters;
pub mod models;
pub mod normalize;
pub mod report;

pub use classifier::{classify, classify_single, classify_text};
pub use error::*;
pub use models::*;
