//! Security utilities.
//!
//! Currently credential scrubbing for recorded failure messages.

pub mod credential_scrubber;

pub use credential_scrubber::{contains_credentials, scrub_credentials};
