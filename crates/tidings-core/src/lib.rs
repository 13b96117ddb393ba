//! Tidings Core — domain models, repository traits, and shared error
//! types used by the auth and push crates.

pub mod clock;
pub mod error;
pub mod memory;
pub mod models;
pub mod repository;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{TidingsError, TidingsResult};
