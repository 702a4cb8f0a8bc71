pub mod aggregate;
pub mod clock;
pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use aggregate::*;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppEnv, Config};
pub use error::IncidentError;
pub use source::*;
pub use types::*;
