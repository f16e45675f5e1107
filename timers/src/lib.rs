//! Named, independently expiring countdown timers.
//!
//! - [`TimerRegistry`] owns the live timers and publishes [`TimerEvent`]s
//! - [`duration`] holds the `<int>h<int>m<int>s` grammar and countdown formatting
//! - [`BackingSlot`] mirrors a timer's absolute end time into externally persisted state

pub mod duration;
pub mod error;
pub mod registry;

pub use duration::{format_remaining, parse_duration};
pub use error::TimerError;
pub use registry::{BackingSlot, OnElapsed, SharedDeadlines, TimerEvent, TimerRegistry};
