//! API handlers organized by resource.

mod certificates;
mod jobs;
mod processed_events;
mod validation;

pub use certificates::*;
pub use jobs::*;
pub use processed_events::*;
pub use validation::*;
