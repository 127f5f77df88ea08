pub mod discovery;
mod leases;
mod refresh;
mod service;
pub mod status;
#[cfg(test)]
mod testing;

pub use discovery::DiscoveryReport;
pub use leases::{TopicLease, TopicLeases};
pub use refresh::RefreshReport;
pub use service::{Scheduler, SchedulerEvent};
pub use status::is_due;
