pub mod ai;
pub mod config;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod scraper;
pub mod seed;
pub mod storage;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use scheduler::{Scheduler, SchedulerEvent};
