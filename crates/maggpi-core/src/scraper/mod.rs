pub mod extract;
pub mod fetcher;
pub mod validate;

pub use fetcher::{ContentFetcher, FetchBatch, HttpLoader, Page, PageLoader, ScrapedContent};
pub use validate::{host_of, validate_url};
