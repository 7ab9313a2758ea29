//! Web tools for HTTP operations

mod fetch;
mod readability;
mod search;

pub use fetch::{FetchedPage, HttpFetcher, decode_body};
pub use readability::{ExtractedPage, extract_article, extract_plain};
pub use search::{PAGE_SIZE, SearchClient, SearchProvider, SearchRequest, SearchResult, TimePeriod};
