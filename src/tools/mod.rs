//! Tools exposed by the search gateway

mod dispatcher;
pub mod render;
mod web;

pub use dispatcher::{
    EXTRACT_WEBPAGE, ExtractParams, SEARCH_WEB, SEARCH_WEB_UI, SearchParams, ToolAnnotations,
    ToolDefinition, ToolDispatcher, ToolOutput,
};
pub use render::{RenderMode, RenderedPayload};
pub use web::{
    ExtractedPage, FetchedPage, HttpFetcher, PAGE_SIZE, SearchClient, SearchProvider,
    SearchRequest, SearchResult, TimePeriod, decode_body, extract_article, extract_plain,
};
