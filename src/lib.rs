//! Search Gateway - web search and webpage extraction tools over MCP
//!
//! This library provides the core functionality of the gateway:
//! - Web search through a configurable provider (Serper, Brave)
//! - Webpage fetching with SSRF protection and readable-text extraction
//! - Plain and interactive rendering of search results
//! - Bearer token authentication of tool calls
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Transports                        │
//! │        HTTP (POST /mcp, GET /health)  │  stdio       │
//! └────────────────────┬────────────────────────────────┘
//!                      │ JSON-RPC 2.0 / MCP
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Tool Dispatcher                      │
//! │   Auth Gate  │  Validation  │  Result Renderer       │
//! └──────────┬─────────────────────────┬────────────────┘
//!            │                         │
//! ┌──────────▼──────────┐   ┌──────────▼────────────────┐
//! │   Search Client     │   │ HTTP Fetcher + Extractor  │
//! │   Serper │ Brave    │   │   arbitrary webpages      │
//! └─────────────────────┘   └───────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod rpc;
pub mod security;
pub mod tools;

pub use config::Config;
pub use error::{Error, Result};
pub use tools::{
    ExtractedPage, HttpFetcher, SearchClient, SearchProvider, SearchRequest, SearchResult,
    ToolDispatcher,
};
