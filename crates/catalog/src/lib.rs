//! Client for the catalog Web API.
//!
//! Every request carries the bearer token the client was built with. Rate
//! limited requests (429) are retried within a bounded budget; any other
//! non-2xx response is logged and handed back to the caller as data.

pub mod client;
pub mod error;
pub mod library;
pub mod models;
pub mod search;

pub use {
    client::{ApiClient, ApiRequest, ApiResponse, RetryPolicy},
    error::{Error, Result},
    library::LibraryResource,
    models::{AlbumObject, ArtistObject, Page, SearchResponse, TrackObject},
    search::{SearchQuery, SearchType},
};
