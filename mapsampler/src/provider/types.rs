//! Core types for tile byte providers.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use super::source::TileSource;
use crate::coord::TileCoord;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors that can occur while retrieving raw tile bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, body read).
    HttpError(String),
    /// The server answered with a non-success status.
    HttpStatus { status: u16, url: String },
    /// The server has no imagery for the requested tile.
    NoImagery(String),
    /// Zoom level outside what the source publishes.
    UnsupportedZoom(u8),
    /// Malformed tile source definition or URL template.
    InvalidSource(String),
    /// Local storage failure in a caching layer.
    Storage(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::HttpStatus { status, url } => {
                write!(f, "HTTP {} from {}", status, url)
            }
            ProviderError::NoImagery(what) => write!(f, "No imagery available: {}", what),
            ProviderError::UnsupportedZoom(zoom) => write!(f, "Unsupported zoom level: {}", zoom),
            ProviderError::InvalidSource(msg) => write!(f, "Invalid tile source: {}", msg),
            ProviderError::Storage(msg) => write!(f, "Tile storage error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// True when the server explicitly reported that no tile exists.
    pub fn is_no_imagery(&self) -> bool {
        matches!(self, ProviderError::NoImagery(_))
    }
}

/// Byte-level tile retrieval.
///
/// Implementations turn a tile coordinate of a given source into encoded
/// image bytes. They may be backed by HTTP, a disk cache or an in-memory
/// fixture. Decoding happens further up, in the tile fetcher.
pub trait TileBytesFetcher: Send + Sync {
    /// Fetches the encoded image bytes for one tile.
    fn fetch_tile_bytes<'a>(
        &'a self,
        source: &'a TileSource,
        coord: TileCoord,
    ) -> BoxFuture<'a, Result<Bytes, ProviderError>>;
}

impl<T: TileBytesFetcher + ?Sized> TileBytesFetcher for std::sync::Arc<T> {
    fn fetch_tile_bytes<'a>(
        &'a self,
        source: &'a TileSource,
        coord: TileCoord,
    ) -> BoxFuture<'a, Result<Bytes, ProviderError>> {
        (**self).fetch_tile_bytes(source, coord)
    }
}
