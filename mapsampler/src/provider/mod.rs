//! Imagery source abstraction
//!
//! This module describes where tiles come from ([`TileSource`]) and how their
//! encoded bytes are retrieved ([`TileBytesFetcher`]).
//!
//! ```ignore
//! use mapsampler::provider::{HttpTileFetcher, ReqwestClient, TileSource};
//!
//! let source: TileSource = "tms:https://tile.example.org/{z}/{x}/{y}.png".parse()?;
//! let fetcher = HttpTileFetcher::new(ReqwestClient::new()?);
//! let bytes = fetcher.fetch_tile_bytes(&source, coord).await?;
//! ```

mod fetcher;
mod http;
mod source;
mod types;

pub use fetcher::HttpTileFetcher;
pub use http::{AsyncHttpClient, ReqwestClient, DEFAULT_HTTP_TIMEOUT_SECS};
pub use source::{mercator_bounds, SourceKind, TileSource, DEFAULT_TILE_SIZE, DEFAULT_WMS_TILE_SIZE};
pub use types::{BoxFuture, ProviderError, TileBytesFetcher};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
