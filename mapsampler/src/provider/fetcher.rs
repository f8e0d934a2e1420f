//! Network-backed tile byte fetcher.

use bytes::Bytes;
use tracing::trace;

use super::http::AsyncHttpClient;
use super::source::TileSource;
use super::types::{BoxFuture, ProviderError, TileBytesFetcher};
use crate::coord::TileCoord;

/// Fetches tile bytes by expanding the source's URL template and issuing a GET.
pub struct HttpTileFetcher<C: AsyncHttpClient> {
    client: C,
}

impl<C: AsyncHttpClient> HttpTileFetcher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: AsyncHttpClient> TileBytesFetcher for HttpTileFetcher<C> {
    fn fetch_tile_bytes<'a>(
        &'a self,
        source: &'a TileSource,
        coord: TileCoord,
    ) -> BoxFuture<'a, Result<Bytes, ProviderError>> {
        Box::pin(async move {
            let url = source.url_for(coord)?;
            trace!(source = source.name(), tile = %coord, url = %url, "Requesting tile");
            self.client.get(&url).await
        })
    }
}
