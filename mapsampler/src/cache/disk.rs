//! On-disk cache of raw tile bytes.
//!
//! Wraps any [`TileBytesFetcher`] and stores successful responses under
//! `<root>/<source>/<zoom>/<x>/<y>.tile`, so repeated runs over the same
//! area do not hit the network again. Failures are never cached.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{trace, warn};

use crate::coord::TileCoord;
use crate::provider::{BoxFuture, ProviderError, TileBytesFetcher, TileSource};

/// Decorator adding a disk cache in front of another fetcher.
pub struct DiskCachedFetcher<F: TileBytesFetcher> {
    inner: F,
    root: PathBuf,
}

impl<F: TileBytesFetcher> DiskCachedFetcher<F> {
    pub fn new(inner: F, root: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of a tile inside the cache directory.
    pub fn tile_path(&self, source: &TileSource, coord: TileCoord) -> PathBuf {
        self.root
            .join(sanitize(source.name()))
            .join(coord.zoom.to_string())
            .join(coord.x.to_string())
            .join(format!("{}.tile", coord.y))
    }
}

impl<F: TileBytesFetcher> TileBytesFetcher for DiskCachedFetcher<F> {
    fn fetch_tile_bytes<'a>(
        &'a self,
        source: &'a TileSource,
        coord: TileCoord,
    ) -> BoxFuture<'a, Result<Bytes, ProviderError>> {
        Box::pin(async move {
            let path = self.tile_path(source, coord);

            match tokio::fs::read(&path).await {
                Ok(data) if !data.is_empty() => {
                    trace!(path = %path.display(), "Disk cache hit");
                    return Ok(Bytes::from(data));
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read cached tile");
                }
            }

            let bytes = self.inner.fetch_tile_bytes(source, coord).await?;

            if let Err(e) = write_tile(&path, &bytes).await {
                // The tile itself is fine; only caching failed
                warn!(path = %path.display(), error = %e, "Failed to write cached tile");
            }

            Ok(bytes)
        })
    }
}

async fn write_tile(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    // Write-then-rename so readers never see a partial file
    let tmp = path.with_extension("tile.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
