//! Static serving of uploaded images under their public prefix.

use crate::store::AssetDir;
use actix_files::Files;

/// Serves the uploads directory at the prefix used in article `image` references.
pub fn configure_files(assets: &AssetDir) -> Files {
    Files::new(assets.public_prefix(), assets.root()).use_etag(true)
}
