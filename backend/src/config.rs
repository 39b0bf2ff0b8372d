//! Server configuration from command-line flags or `CMS_*` environment variables.

use crate::store::{AssetDir, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PUBLIC_PREFIX};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "cms-backend", version, about = "Article CMS backend")]
pub struct Config {
    /// Address to bind.
    #[arg(long, env = "CMS_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "CMS_PORT", default_value_t = 3001)]
    pub port: u16,

    /// JSON document holding every article.
    #[arg(long, env = "CMS_DATA_FILE", default_value = "db.json")]
    pub data_file: PathBuf,

    /// Directory for uploaded images, served under the public prefix.
    #[arg(long, env = "CMS_UPLOADS_DIR", default_value = "public/uploads")]
    pub uploads_dir: PathBuf,

    /// URL prefix under which uploads are served and referenced.
    #[arg(long, env = "CMS_PUBLIC_PREFIX", default_value = DEFAULT_PUBLIC_PREFIX)]
    pub public_prefix: String,

    #[arg(long, env = "CMS_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Seconds between orphaned-image sweeps; 0 disables them.
    #[arg(long, env = "CMS_SWEEP_INTERVAL_SECS", default_value_t = 0)]
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    pub fn asset_dir(&self) -> AssetDir {
        AssetDir::new(&self.uploads_dir, self.max_upload_bytes)
            .with_public_prefix(&self.public_prefix)
    }
}
