use std::path::PathBuf;

use clap::Parser;
use confsync_core::Credentials;

use crate::driver::{Mode, SyncConfig};

/// Command line configuration for confsync.
#[derive(Parser, Debug, Clone)]
#[command(name = "confsync")]
#[command(about = "Push local config files to MongoDB, ArangoDB or Google Sheets, or pull them back")]
pub struct Config {
    /// Where configs live: `mongo`, `arango`, a MongoDB URL, an ArangoDB URL
    /// or a Google Sheets URL
    #[arg(short = 'f', long = "from", env = "CONFSYNC_FROM")]
    pub from: String,

    /// Collection (MongoDB, ArangoDB) or sheet (Google Sheets) name
    #[arg(short = 's', long, env = "CONFSYNC_SOURCE")]
    pub source: String,

    /// Local directory holding the config files
    #[arg(short = 'd', long = "dir", env = "CONFSYNC_DIR")]
    pub directory: PathBuf,

    /// Query passed through to the backend (currently unused)
    #[arg(short = 'q', long)]
    pub query: Option<String>,

    /// Push local files to the remote store instead of pulling
    #[arg(short = 'i', long)]
    pub init: bool,

    /// MongoDB connection URL
    #[arg(long, env = "MONGO_URL", hide_env_values = true)]
    pub mongo_url: Option<String>,

    /// ArangoDB URL; the path names the database
    #[arg(long, env = "ARANGO_URL", hide_env_values = true)]
    pub arango_url: Option<String>,

    /// Google service account key file (JSON)
    #[arg(long, env = "GOOGLE_SERVICE_ACCOUNT_FILE")]
    pub google_service_account_file: Option<PathBuf>,

    /// Google service account private key (PEM), used when no key file is found
    #[arg(long, env = "GOOGLE_PRIVATE_KEY", hide_env_values = true)]
    pub google_private_key: Option<String>,

    /// Google service account email, used with --google-private-key
    #[arg(long, env = "GOOGLE_SERVICE_ACCOUNT_EMAIL")]
    pub google_service_account_email: Option<String>,
}

impl Config {
    pub fn mode(&self) -> Mode {
        if self.init {
            Mode::Init
        } else {
            Mode::Pull
        }
    }

    /// Split into the driver's run description and the credential material.
    pub fn into_sync_config(self) -> (SyncConfig, Credentials) {
        let mode = self.mode();
        let credentials = Credentials {
            mongo_url: self.mongo_url,
            arango_url: self.arango_url,
            google_service_account_file: self.google_service_account_file,
            google_private_key: self.google_private_key,
            google_service_account_email: self.google_service_account_email,
        };

        let sync = SyncConfig {
            source_kind: self.from,
            source: self.source,
            directory: self.directory,
            mode,
            query: self.query,
        };
        (sync, credentials)
    }
}
