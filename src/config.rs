//! CLI arguments and compiled-in defaults.

use clap::{Args, Parser, Subcommand};
use shadow_rs::formatcp;
use std::path::PathBuf;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    "{} ({} {})",
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME
);

/// Lifetime of an issued presigned PUT URL.
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 5 * 60;
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5050";

/// Acceptance policy defaults, applied client-side at drop time.
pub const MAX_BATCH_FILES: usize = 5;
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
pub const MIN_FILE_SIZE: u64 = 1;

pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Parser, Debug)]
#[command(
    name = "drop-gate",
    version = VERSION_INFO,
    about = "Presigned upload gateway for object storage"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gateway server.
    Serve(ServeArgs),
    /// Upload files through a running gateway.
    Upload(UploadArgs),
    /// Delete an uploaded object by its storage key.
    Rm(RmArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(
        short = 'b',
        long,
        env = "DROPGATE_BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "DROPGATE_PORT",
        default_value_t = 5050,
        help = "HTTP port"
    )]
    pub port: u16,
    #[arg(long, env = "DROPGATE_S3_BUCKET", help = "Object storage bucket name")]
    pub bucket: String,
    #[arg(
        long,
        env = "DROPGATE_S3_REGION",
        default_value = "us-east-1",
        help = "Object storage region"
    )]
    pub region: String,
    #[arg(
        long,
        env = "DROPGATE_S3_ENDPOINT",
        help = "Custom S3-compatible endpoint URL"
    )]
    pub endpoint: Option<String>,
    #[arg(
        long,
        env = "DROPGATE_S3_ACCESS_KEY",
        help = "Static access key id (defaults to the ambient AWS credential chain)"
    )]
    pub access_key: Option<String>,
    #[arg(
        long,
        env = "DROPGATE_S3_SECRET_KEY",
        help = "Static secret access key"
    )]
    pub secret_key: Option<String>,
    #[arg(
        long,
        env = "DROPGATE_PRESIGN_TTL_SECS",
        default_value_t = DEFAULT_PRESIGN_TTL_SECS,
        help = "Presigned URL lifetime in seconds"
    )]
    pub presign_ttl_secs: u64,
    #[arg(
        long,
        env = "DROPGATE_CORS_ORIGINS",
        help = "Comma separated CORS origins"
    )]
    pub cors_origins: Option<String>,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Files to upload.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    #[arg(
        long,
        env = "DROPGATE_API",
        default_value = DEFAULT_API_BASE,
        help = "Gateway base URL"
    )]
    pub api: String,
}

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Storage key of the object to delete.
    pub key: String,
    #[arg(
        long,
        env = "DROPGATE_API",
        default_value = DEFAULT_API_BASE,
        help = "Gateway base URL"
    )]
    pub api: String,
}
