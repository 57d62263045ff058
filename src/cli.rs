// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// clap is a popular Rust library for parsing command-line arguments.
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
// Two subcommands:
// - collect: traverse a IIIF collection and list manifests/collections
// - images:  turn one manifest's canvases into IIIF Image API URLs
// =============================================================================

use clap::{Args, Parser, Subcommand, ValueEnum};

// This struct represents our entire CLI application
//
// #[derive(Parser)] tells clap to automatically generate parsing code
// The #[command(...)] attributes configure how the CLI behaves
#[derive(Parser, Debug)]
#[command(
    name = "loam-iiif",
    version = "0.1.0",
    about = "Traverse IIIF collections and harvest manifest URLs",
    long_about = "loam-iiif walks a IIIF Presentation API collection (v2 or v3), following \
                  nested sub-collections and pagination, and reports every manifest and \
                  collection URL it finds. Fetches are retried, time-limited and cached on disk."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for collected results.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON object with "manifests" and "collections" arrays
    Json,
    /// JSON Lines: one {"manifest": ...} or {"collection": ...} per line
    Jsonl,
    /// Human-readable aligned table
    Table,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Traverse a IIIF collection and list every manifest and sub-collection
    ///
    /// Example: loam-iiif collect https://example.org/iiif/collection/top
    Collect {
        /// IIIF collection URL to start from
        url: String,

        /// File to save the results to (defaults to stdout)
        #[arg(long, short)]
        output: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Maximum number of manifests to retrieve (all if unset)
        #[arg(long, short)]
        max_manifests: Option<usize>,

        /// Download the full JSON body of each discovered manifest
        ///
        /// With --output, each manifest is written to that directory as its
        /// own .json file; otherwise the bodies just land in the cache.
        #[arg(long, short)]
        download_manifests: bool,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Print IIIF Image API URLs for every image in a manifest
    ///
    /// Example: loam-iiif images https://example.org/iiif/manifest/42 --width 1024
    Images {
        /// IIIF manifest URL
        url: String,

        /// Desired image width in pixels
        #[arg(long, default_value_t = 768)]
        width: u32,

        /// Desired image height in pixels
        #[arg(long, default_value_t = 2000)]
        height: u32,

        /// Image format extension (jpg, png, ...)
        #[arg(long, default_value = "jpg")]
        format: String,

        /// Request exact dimensions instead of best-fit within them
        #[arg(long)]
        exact: bool,

        /// Request the server's maximum size ('max' on v3, 'full' on v2)
        #[arg(long = "max")]
        use_max: bool,

        #[command(flatten)]
        fetch: FetchArgs,
    },
}

// Fetch/cache tuning shared by both subcommands
//
// #[command(flatten)] splices these flags into each subcommand, so we don't
// repeat ten fields in every Commands variant
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Directory to cache fetched JSON in (defaults to the system temp dir)
    #[arg(long, short)]
    pub cache_dir: Option<String>,

    /// Skip reading from the cache but still write to it
    #[arg(long)]
    pub skip_cache: bool,

    /// Disable caching completely
    #[arg(long)]
    pub no_cache: bool,

    /// Total fetch attempts per URL before giving up
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Backoff factor between attempts (delay = backoff * 2^(attempt-1))
    #[arg(long, default_value_t = 1.0)]
    pub backoff: f64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,

    /// Enable debug logging with detailed traversal output
    #[arg(long)]
    pub debug: bool,
}
