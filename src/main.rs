// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (warnings by default, everything with --debug)
// 3. Dispatch to the appropriate subcommand handler
// 4. Render results as JSON, JSON Lines or a table
// 5. Exit with proper code (0 = success, 1 = error)
//
// Fetch failures during a traversal are warnings, not errors: a run that
// could not reach some sub-collections still reports everything it found
// and exits 0.
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli; // src/cli.rs   - command-line parsing
mod fetch; // src/fetch/ - retrying fetcher + on-disk cache
mod iiif; // src/iiif/   - document classification + traversal + image URLs

use std::fs;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, FetchArgs, OutputFormat};
use fetch::{Cache, CacheMode, Fetcher, RetryPolicy};
use iiif::{collect, manifest_image_urls, ImageRequest, TraversalOutcome, TraverseOptions};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Collect {
            url,
            output,
            format,
            max_manifests,
            download_manifests,
            fetch,
        } => {
            init_logging(fetch.debug);
            handle_collect(
                &url,
                output.as_deref(),
                format,
                max_manifests,
                download_manifests,
                &fetch,
            )
            .await
        }
        Commands::Images {
            url,
            width,
            height,
            format,
            exact,
            use_max,
            fetch,
        } => {
            init_logging(fetch.debug);
            let request = ImageRequest {
                width,
                height,
                format,
                exact,
                use_max,
            };
            handle_images(&url, &request, &fetch).await
        }
    }
}

// Logging goes to stderr so stdout stays clean for the actual results
// (pipe `loam-iiif collect ... | jq` and nothing else gets in the way)
fn init_logging(debug: bool) {
    let default_filter = if debug { "loam_iiif=debug" } else { "loam_iiif=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

// Builds the fetch layer (policy -> fetcher -> cache) from the CLI flags.
// All configuration is explicit here; nothing reads process-wide defaults
// at fetch time.
fn build_fetch_stack(args: &FetchArgs) -> Result<(Fetcher, Cache)> {
    let policy = RetryPolicy {
        retry_total: args.retries.max(1),
        backoff_factor: args.backoff,
        timeout: Duration::from_secs(args.timeout),
    };
    let fetcher = Fetcher::new(policy)?;

    let mode = if args.no_cache {
        CacheMode::Disabled
    } else if args.skip_cache {
        CacheMode::SkipRead
    } else {
        CacheMode::Normal
    };
    let dir = args
        .cache_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_cache_dir);

    Ok((fetcher, Cache::new(dir, mode)))
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("loam-iiif")
}

// Handles the 'collect' subcommand
async fn handle_collect(
    url: &str,
    output: Option<&str>,
    format: OutputFormat,
    max_manifests: Option<usize>,
    download_manifests: bool,
    fetch_args: &FetchArgs,
) -> Result<i32> {
    let (fetcher, cache) = build_fetch_stack(fetch_args)?;
    let opts = TraverseOptions { max_manifests };

    let outcome = collect(url, &cache, &fetcher, &opts).await?;

    // Per-URL failures are surfaced as warnings, never as a failed run
    for failure in &outcome.failures {
        eprintln!(
            "Warning: skipped {} ({}: {})",
            failure.url,
            failure.error.kind(),
            failure.error
        );
    }

    if download_manifests && !fetch_args.no_cache {
        // With --output, manifests land as individual files in that
        // directory and we are done; without it they just fill the cache
        let dir = output.map(Path::new);
        download_all_manifests(&outcome, &cache, &fetcher, dir).await?;
        if dir.is_some() {
            return Ok(0);
        }
    }

    let rendered = render_results(&outcome, format);
    match output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("failed to write results to {}", path))?,
        None => print!("{}", rendered),
    }

    Ok(0)
}

// Handles the 'images' subcommand: fetch one manifest, print one image URL
// per line
async fn handle_images(url: &str, request: &ImageRequest, fetch_args: &FetchArgs) -> Result<i32> {
    url::Url::parse(url).with_context(|| format!("invalid manifest URL '{}'", url))?;

    let (fetcher, cache) = build_fetch_stack(fetch_args)?;
    let doc = cache.get_or_fetch(url, &fetcher).await?;

    let urls = manifest_image_urls(&doc.json, request);
    if urls.is_empty() {
        eprintln!("Warning: no image resources found in {}", url);
    }
    for image_url in urls {
        println!("{}", image_url);
    }

    Ok(0)
}

// Fetches every discovered manifest body (populating the cache), optionally
// writing each one to its own file under `dir`
async fn download_all_manifests(
    outcome: &TraversalOutcome,
    cache: &Cache,
    fetcher: &Fetcher,
    dir: Option<&Path>,
) -> Result<()> {
    if let Some(dir) = dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    }

    let total = outcome.manifests.len();
    for (idx, manifest_url) in outcome.manifests.iter().enumerate() {
        match cache.get_or_fetch(manifest_url, fetcher).await {
            Ok(doc) => {
                if let Some(dir) = dir {
                    let name = manifest_url.rsplit('/').next().unwrap_or(manifest_url);
                    let path = dir.join(format!("{}.json", sanitize_filename(name)));
                    fs::write(&path, &doc.raw)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                }
                tracing::debug!(manifest = %manifest_url, "processed manifest {}/{}", idx + 1, total);
            }
            Err(e) => {
                eprintln!("Warning: failed to download manifest {}: {}", manifest_url, e);
            }
        }
    }
    Ok(())
}

// Keeps alphanumerics, hyphens, underscores and dots; everything else
// becomes an underscore
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// Renders the outcome in the requested format, returning the full text so
// the same rendering goes to stdout or to --output files
fn render_results(outcome: &TraversalOutcome, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let result = json!({
                "manifests": outcome.manifests,
                "collections": outcome.collections,
            });
            // Pretty JSON with a trailing newline
            let mut text = serde_json::to_string_pretty(&result).unwrap_or_default();
            text.push('\n');
            text
        }
        OutputFormat::Jsonl => {
            let mut text = String::new();
            for manifest in &outcome.manifests {
                text.push_str(&json!({"manifest": manifest}).to_string());
                text.push('\n');
            }
            for collection in &outcome.collections {
                text.push_str(&json!({"collection": collection}).to_string());
                text.push('\n');
            }
            text
        }
        OutputFormat::Table => render_table(outcome),
    }
}

// Renders results as human-readable aligned tables with a summary
fn render_table(outcome: &TraversalOutcome) -> String {
    let mut text = String::new();

    if !outcome.manifests.is_empty() {
        render_section(&mut text, "Manifests", &outcome.manifests);
    }
    if !outcome.collections.is_empty() {
        render_section(&mut text, "Collections", &outcome.collections);
    }

    text.push_str("Summary:\n");
    let _ = writeln!(text, "   Manifests:   {}", outcome.manifests.len());
    // The seed itself is always listed, so "nested" is everything after it
    let _ = writeln!(
        text,
        "   Collections: {} ({} nested)",
        outcome.collections.len(),
        outcome.collections.len().saturating_sub(1)
    );
    let _ = writeln!(text, "   Failures:    {}", outcome.failures.len());

    text
}

fn render_section(text: &mut String, title: &str, urls: &[String]) {
    let _ = writeln!(text, "{}", title);
    let _ = writeln!(text, "{}", "=".repeat(72));
    for (idx, url) in urls.iter().enumerate() {
        let _ = writeln!(text, "{:>5}  {}", idx + 1, url);
    }
    text.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome() -> TraversalOutcome {
        TraversalOutcome {
            manifests: vec![
                "https://example.org/m1".to_string(),
                "https://example.org/m2".to_string(),
            ],
            collections: vec!["https://example.org/top".to_string()],
            failures: vec![],
        }
    }

    #[test]
    fn test_json_output_shape() {
        let text = render_results(&outcome(), OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["manifests"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["collections"][0], "https://example.org/top");
    }

    #[test]
    fn test_jsonl_output_one_record_per_line() {
        let text = render_results(&outcome(), OutputFormat::Jsonl);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], r#"{"manifest":"https://example.org/m1"}"#);
        assert_eq!(lines[2], r#"{"collection":"https://example.org/top"}"#);
    }

    #[test]
    fn test_table_output_has_summary() {
        let text = render_results(&outcome(), OutputFormat::Table);
        assert!(text.contains("Manifests"));
        assert!(text.contains("https://example.org/m1"));
        assert!(text.contains("Collections: 1 (0 nested)"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename("manifest.json?version=2"),
            "manifest.json_version_2"
        );
        assert_eq!(sanitize_filename("plain-name_1.json"), "plain-name_1.json");
    }
}
