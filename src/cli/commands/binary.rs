//! Binary command - resolve dependencies to a local k6 binary

use crate::cli::args::{BinaryArgs, BinaryFormat};
use crate::config::{Config, Overrides};
use crate::deps::Dependencies;
use crate::error::ProviderResult;
use crate::provider::{K6Binary, Provider};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::debug;

/// Execute the binary command
pub async fn execute(
    args: BinaryArgs,
    config: &Config,
    bin_dir: Option<PathBuf>,
) -> ProviderResult<()> {
    let deps = Dependencies::parse_all(&args.deps)?;
    for dep in deps.iter() {
        debug!("Requested {}", dep);
    }

    let overrides = Overrides {
        platform: args.platform,
        bin_dir,
        build_service_url: args.build_service_url,
        download_proxy_url: args.download_proxy_url,
        verify_checksum: args.verify_checksum,
    };
    let resolved = config.resolve(&overrides);
    debug!("Resolved provider config: {:?}", resolved);

    let provider = Provider::new(resolved)?;

    let pb = create_progress_bar(&format!(
        "Resolving k6 binary for {}...",
        provider.platform()
    ));
    let result = provider.get_binary(&deps).await;
    pb.finish_and_clear();

    print_binary(&result?, args.format)
}

fn print_binary(binary: &K6Binary, format: BinaryFormat) -> ProviderResult<()> {
    match format {
        BinaryFormat::Path => println!("{}", binary.path.display()),
        BinaryFormat::Json => println!("{}", serde_json::to_string_pretty(binary)?),
        BinaryFormat::Text => {
            println!("{}", binary.path.display());
            for (name, version) in &binary.dependencies {
                println!("  {} {} {}", style("•").cyan(), name, style(version).dim());
            }
            if !binary.checksum.is_empty() {
                println!("  checksum: {}", binary.checksum);
            }
        }
    }
    Ok(())
}

fn create_progress_bar(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
