use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use rfv_store::{FsObjectStore, ObjectStore};
use rfv_types::{KeyPrefix, RelativePath};
use rfv_verify::{
    CancellationToken, ObjectLister, PathEnumerator, RepositoryVerifier, VerificationReport,
    Verdict,
};
use tracing::info;

use crate::cli::*;
use crate::settings::Settings;

/// Run one subcommand. `Ok(false)` means verification completed and failed.
pub async fn run_command(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Command::Verify(args) => cmd_verify(args, &cli.format).await,
        Command::ListLocal(args) => cmd_list_local(args, &cli.format),
        Command::ListRemote(args) => cmd_list_remote(args, &cli.format).await,
    }
}

fn open_store(settings: &Settings, remote: &RemoteArgs) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let root = settings.store_root(remote)?;
    let mut store = FsObjectStore::new(root);
    if let Some(page_size) = settings.verify.page_size {
        store = store.with_page_size(page_size);
    }
    Ok(Arc::new(store))
}

/// Cancel on Ctrl-C, or once `timeout` elapses.
fn cancellation(timeout: Option<Duration>) -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, cancelling verification");
            on_signal.cancel();
        }
    });
    if let Some(timeout) = timeout {
        let on_timeout = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            info!(?timeout, "timeout reached, cancelling verification");
            on_timeout.cancel();
        });
    }
    cancel
}

async fn cmd_verify(args: VerifyArgs, format: &OutputFormat) -> anyhow::Result<bool> {
    let mut settings = Settings::resolve(&args.filter)?;
    if let Some(algorithm) = args.algorithm {
        settings.verify.algorithm = algorithm;
    }
    if let Some(concurrency) = args.concurrency {
        settings.verify.concurrency = concurrency;
    }
    if args.page_size.is_some() {
        settings.verify.page_size = args.page_size;
    }

    let store = open_store(&settings, &args.remote)?;
    let verifier = RepositoryVerifier::new(store, settings.verify)?;
    let prefix = KeyPrefix::new(args.remote.prefix.as_str());
    let cancel = cancellation(args.timeout.map(Duration::from_secs));

    let report = verifier
        .verify_with_cancellation(&args.local, &args.remote.bucket, &prefix, cancel)
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    Ok(report.is_success())
}

fn print_report(report: &VerificationReport) {
    print!("{report}");
    match report.verdict() {
        Verdict::Pass => println!("{} Remote copy matches the local repository", "✓".green().bold()),
        Verdict::Fail => println!(
            "{} {} mismatch(es) found",
            "✗".red().bold(),
            report.mismatch_count().to_string().bold()
        ),
    }
}

fn print_paths<'a>(
    paths: impl IntoIterator<Item = &'a RelativePath>,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let paths: Vec<&RelativePath> = paths.into_iter().collect();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&paths)?),
        OutputFormat::Text => {
            for path in &paths {
                println!("{path}");
            }
            eprintln!("{} {} files", "total:".dimmed(), paths.len());
        }
    }
    Ok(())
}

fn cmd_list_local(args: ListLocalArgs, format: &OutputFormat) -> anyhow::Result<bool> {
    let settings = Settings::resolve(&args.filter)?;
    let paths = PathEnumerator::new(&args.root, &settings.verify.exclusions)?
        .collect_set()
        .with_context(|| format!("enumerating {}", args.root.display()))?;
    print_paths(&paths, format)?;
    Ok(true)
}

async fn cmd_list_remote(args: ListRemoteArgs, format: &OutputFormat) -> anyhow::Result<bool> {
    let settings = Settings::resolve(&args.filter)?;
    let store = open_store(&settings, &args.remote)?;
    let prefix = KeyPrefix::new(args.remote.prefix.as_str());
    let paths = ObjectLister::new(store)
        .with_page_size(settings.verify.page_size)
        .list(&args.remote.bucket, &prefix, &settings.verify.exclusions)
        .await?;
    print_paths(&paths, format)?;
    Ok(true)
}
