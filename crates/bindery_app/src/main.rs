mod args;
mod input;
mod logging;
mod report;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bindery_engine::{
    archive_filename, default_archive_filename, load_cookie_file, FetchSettings, OutputDescriptor,
    Pipeline, ReqwestFetcher, RunError, SiteRules,
};
use clap::Parser;
use engine_logging::{engine_info, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::initialize(args.verbose, args.log_file.as_deref());

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let rules = match &args.rules {
        Some(path) => SiteRules::load(path)
            .with_context(|| format!("failed to load rules from {}", path.display()))?,
        None => SiteRules::default(),
    };
    if args.print_rules {
        println!("{}", rules.to_ron_string().context("failed to serialize rules")?);
        return Ok(ExitCode::SUCCESS);
    }

    let urls = input::collect_urls(&args.urls, args.urls_file.as_deref())?;
    if urls.is_empty() {
        bail!("no article URLs given (pass them as arguments or with --urls-file)");
    }

    let cookies = match &args.cookies {
        Some(path) => load_cookie_file(path, &rules.cookie_domain)
            .with_context(|| format!("failed to load cookies from {}", path.display()))?,
        None => Vec::new(),
    };
    if args.cookies.is_some() && cookies.is_empty() {
        engine_warn!("no cookies for {} in the cookie file; paywalled pages may be truncated", rules.cookie_domain);
    }

    let settings = FetchSettings {
        request_timeout: Duration::from_secs(args.timeout),
        request_delay: Duration::from_millis(args.delay_ms),
        cookies,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);

    let now = chrono::Local::now();
    let output = OutputDescriptor {
        dir: args.download_dir.clone(),
        filename: match &args.output {
            Some(name) => archive_filename(name),
            None => default_archive_filename(None, &now),
        },
        title: args
            .title
            .clone()
            .unwrap_or_else(|| format!("{} {}", rules.creator, now.format("%d.%m.%Y"))),
    };

    let pipeline = Pipeline::new(&fetcher, rules).context("invalid extraction rules")?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            engine_warn!("interrupt received; binding the articles finished so far");
            interrupt.cancel();
        }
    });

    engine_info!("binding {} article URL(s) into {}", urls.len(), output.filename);
    match pipeline.run(urls, &output, args.max_articles, &cancel).await {
        Ok(report) => {
            report::print_report(&report);
            Ok(if report.cancelled {
                ExitCode::from(130)
            } else {
                ExitCode::SUCCESS
            })
        }
        Err(RunError::EmptyArchive { failures }) => {
            report::print_failures(&failures);
            bail!("no article could be extracted; nothing was written")
        }
        Err(err) => Err(err).context("run failed"),
    }
}
