//! `modplan watch` command: re-evaluate a plan file whenever it changes.
//!
//! The file is polled for modification; each new version is submitted to the
//! background revalidator, and every published evaluation is printed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use modplan_core::catalog::Catalog;
use modplan_core::plan::Plan;
use modplan_core::revalidate::{self, RevalidatorConfig, RevalidatorHandle};

use crate::config::ModplanConfig;
use crate::load::{self, ProgrammeArgs};

pub async fn run_watch(
    config: &ModplanConfig,
    plan_path: PathBuf,
    current: String,
    programme: ProgrammeArgs,
    poll: Duration,
) -> Result<()> {
    let catalog: Arc<dyn Catalog> = Arc::new(load::read_catalog(&config.catalog_path)?);
    let (meta, plan) = load::read_plan(&plan_path, catalog.as_ref())?;
    let programme = programme.or_meta(&meta);
    let categories = Arc::new(load::categories_for(&config.requirements_path, &programme)?);

    // Set up graceful shutdown: first signal cancels, second force-exits.
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let got_first_signal = Arc::new(AtomicBool::new(false));
    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_signal.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nStopping watch (Ctrl+C again to force)...");
            cancel_clone.cancel();
        }
    });

    let (handle, worker) = revalidate::spawn(
        Arc::clone(&catalog),
        categories,
        RevalidatorConfig {
            quiet_window: config.quiet_window,
        },
        cancel.clone(),
    );
    let printer = tokio::spawn(print_published(handle.clone()));

    println!(
        "Watching {} (Ctrl+C to stop)...",
        plan_path.display()
    );

    let mut last_modified = modified(&plan_path);
    submit(&handle, plan, &current)?;

    let mut ticker = tokio::time::interval(poll);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }

        let now = modified(&plan_path);
        if now == last_modified {
            continue;
        }
        last_modified = now;

        match load::read_plan(&plan_path, catalog.as_ref()) {
            Ok((_, plan)) => {
                if let Err(e) = submit(&handle, plan, &current) {
                    tracing::warn!(error = %format!("{e:#}"), "could not submit plan");
                    break;
                }
            }
            Err(e) => {
                eprintln!("{e:#}");
                tracing::warn!(path = %plan_path.display(), "plan file is invalid, waiting for the next change");
            }
        }
    }

    tracing::debug!("watch loop finished");
    handle.shutdown();
    worker.await.context("revalidator task failed")?;
    printer.await.context("printer task failed")?;
    Ok(())
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn submit(handle: &RevalidatorHandle, plan: Plan, current: &str) -> Result<()> {
    let semester = load::parse_current(current, plan.start_year)?;
    let version = handle.submit(plan, semester)?;
    tracing::debug!(version, current = %semester, "submitted plan");
    Ok(())
}

/// Print every evaluation the revalidator publishes until it stops.
async fn print_published(handle: RevalidatorHandle) {
    let mut rx = handle.subscribe();
    drop(handle);

    while rx.changed().await.is_ok() {
        let Some(published) = rx.borrow_and_update().clone() else {
            continue;
        };
        println!("--- plan version {} ---", published.version);
        println!("{} violation(s)", published.evaluation.violations.len());
        for (code, v) in &published.evaluation.violations {
            let mut problems = Vec::new();
            if !v.missing_prerequisites.is_empty() {
                problems.push(format!("missing {}", v.missing_prerequisites.join(", ")));
            }
            if let Some(offering) = &v.offering_violation {
                problems.push(offering.clone());
            }
            if !v.missing_corequisites.is_empty() {
                problems.push(format!("corequisites {}", v.missing_corequisites.join(", ")));
            }
            if !v.precluded_by.is_empty() {
                problems.push(format!("precluded by {}", v.precluded_by.join(", ")));
            }
            println!("  {code:<10} {}", problems.join("; "));
        }
        let p = &published.evaluation.progress;
        println!(
            "Progress: {} completed, {} in progress, {} planned",
            p.completed_credits.normalize(),
            p.current_credits.normalize(),
            p.planned_credits.normalize()
        );
        println!();
    }
}
