use crate::output::{print_json, Printer};
use anyhow::{bail, Context};
use chrono::Utc;
use serde::Serialize;
use specbridge_core::{
    engine::{SyncEngine, SyncOptions, TargetResult},
    model::EpicStatus,
    source::KiroAdapter,
    state::{LastRun, SyncState, TargetSummary},
    target::{build_target, TargetAdapter},
    types::SyncScope,
};
use std::path::Path;
use tracing::debug;

pub struct SyncArgs {
    pub scope: SyncScope,
    pub id: Option<String>,
    pub dry_run: bool,
}

#[derive(Clone, Copy, Serialize)]
struct Totals {
    created: usize,
    updated: usize,
    failed: usize,
}

#[derive(Serialize)]
struct SyncOutput<'a> {
    dry_run: bool,
    scope: SyncScope,
    targets: &'a [TargetSummary],
    totals: Totals,
    #[serde(skip_serializing_if = "Option::is_none")]
    epic: Option<&'a EpicStatus>,
    results: &'a [TargetResult],
}

pub fn run(
    root: &Path,
    config: Option<&Path>,
    args: &SyncArgs,
    printer: &Printer,
) -> anyhow::Result<()> {
    if args.scope == SyncScope::Single && args.id.is_none() {
        bail!("--scope single requires --id <item id>");
    }

    let config = super::load_config(root, config)?;
    for disabled in config.targets.iter().filter(|t| !t.enabled) {
        debug!(target_name = %disabled.name, "skipping disabled target");
    }
    let mut targets: Vec<Box<dyn TargetAdapter>> =
        config.enabled_targets().map(build_target).collect();
    if targets.is_empty() {
        bail!("no enabled targets in configuration");
    }

    let source = KiroAdapter::new();
    let source_path = config.source.resolve_path(root);
    let opts = SyncOptions {
        scope: Some(args.scope),
        item_id: args.id.clone(),
        dry_run: args.dry_run,
    };

    if args.dry_run {
        printer.info("Dry run: no target will be contacted.");
    }
    let mut engine = SyncEngine::new();
    let results = engine
        .sync(&source, &source_path, &mut targets, &opts)
        .context("sync failed")?;

    let summaries = summarize(&results);
    let totals = Totals {
        created: summaries.iter().map(|s| s.created).sum(),
        updated: summaries.iter().map(|s| s.updated).sum(),
        failed: summaries.iter().map(|s| s.failed).sum(),
    };
    let status = engine.status();

    report(printer, &summaries, &results, &totals, status.epic.as_ref());

    if !args.dry_run {
        let recorded = record_remote_ids(root, &results)?;
        debug!(recorded, "sync state updated");
    }
    LastRun {
        finished_at: status.last_sync.unwrap_or_else(Utc::now),
        scope: args.scope,
        dry_run: args.dry_run,
        targets: summaries.clone(),
    }
    .save(root)
    .context("failed to write last-run file")?;

    if printer.json {
        print_json(&SyncOutput {
            dry_run: args.dry_run,
            scope: args.scope,
            targets: &summaries,
            totals,
            epic: status.epic.as_ref(),
            results: &results,
        })?;
    }

    if totals.failed > 0 {
        bail!("{} item(s) failed to sync", totals.failed);
    }
    Ok(())
}

/// Fold per-kind results into one summary per target, in target order.
fn summarize(results: &[TargetResult]) -> Vec<TargetSummary> {
    let mut summaries: Vec<TargetSummary> = Vec::new();
    for r in results {
        let idx = match summaries.iter().position(|s| s.name == r.target) {
            Some(idx) => idx,
            None => {
                summaries.push(TargetSummary {
                    name: r.target.clone(),
                    created: 0,
                    updated: 0,
                    failed: 0,
                });
                summaries.len() - 1
            }
        };
        let summary = &mut summaries[idx];
        summary.created += r.result.created;
        summary.updated += r.result.updated;
        summary.failed += r.result.failed;
    }
    summaries
}

fn report(
    printer: &Printer,
    summaries: &[TargetSummary],
    results: &[TargetResult],
    totals: &Totals,
    epic: Option<&EpicStatus>,
) {
    if let Some(epic) = epic {
        printer.detail(format!(
            "epic progress: {}% ({}/{} done, {} in progress)",
            epic.progress, epic.completed, epic.total, epic.in_progress
        ));
    }

    for summary in summaries {
        printer.info(format!("\n{}:", summary.name));
        printer.info(format!("  created: {}", summary.created));
        printer.info(format!("  updated: {}", summary.updated));
        printer.info(format!("  failed:  {}", summary.failed));

        for r in results.iter().filter(|r| r.target == summary.name) {
            for err in &r.result.errors {
                printer.warn(format!("{}: {err}", summary.name));
            }
            for change in &r.result.changes {
                let remote = change
                    .remote_id
                    .as_deref()
                    .map(|id| format!(" (#{id})"))
                    .unwrap_or_default();
                printer.detail(format!(
                    "{} {} {}{remote}",
                    change.action, change.item_type, change.item_id
                ));
                for field in &change.changes {
                    printer.detail(format!(
                        "    {}: {} -> {}",
                        field.field,
                        field.old_value.as_deref().unwrap_or("-"),
                        field.new_value.as_deref().unwrap_or("-"),
                    ));
                }
            }
        }
    }

    printer.info(format!(
        "\nTotal: {} created, {} updated, {} failed",
        totals.created, totals.updated, totals.failed
    ));
}

/// Store the remote id of every synced item. Returns how many were written.
fn record_remote_ids(root: &Path, results: &[TargetResult]) -> anyhow::Result<usize> {
    let mut state = SyncState::load(root);
    let mut recorded = 0;
    for change in results.iter().flat_map(|r| &r.result.changes) {
        if let Some(remote_id) = &change.remote_id {
            state.set_sync_id(change.item_id.clone(), remote_id.clone());
            recorded += 1;
        }
    }
    state
        .save()
        .with_context(|| format!("failed to write {}", state.path().display()))?;
    Ok(recorded)
}
