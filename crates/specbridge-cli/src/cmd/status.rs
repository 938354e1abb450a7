use crate::output::{print_json, Printer};
use anyhow::Context;
use serde::Serialize;
use specbridge_core::{
    config::{Config, PlatformConfig},
    state::{LastRun, SyncState},
};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Serialize)]
struct TargetView {
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    repository: String,
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_level: Option<&'static str>,
}

impl TargetView {
    fn from_config(config: &Config) -> Vec<Self> {
        config
            .targets
            .iter()
            .map(|t| TargetView {
                name: t.name.clone(),
                kind: t.platform.type_name(),
                repository: match &t.platform {
                    PlatformConfig::Github(gh) => gh.slug(),
                },
                enabled: t.enabled,
                sync_level: t.sync_level.map(|l| l.as_str()),
            })
            .collect()
    }
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    synced_count: usize,
    items: &'a BTreeMap<String, String>,
    last_run: Option<&'a LastRun>,
    targets: Option<&'a [TargetView]>,
}

pub fn run(root: &Path, config: Option<&Path>, printer: &Printer) -> anyhow::Result<()> {
    let state = SyncState::load(root);
    let last_run = LastRun::load(root).context("failed to read last-run file")?;

    let config_path = super::config_file(root, config);
    let targets = if config_path.exists() {
        match super::load_config(root, Some(config_path.as_path())) {
            Ok(cfg) => Some(TargetView::from_config(&cfg)),
            Err(e) => {
                printer.warn(format!("{e:#}"));
                None
            }
        }
    } else {
        None
    };

    if printer.json {
        return print_json(&StatusOutput {
            synced_count: state.synced_count(),
            items: state.all(),
            last_run: last_run.as_ref(),
            targets: targets.as_deref(),
        });
    }

    printer.info("SpecBridge sync status\n");

    if state.synced_count() == 0 {
        printer.info("No items have been synced yet.");
        printer.info("Run `specbridge sync` to start syncing.");
    } else {
        printer.success(format!("Total synced items: {}", state.synced_count()));
        if printer.verbose {
            let rows = state
                .all()
                .iter()
                .map(|(item, remote)| vec![item.clone(), format!("#{remote}")])
                .collect();
            printer.info("");
            printer.table(&["ITEM", "ISSUE"], rows);
        }
    }

    if let Some(run) = &last_run {
        printer.info(format!(
            "\nLast run: {} (scope: {}{})",
            run.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
            run.scope,
            if run.dry_run { ", dry run" } else { "" },
        ));
        for t in &run.targets {
            printer.info(format!(
                "  {}: {} created, {} updated, {} failed",
                t.name, t.created, t.updated, t.failed
            ));
        }
        if run.total_failed() > 0 {
            printer.warn(format!(
                "last run had {} failed item(s)",
                run.total_failed()
            ));
        }
    }

    if let Some(targets) = &targets {
        printer.info("\nConfigured targets:");
        let verbose = printer.verbose;
        let mut headers = vec!["NAME", "TYPE", "REPOSITORY", "ENABLED"];
        if verbose {
            headers.push("SYNC LEVEL");
        }
        let rows = targets
            .iter()
            .map(|t| {
                let mut row = vec![
                    t.name.clone(),
                    t.kind.to_string(),
                    t.repository.clone(),
                    if t.enabled { "yes" } else { "no" }.to_string(),
                ];
                if verbose {
                    row.push(t.sync_level.unwrap_or("full").to_string());
                }
                row
            })
            .collect();
        printer.table(&headers, rows);
    }

    if state.synced_count() > 0 {
        printer.info("\nRun `specbridge sync` to update synced items.");
    }
    Ok(())
}
