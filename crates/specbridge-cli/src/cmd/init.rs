use crate::output::{print_json, Printer};
use anyhow::Context;
use serde::Serialize;
use specbridge_core::{config::DEFAULT_CONFIG_YAML, io, paths};
use std::path::Path;

#[derive(Serialize)]
struct InitOutput {
    config: String,
    written: bool,
    gitignore_hint: bool,
}

pub fn run(root: &Path, config: Option<&Path>, force: bool, printer: &Printer) -> anyhow::Result<()> {
    let config_path = super::config_file(root, config);
    let display = config_path
        .strip_prefix(root)
        .unwrap_or(&config_path)
        .display()
        .to_string();

    if config_path.exists() && !force {
        printer.warn(format!("{display} already exists; use --force to overwrite"));
        if printer.json {
            print_json(&InitOutput {
                config: display,
                written: false,
                gitignore_hint: false,
            })?;
        }
        return Ok(());
    }

    io::atomic_write(&config_path, DEFAULT_CONFIG_YAML.as_bytes())
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    printer.success(format!("created: {display}"));

    let ignore_entry = format!("{}/", paths::STATE_DIR);
    let gitignore_hint = !io::gitignore_has_entry(root, &ignore_entry).unwrap_or(false);
    if gitignore_hint {
        printer.info(format!(
            "\nAdd {ignore_entry} to .gitignore to keep sync state out of version control:"
        ));
        printer.info(format!("  echo \"{ignore_entry}\" >> .gitignore"));
    }

    printer.info("\nNext steps:");
    printer.info(format!("  1. Edit {display} to point at your repository"));
    printer.info("  2. Export GITHUB_TOKEN (or set authMethod: gh-cli)");
    printer.info("  3. Run: specbridge sync --dry-run");

    if printer.json {
        print_json(&InitOutput {
            config: display,
            written: true,
            gitignore_hint,
        })?;
    }
    Ok(())
}
