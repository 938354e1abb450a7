pub mod init;
pub mod status;
pub mod sync;

use anyhow::Context;
use specbridge_core::{
    config::{Config, EnvSnapshot},
    paths,
};
use std::path::{Path, PathBuf};

/// `--config` when given, else `<root>/.specbridge.yaml`.
pub fn config_file(root: &Path, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths::config_path(root))
}

/// Load the config with `${VAR}` placeholders resolved from the process env.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> anyhow::Result<Config> {
    let path = config_file(root, explicit);
    let env: EnvSnapshot = std::env::vars().collect();
    Config::load(&path, &env)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}
