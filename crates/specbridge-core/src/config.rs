use crate::error::{Result, SpecBridgeError};
use crate::paths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Environment variables visible to `${VAR}` substitution. Callers build it
/// explicitly (usually from `std::env::vars()`).
pub type EnvSnapshot = HashMap<String, String>;

pub const DEFAULT_CONFIG_YAML: &str = r#"# SpecBridge configuration
#
# Configures how specs are synced to project management platforms.

version: "1.0"

# Where to read specs from
source:
  type: kiro
  path: .kiro/specs

# Where to sync specs to
targets:
  - name: github-issues
    type: github
    enabled: true
    config:
      owner: your-org
      repo: your-repo
      token: ${GITHUB_TOKEN}
      authMethod: token  # token | gh-cli
      addComments: true  # comment on issues when title or assignee change
    # Requirements and tasks always become issues; these two entries are
    # informational. Add `design: issue` to also sync design.md.
    mapping:
      requirements: issue
      tasks: issue

# Optional notifications
# notifications:
#   - type: slack
#     config:
#       webhook: ${SLACK_WEBHOOK}
#     events:
#       - task_completed
#       - sync_failed
"#;

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Kiro,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Kiro => "kiro",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub path: Option<String>,
}

impl SourceConfig {
    /// Directory handed to the source parser, relative paths resolved against `root`.
    pub fn resolve_path(&self, root: &Path) -> PathBuf {
        match &self.path {
            Some(p) => root.join(p),
            None => paths::kiro_specs_dir(root),
        }
    }
}

// ---------------------------------------------------------------------------
// Platform configs (one variant per supported platform)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    #[default]
    Token,
    GhCli,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GithubConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub auth_method: AuthMethod,
    #[serde(default = "default_add_comments")]
    pub add_comments: bool,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_add_comments() -> bool {
    true
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

impl GithubConfig {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum PlatformConfig {
    Github(GithubConfig),
}

impl PlatformConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            PlatformConfig::Github(_) => "github",
        }
    }
}

// ---------------------------------------------------------------------------
// Per-target settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncLevel {
    Full,
    StatusOnly,
}

impl SyncLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncLevel::Full => "full",
            SyncLevel::StatusOnly => "status-only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    Issue,
}

/// Item kind to remote item type. Only `design` changes behaviour: it opts
/// the target into design sync. Requirements and tasks are always issues.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingConfig {
    #[serde(default)]
    pub requirements: Option<MappingKind>,
    #[serde(default)]
    pub tasks: Option<MappingKind>,
    #[serde(default)]
    pub design: Option<MappingKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetConfig {
    pub name: String,
    pub enabled: bool,
    #[serde(flatten)]
    pub platform: PlatformConfig,
    pub sync_level: Option<SyncLevel>,
    pub mapping: MappingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: serde_yaml::Value,
    #[serde(default)]
    pub events: Vec<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub version: String,
    pub source: SourceConfig,
    pub targets: Vec<TargetConfig>,
    pub notifications: Vec<NotificationConfig>,
}

impl Config {
    /// Load `<root>/.specbridge.yaml`.
    pub fn load_from_root(root: &Path, env: &EnvSnapshot) -> Result<Self> {
        Self::load(&paths::config_path(root), env)
    }

    /// Load and validate a config file.
    ///
    /// A missing file is `ConfigNotFound`; every other failure (unreadable,
    /// bad YAML, unresolved `${VAR}`, failed validation) is `ConfigParse`.
    pub fn load(path: &Path, env: &EnvSnapshot) -> Result<Self> {
        if !path.exists() {
            return Err(SpecBridgeError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path).map_err(|e| {
            SpecBridgeError::ConfigParse(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&data, env)
    }

    pub fn parse(yaml: &str, env: &EnvSnapshot) -> Result<Self> {
        let mut value: serde_yaml::Value =
            serde_yaml::from_str(yaml).map_err(|e| SpecBridgeError::ConfigParse(e.to_string()))?;
        substitute_env(&mut value, env)?;
        let raw: RawConfig = serde_yaml::from_value(value)
            .map_err(|e| SpecBridgeError::ConfigParse(e.to_string()))?;
        raw.validate()
    }

    pub fn enabled_targets(&self) -> impl Iterator<Item = &TargetConfig> {
        self.targets.iter().filter(|t| t.enabled)
    }
}

// ---------------------------------------------------------------------------
// Raw (pre-validation) shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    version: Option<serde_yaml::Value>,
    source: Option<RawSource>,
    targets: Option<serde_yaml::Value>,
    #[serde(default)]
    notifications: Vec<NotificationConfig>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(rename = "type")]
    kind: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTarget {
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    enabled: Option<serde_yaml::Value>,
    config: Option<serde_yaml::Value>,
    sync_level: Option<SyncLevel>,
    mapping: Option<MappingConfig>,
}

fn parse_err(msg: impl Into<String>) -> SpecBridgeError {
    SpecBridgeError::ConfigParse(msg.into())
}

impl RawConfig {
    fn validate(self) -> Result<Config> {
        let version = match self.version {
            None | Some(serde_yaml::Value::Null) => {
                return Err(parse_err("missing required field: version"))
            }
            Some(serde_yaml::Value::String(s)) => s,
            Some(serde_yaml::Value::Number(n)) => n.to_string(),
            Some(_) => return Err(parse_err("version must be a string")),
        };
        if !SUPPORTED_VERSIONS.contains(&version.as_str()) {
            return Err(parse_err(format!(
                "unsupported version: {version}. Supported versions: {}",
                SUPPORTED_VERSIONS.join(", ")
            )));
        }

        let source = self
            .source
            .ok_or_else(|| parse_err("missing required field: source"))?;
        let source_kind = source
            .kind
            .ok_or_else(|| parse_err("missing required field: source.type"))?;
        let kind = match source_kind.as_str() {
            "kiro" => SourceKind::Kiro,
            other => return Err(parse_err(format!("unsupported source type: {other}"))),
        };

        let raw_targets: Vec<serde_yaml::Value> = match self.targets {
            Some(serde_yaml::Value::Sequence(seq)) => seq,
            _ => return Err(parse_err("missing or invalid field: targets (must be an array)")),
        };
        if raw_targets.is_empty() {
            return Err(parse_err("at least one target must be configured"));
        }

        let mut targets = Vec::with_capacity(raw_targets.len());
        for (index, value) in raw_targets.into_iter().enumerate() {
            let raw: RawTarget = serde_yaml::from_value(value)
                .map_err(|e| parse_err(format!("target {index}: {e}")))?;
            targets.push(raw.validate(index)?);
        }

        for (index, n) in self.notifications.iter().enumerate() {
            if n.kind.trim().is_empty() {
                return Err(parse_err(format!(
                    "notification {index}: missing required field 'type'"
                )));
            }
        }

        Ok(Config {
            version,
            source: SourceConfig {
                kind,
                path: source.path,
            },
            targets,
            notifications: self.notifications,
        })
    }
}

impl RawTarget {
    fn validate(self, index: usize) -> Result<TargetConfig> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| parse_err(format!("target {index}: missing required field 'name'")))?;
        let kind = self
            .kind
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| parse_err(format!("target {index}: missing required field 'type'")))?;
        let enabled = match self.enabled {
            Some(serde_yaml::Value::Bool(b)) => b,
            _ => {
                return Err(parse_err(format!(
                    "target {index}: 'enabled' must be a boolean"
                )))
            }
        };
        let config = match self.config {
            Some(v @ serde_yaml::Value::Mapping(_)) => v,
            _ => {
                return Err(parse_err(format!(
                    "target {index}: missing required field 'config'"
                )))
            }
        };

        let platform = match kind.as_str() {
            "github" => {
                let gh: GithubConfig = serde_yaml::from_value(config)
                    .map_err(|e| parse_err(format!("target {index} ({name}): {e}")))?;
                if gh.owner.trim().is_empty() || gh.repo.trim().is_empty() {
                    return Err(parse_err(format!(
                        "target {index} ({name}): owner and repo must not be empty"
                    )));
                }
                PlatformConfig::Github(gh)
            }
            other => {
                return Err(parse_err(format!(
                    "target {index} ({name}): unsupported target type '{other}'"
                )))
            }
        };

        Ok(TargetConfig {
            name,
            enabled,
            platform,
            sync_level: self.sync_level,
            mapping: self.mapping.unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// Environment substitution
// ---------------------------------------------------------------------------

static ENV_VAR_RE: OnceLock<Regex> = OnceLock::new();

fn env_var_re() -> &'static Regex {
    ENV_VAR_RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").unwrap())
}

/// Replace every `${NAME}` in `value` with `env[NAME]`.
pub fn replace_env_vars(value: &str, env: &EnvSnapshot) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut last = 0;
    for caps in env_var_re().captures_iter(value) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str();
        let replacement = env.get(name).ok_or_else(|| {
            parse_err(format!("environment variable {name} is not defined"))
        })?;
        out.push_str(&value[last..whole.start()]);
        out.push_str(replacement);
        last = whole.end();
    }
    out.push_str(&value[last..]);
    Ok(out)
}

fn substitute_env(value: &mut serde_yaml::Value, env: &EnvSnapshot) -> Result<()> {
    match value {
        serde_yaml::Value::String(s) => {
            *s = replace_env_vars(s, env)?;
        }
        serde_yaml::Value::Sequence(seq) => {
            for item in seq {
                substitute_env(item, env)?;
            }
        }
        serde_yaml::Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                substitute_env(v, env)?;
            }
        }
        serde_yaml::Value::Tagged(tagged) => substitute_env(&mut tagged.value, env)?,
        _ => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
