use std::path::{Path, PathBuf};

use {
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
};

use crate::{env_subst::substitute_env, schema::ChanmirrorConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "chanmirror.toml",
    "chanmirror.yaml",
    "chanmirror.yml",
    "chanmirror.json",
];

/// Environment variable consulted when the config carries no token.
pub const TOKEN_ENV_VAR: &str = "TELEGRAM_BOT_TOKEN";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<ChanmirrorConfig> {
    let raw = read_substituted(path)?;
    let mut config = parse_config(&raw, path)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Load the config file as a generic value, after env substitution.
pub fn load_config_value(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = read_substituted(path)?;
    parse_config_value(&raw, path)
}

/// Load from `explicit` if given, else from the first discovered file.
///
/// Search order without an explicit path:
/// 1. `./chanmirror.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/chanmirror/chanmirror.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `ChanmirrorConfig::default()` when nothing is found. An
/// explicit path that cannot be read is an error.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<ChanmirrorConfig> {
    match resolve_config_path(explicit) {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)
        },
        None => {
            debug!("no config file found, using defaults");
            let mut config = ChanmirrorConfig::default();
            apply_env_overrides(&mut config);
            Ok(config)
        },
    }
}

/// The file [`load`] would read.
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    }
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    find_config_file_in(Path::new("."), config_dir().as_deref())
}

fn find_config_file_in(local: &Path, user: Option<&Path>) -> Option<PathBuf> {
    std::iter::once(local)
        .chain(user)
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/chanmirror/`).
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "chanmirror").map(|d| d.config_dir().to_path_buf())
}

/// Fill settings left empty in the file from the process environment.
pub fn apply_env_overrides(config: &mut ChanmirrorConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(
    config: &mut ChanmirrorConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if !config.telegram.token.expose_secret().trim().is_empty() {
        return;
    }
    if let Some(token) = lookup(TOKEN_ENV_VAR).filter(|t| !t.trim().is_empty()) {
        config.telegram.token = Secret::new(token);
    }
}

fn read_substituted(path: &Path) -> anyhow::Result<String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    Ok(substitute_env(&raw))
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<ChanmirrorConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

pub(crate) fn parse_config_value(raw: &str, path: &Path) -> anyhow::Result<serde_json::Value> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => {
            let v: toml::Value = toml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value = serde_yaml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    const MIRROR_TOML: &str = r#"
[mirror]
source_channels = [-1001]
destination_channels = [-2001]
sync_deletions = true

[telegram]
token = "123:abc"
"#;

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chanmirror.toml");
        std::fs::write(&path, MIRROR_TOML).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.mirror.source_channels, vec![-1001]);
        assert!(config.mirror.sync_deletions);
        assert_eq!(config.telegram.token.expose_secret(), "123:abc");
    }

    #[rstest]
    #[case("chanmirror.yaml", "mirror:\n  source_channels: [-1001]\n  destination_channels: [-2001]\n")]
    #[case("chanmirror.yml", "mirror:\n  source_channels: ['-1001']\n  destinations: ['-2001']\n")]
    #[case(
        "chanmirror.json",
        r#"{"mirror": {"source_channels": [-1001], "destination_channels": [-2001]}}"#
    )]
    fn loads_other_formats(#[case] name: &str, #[case] body: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.mirror.source_channels, vec![-1001]);
        assert_eq!(config.mirror.destination_channels, vec![-2001]);
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chanmirror.ini");
        std::fs::write(&path, "x=1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn local_file_wins_over_user_dir() {
        let local = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        std::fs::write(user.path().join("chanmirror.toml"), "").unwrap();
        assert_eq!(
            find_config_file_in(local.path(), Some(user.path())),
            Some(user.path().join("chanmirror.toml"))
        );

        std::fs::write(local.path().join("chanmirror.json"), "{}").unwrap();
        assert_eq!(
            find_config_file_in(local.path(), Some(user.path())),
            Some(local.path().join("chanmirror.json"))
        );
    }

    #[test]
    fn nothing_found() {
        let local = tempfile::tempdir().unwrap();
        assert_eq!(find_config_file_in(local.path(), None), None);
    }

    #[test]
    fn empty_token_falls_back_to_env() {
        let mut config = ChanmirrorConfig::default();
        apply_env_overrides_with(&mut config, |name| {
            (name == TOKEN_ENV_VAR).then(|| "42:env".to_string())
        });
        assert_eq!(config.telegram.token.expose_secret(), "42:env");
    }

    #[test]
    fn file_token_is_not_overridden() {
        let mut config = ChanmirrorConfig::default();
        config.telegram.token = Secret::new("1:file".into());
        apply_env_overrides_with(&mut config, |_| Some("42:env".into()));
        assert_eq!(config.telegram.token.expose_secret(), "1:file");
    }
}
