use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use postette_shared::{Diagnostic, Settings, SettingsPatch};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::AppError;
use crate::renderer::RendererKind;

pub const ENV_CONFIG: &str = "POSTETTE_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Presenter settings, merged over the defaults with the same validation
    /// as a runtime `configure` call.
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub renderer: RendererKind,
    #[serde(default)]
    pub custom_levels: Vec<String>,
    /// Per-character reading time in milliseconds.
    #[serde(default)]
    pub compute_factor: Option<u64>,
}

impl ClientConfig {
    /// Loads the config from the resolved path. A missing file at the default
    /// location yields the built-in defaults; a missing file that was asked
    /// for explicitly is an error.
    pub fn find_and_load(cli_value: Option<PathBuf>) -> Result<(PathBuf, Self), AppError> {
        let explicit = cli_value.is_some() || std::env::var_os(ENV_CONFIG).is_some();
        let path = resolve_config_path(cli_value)?;
        if !explicit && !path.exists() {
            return Ok((path, Self::default()));
        }
        let cfg = load_config(&path)?;
        Ok((path, cfg))
    }

    /// Default settings with the file's `settings` section applied.
    pub fn effective_settings(&self) -> (Settings, Vec<Diagnostic>) {
        let (patch, diagnostics) = SettingsPatch::from_map(&self.settings);
        let mut settings = Settings::default();
        settings.merge(patch);
        (settings, diagnostics)
    }
}

pub fn resolve_config_path(cli_value: Option<PathBuf>) -> Result<PathBuf, AppError> {
    if let Some(p) = cli_value {
        return Ok(p);
    }
    if let Ok(p) = std::env::var(ENV_CONFIG) {
        return Ok(PathBuf::from(p));
    }
    default_config_path().ok_or_else(|| AppError::Config("could not determine config dir".into()))
}

pub fn default_config_path() -> Option<PathBuf> {
    let pd = ProjectDirs::from("dev", "postette", "postette")?;
    Some(pd.config_dir().join("client.yaml"))
}

pub fn load_config(path: &Path) -> Result<ClientConfig, AppError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("read {} failed: {e}", path.display())))?;
    parse_config(&data).map_err(|e| AppError::Config(format!("parse {} failed: {e}", path.display())))
}

pub fn parse_config(data: &str) -> Result<ClientConfig, serde_yaml::Error> {
    if data.trim().is_empty() {
        return Ok(ClientConfig::default());
    }
    serde_yaml::from_str(data)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use postette_shared::Integrate;

    use super::*;

    #[test]
    fn yaml_settings_go_through_validation() {
        let cfg = parse_config(
            r##"
renderer: desktop
custom_levels: [notice, deadline]
compute_factor: 80
settings:
  reiterate: true
  tldr: 0
  integration: auto
  modal_selector:
    - "#dialog"
    - ".overlay"
  glitter: yes
"##,
        )
        .unwrap();
        assert_eq!(cfg.renderer, RendererKind::Desktop);
        assert_eq!(cfg.custom_levels, vec!["notice", "deadline"]);
        assert_eq!(cfg.compute_factor, Some(80));

        let (settings, diagnostics) = cfg.effective_settings();
        assert!(settings.reiterate);
        assert_eq!(settings.tldr, 72);
        assert_eq!(settings.integration, Integrate::Auto);
        assert_eq!(settings.modal_selectors, vec!["#dialog", ".overlay"]);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.contains(&Diagnostic::UnknownSetting("glitter".into())));
    }

    #[test]
    fn empty_file_means_defaults() {
        let cfg = parse_config("  \n").unwrap();
        assert_eq!(cfg.renderer, RendererKind::Log);
        assert_eq!(cfg.effective_settings().0, Settings::default());
    }

    #[test]
    fn load_reads_file_and_reports_path_on_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "renderer: log\nsettings:\n  top: 20").unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.effective_settings().0.top, "20px");

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        match load_config(&missing) {
            Err(AppError::Config(msg)) => assert!(msg.contains("absent.yaml")),
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn explicit_path_wins() {
        let path = PathBuf::from("/tmp/postette.yaml");
        assert_eq!(resolve_config_path(Some(path.clone())).unwrap(), path);
    }
}
