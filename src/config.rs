#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow, bail};
use std::{
    collections::HashMap,
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use url::Url;

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
pub const DEFAULT_OUTPUT_DIR: &str = ".";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

pub const BACKEND_KEY: &str = "NEWTUBE_MERGE_BACKEND";
pub const OUTPUT_DIR_KEY: &str = "NEWTUBE_MERGE_OUTPUT_DIR";
pub const TIMEOUT_KEY: &str = "NEWTUBE_MERGE_TIMEOUT_SECS";
pub const SOURCE_KEY: &str = "NEWTUBE_MERGE_SOURCE";

/// How the merge request refers to the chosen formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeSource {
    /// Watch page URL pinned with `&itag=<format_id>`.
    #[default]
    WatchPage,
    /// The format's direct media URL as reported by the metadata endpoint.
    DirectUrl,
}

impl MergeSource {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeSource::WatchPage => "watch",
            MergeSource::DirectUrl => "direct",
        }
    }
}

impl fmt::Display for MergeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeSource {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "watch" | "itag" => Ok(MergeSource::WatchPage),
            "direct" | "url" => Ok(MergeSource::DirectUrl),
            _ => bail!("unknown merge source: {value} (expected watch or direct)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub backend_url: Url,
    pub output_dir: PathBuf,
    pub timeout: Duration,
    pub merge_source: MergeSource,
}

pub fn load_client_settings() -> Result<ClientSettings> {
    resolve_client_settings(SettingsOverrides::default())
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub backend_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub merge_source: Option<MergeSource>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_client_settings(overrides: SettingsOverrides) -> Result<ClientSettings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_client_settings_with_overrides(&file_vars, env_var_string, overrides)
}

#[cfg(test)]
fn build_client_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings> {
    build_client_settings_with_overrides(file_vars, env_lookup, SettingsOverrides::default())
}

fn build_client_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Result<ClientSettings> {
    let backend_raw = overrides
        .backend_url
        .and_then(non_blank)
        .or_else(|| lookup_value(BACKEND_KEY, file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
    let backend_url = parse_backend_url(&backend_raw)?;
    let output_dir = overrides
        .output_dir
        .or_else(|| lookup_value(OUTPUT_DIR_KEY, file_vars, &env_lookup).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let timeout_secs = overrides
        .timeout_secs
        .or_else(|| {
            lookup_value(TIMEOUT_KEY, file_vars, &env_lookup)
                .and_then(|value| value.parse::<u64>().ok())
        })
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let merge_source = overrides
        .merge_source
        .or_else(|| {
            lookup_value(SOURCE_KEY, file_vars, &env_lookup)
                .and_then(|value| value.parse::<MergeSource>().ok())
        })
        .unwrap_or_default();
    Ok(ClientSettings {
        backend_url,
        output_dir,
        timeout: Duration::from_secs(timeout_secs),
        merge_source,
    })
}

/// Accepts `http(s)://host[:port][/prefix]`; trailing slashes are dropped.
pub fn parse_backend_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).with_context(|| format!("invalid backend URL {trimmed:?}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!(
            "backend URL must use http or https, got {}",
            url.scheme()
        ));
    }
    if url.host_str().is_none() {
        bail!("backend URL has no host: {trimmed}");
    }
    Ok(url)
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key)
        .or_else(|| file_vars.get(key).cloned())
        .and_then(non_blank)
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .map(|value| value.replace("\\\"", "\"").replace("\\\\", "\\"))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| value.to_string());
        vars.insert(key.to_string(), value);
    }
    Ok(vars)
}

/// Updates or appends a single env var inside the target file while preserving
/// unrelated lines and comments.
pub fn upsert_env_value(path: &Path, key: &str, value: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating {}", parent.display()))?;
        }
    }

    let raw = fs::read_to_string(path).unwrap_or_default();
    let mut lines = Vec::new();
    let mut updated = false;
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");

    for line in raw.lines() {
        let trimmed = line.trim_start();
        let indent_len = line.len() - trimmed.len();
        let indent = &line[..indent_len];
        let (prefix, rest) = if let Some(stripped) = trimmed.strip_prefix("export ") {
            ("export ", stripped)
        } else {
            ("", trimmed)
        };
        let Some((candidate, _)) = rest.split_once('=') else {
            lines.push(line.to_string());
            continue;
        };
        if candidate.trim() == key {
            lines.push(format!("{indent}{prefix}{key}=\"{escaped}\""));
            updated = true;
        } else {
            lines.push(line.to_string());
        }
    }

    if !updated {
        lines.push(format!("{key}=\"{escaped}\""));
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, lines.join("\n") + "\n")
        .with_context(|| format!("Writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("Replacing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn settings_from(contents: &str) -> ClientSettings {
        let cfg = make_config(contents);
        let vars = read_env_file(cfg.path()).unwrap();
        build_client_settings(&vars, |_| None).unwrap()
    }

    #[test]
    fn defaults_apply_without_config() {
        let settings = build_client_settings(&HashMap::new(), |_| None).unwrap();
        assert_eq!(settings.backend_url.as_str(), "http://localhost:5000/");
        assert_eq!(settings.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(settings.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(settings.merge_source, MergeSource::WatchPage);
    }

    #[test]
    fn reads_values_from_env_file() {
        let settings = settings_from(
            "NEWTUBE_MERGE_BACKEND=\"https://api.example.com/\"\nNEWTUBE_MERGE_OUTPUT_DIR=/tmp/out\nNEWTUBE_MERGE_TIMEOUT_SECS=30\nNEWTUBE_MERGE_SOURCE=direct\n",
        );
        assert_eq!(settings.backend_url.as_str(), "https://api.example.com/");
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.merge_source, MergeSource::DirectUrl);
    }

    #[test]
    fn invalid_timeout_and_source_fall_back() {
        let settings =
            settings_from("NEWTUBE_MERGE_TIMEOUT_SECS=soon\nNEWTUBE_MERGE_SOURCE=carrier-pigeon\n");
        assert_eq!(settings.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(settings.merge_source, MergeSource::WatchPage);

        let zero = settings_from("NEWTUBE_MERGE_TIMEOUT_SECS=0\n");
        assert_eq!(zero.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn invalid_backend_is_an_error() {
        let cfg = make_config("NEWTUBE_MERGE_BACKEND=ftp://files.example\n");
        let vars = read_env_file(cfg.path()).unwrap();
        let err = build_client_settings(&vars, |_| None).unwrap_err();
        assert!(err.to_string().contains("http or https"));

        let mut vars = HashMap::new();
        vars.insert(BACKEND_KEY.to_string(), "not a url".to_string());
        assert!(build_client_settings(&vars, |_| None).is_err());
    }

    #[test]
    fn env_takes_precedence_over_file() {
        let vars = read_env_file(
            make_config("NEWTUBE_MERGE_BACKEND=\"http://file:5000\"\n").path(),
        )
        .unwrap();
        let settings = build_client_settings(&vars, |key| {
            if key == BACKEND_KEY {
                Some("http://env:6000".to_string())
            } else {
                None
            }
        })
        .unwrap();
        assert_eq!(settings.backend_url.as_str(), "http://env:6000/");
    }

    #[test]
    fn overrides_take_precedence_over_env() {
        let mut vars = HashMap::new();
        vars.insert(BACKEND_KEY.to_string(), "http://file:5000".to_string());
        vars.insert(OUTPUT_DIR_KEY.to_string(), "/file-out".to_string());
        vars.insert(TIMEOUT_KEY.to_string(), "10".to_string());
        vars.insert(SOURCE_KEY.to_string(), "direct".to_string());

        let overrides = SettingsOverrides {
            backend_url: Some("http://override:7000".into()),
            output_dir: None,
            timeout_secs: Some(99),
            merge_source: Some(MergeSource::WatchPage),
            env_path: None,
        };

        let settings = build_client_settings_with_overrides(
            &vars,
            |key| {
                if key == OUTPUT_DIR_KEY {
                    Some("/env-out".to_string())
                } else if key == TIMEOUT_KEY {
                    Some("20".to_string())
                } else {
                    None
                }
            },
            overrides,
        )
        .unwrap();

        assert_eq!(settings.backend_url.as_str(), "http://override:7000/");
        assert_eq!(settings.output_dir, PathBuf::from("/env-out"));
        assert_eq!(settings.timeout, Duration::from_secs(99));
        assert_eq!(settings.merge_source, MergeSource::WatchPage);
    }

    #[test]
    fn blank_override_is_ignored() {
        let settings = build_client_settings_with_overrides(
            &HashMap::new(),
            |_| None,
            SettingsOverrides {
                backend_url: Some("   ".into()),
                ..SettingsOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(settings.backend_url.as_str(), "http://localhost:5000/");
    }

    #[test]
    fn read_env_file_handles_export_and_quotes() {
        let cfg = make_config(
            r#"
            export NEWTUBE_MERGE_BACKEND="http://a:1"
            NEWTUBE_MERGE_OUTPUT_DIR='/out'
            NEWTUBE_MERGE_SOURCE =  "watch"
            NEWTUBE_MERGE_TIMEOUT_SECS=5
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(cfg.path()).unwrap();
        assert_eq!(vars.get(BACKEND_KEY).unwrap(), "http://a:1");
        assert_eq!(vars.get(OUTPUT_DIR_KEY).unwrap(), "/out");
        assert_eq!(vars.get(SOURCE_KEY).unwrap(), "watch");
        assert_eq!(vars.get(TIMEOUT_KEY).unwrap(), "5");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn read_env_file_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join("missing.env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn upsert_replaces_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "# settings\nexport NEWTUBE_MERGE_BACKEND=\"http://old:1\"\nOTHER=1\n")
            .unwrap();

        upsert_env_value(&path, BACKEND_KEY, "http://new:2").unwrap();
        upsert_env_value(&path, OUTPUT_DIR_KEY, "/srv/with \"quote\"").unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("# settings\nexport NEWTUBE_MERGE_BACKEND=\"http://new:2\"\n"));
        assert!(raw.contains("OTHER=1\n"));

        let vars = read_env_file(&path).unwrap();
        assert_eq!(vars.get(BACKEND_KEY).unwrap(), "http://new:2");
        assert_eq!(vars.get(OUTPUT_DIR_KEY).unwrap(), "/srv/with \"quote\"");
    }

    #[test]
    fn merge_source_parses_aliases() {
        assert_eq!("ITAG".parse::<MergeSource>().unwrap(), MergeSource::WatchPage);
        assert_eq!(" url ".parse::<MergeSource>().unwrap(), MergeSource::DirectUrl);
        assert!("nope".parse::<MergeSource>().is_err());
        assert_eq!(MergeSource::DirectUrl.to_string(), "direct");
    }
}
