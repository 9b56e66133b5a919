//! Persisted defaults for the command line.
//!
//! The file is line-oriented `key = value` with double-quoted strings,
//! `true`/`false` booleans, bare integers and `#` comments. It is rewritten
//! whenever a run changes one of the remembered values.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use course_mirror_core::BrowserChoice;
use url::Url;

const CONFIG_DIR_NAME: &str = "course-mirror";
const CONFIG_FILE_NAME: &str = "config.toml";
const MASKED_PASSWORD: &str = "********";

/// Values remembered between runs. `None` means "not set in the file".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Last-used login name.
    pub username: Option<String>,
    /// Last-used password, stored unencrypted.
    pub password: Option<String>,
    /// Directory course trees are written under.
    pub download_root: Option<PathBuf>,
    pub browser: Option<BrowserChoice>,
    /// Explicit browser executable.
    pub browser_path: Option<PathBuf>,
    pub headless: Option<bool>,
    /// LMS root URL; the login form lives here.
    pub base_url: Option<String>,
    /// Bound for content-page waits in seconds.
    pub page_timeout_secs: Option<u64>,
    pub download_connect_timeout_secs: Option<u64>,
    pub download_read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates values against what the runtime accepts.
    pub fn validate(&self) -> Result<()> {
        validate_timeout_secs("page_timeout_secs", self.page_timeout_secs)?;
        validate_timeout_secs(
            "download_connect_timeout_secs",
            self.download_connect_timeout_secs,
        )?;
        validate_timeout_secs(
            "download_read_timeout_secs",
            self.download_read_timeout_secs,
        )?;
        if let Some(base_url) = &self.base_url {
            validate_base_url(base_url)?;
        }
        Ok(())
    }

    /// Renders the file contents. With `mask_password` the password value is
    /// replaced by asterisks.
    #[must_use]
    pub fn render(&self, mask_password: bool) -> String {
        let mut out = String::from("# course-mirror configuration\n");
        let mut string_line = |key: &str, value: Option<&str>| {
            if let Some(value) = value {
                let _ = writeln!(out, "{key} = \"{}\"", escape_string(value));
            }
        };
        string_line("username", self.username.as_deref());
        let password = self
            .password
            .as_deref()
            .map(|p| if mask_password { MASKED_PASSWORD } else { p });
        string_line("password", password);
        let download_root = self
            .download_root
            .as_ref()
            .map(|p| p.display().to_string());
        string_line("download_root", download_root.as_deref());
        string_line("browser", self.browser.map(BrowserChoice::as_str));
        let browser_path = self.browser_path.as_ref().map(|p| p.display().to_string());
        string_line("browser_path", browser_path.as_deref());
        string_line("base_url", self.base_url.as_deref());

        if let Some(headless) = self.headless {
            let _ = writeln!(out, "headless = {headless}");
        }
        for (key, value) in [
            ("page_timeout_secs", self.page_timeout_secs),
            (
                "download_connect_timeout_secs",
                self.download_connect_timeout_secs,
            ),
            ("download_read_timeout_secs", self.download_read_timeout_secs),
        ] {
            if let Some(value) = value {
                let _ = writeln!(out, "{key} = {value}");
            }
        }
        out
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

fn validate_base_url(value: &str) -> Result<()> {
    let url = Url::parse(value)
        .with_context(|| format!("Invalid config value for `base_url`: '{value}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Invalid config value for `base_url`: '{value}'. Expected an http(s) URL");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config; empty when no file exists.
    pub config: FileConfig,
    pub loaded_from_file: bool,
}

impl LoadedConfig {
    /// Writes `updated` back to disk when it differs from what was loaded.
    ///
    /// Returns whether the file was written.
    pub fn save_if_changed(&mut self, updated: FileConfig) -> Result<bool> {
        if updated == self.config && self.loaded_from_file {
            return Ok(false);
        }
        if updated == FileConfig::default() && !self.loaded_from_file {
            return Ok(false);
        }
        let Some(path) = self.path.as_deref() else {
            tracing::warn!("no config directory could be resolved; settings not saved");
            return Ok(false);
        };
        save_file_config(path, &updated)?;
        self.config = updated;
        self.loaded_from_file = true;
        Ok(true)
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/course-mirror/config.toml`
/// 2. `$HOME/.config/course-mirror/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    load_config_at(resolve_default_config_path())
}

fn load_config_at(path: Option<PathBuf>) -> Result<LoadedConfig> {
    let Some(path_ref) = path.as_deref().filter(|p| p.exists()) else {
        return Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        });
    };

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config,
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Writes `config` to `path`, creating the parent directory.
pub fn save_file_config(path: &Path, config: &FileConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory '{}'", parent.display()))?;
    }
    fs::write(path, config.render(false))
        .with_context(|| format!("Failed to write config file '{}'", path.display()))?;
    tracing::debug!(path = %path.display(), "config saved");
    Ok(())
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "username" => cfg.username = Some(parse_string_literal(value).with_context(invalid)?),
            "password" => cfg.password = Some(parse_string_literal(value).with_context(invalid)?),
            "download_root" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.download_root = Some(PathBuf::from(parsed));
            }
            "browser" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                let choice = parsed
                    .parse::<BrowserChoice>()
                    .map_err(|err| anyhow::anyhow!("{err}"))
                    .with_context(invalid)?;
                cfg.browser = Some(choice);
            }
            "browser_path" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.browser_path = Some(PathBuf::from(parsed));
            }
            "headless" => cfg.headless = Some(parse_boolean(value).with_context(invalid)?),
            "base_url" => cfg.base_url = Some(parse_string_literal(value).with_context(invalid)?),
            "page_timeout_secs" => {
                cfg.page_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "download_connect_timeout_secs" => {
                cfg.download_connect_timeout_secs =
                    Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "download_read_timeout_secs" => {
                cfg.download_read_timeout_secs =
                    Some(parse_integer_u64(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (index, ch) in line.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    let inner = &raw_value[1..raw_value.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(next @ ('\\' | '"')) => out.push(next),
                _ => bail!("Unsupported escape sequence in string"),
            },
            '"' => bail!("Unescaped quote inside string"),
            other => out.push(other),
        }
    }
    Ok(out)
}

fn escape_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
username = "s201912345"
headless = false
"#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.username.as_deref(), Some("s201912345"));
        assert_eq!(cfg.headless, Some(false));
        assert!(cfg.download_root.is_none());
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
browser = "edge" # work laptop
page_timeout_secs = 30 # slow campus network
password = "p#ss" # hash inside quotes stays
"#,
        )
        .expect("config with comments should parse");
        assert_eq!(cfg.browser, Some(BrowserChoice::Edge));
        assert_eq!(cfg.page_timeout_secs, Some(30));
        assert_eq!(cfg.password.as_deref(), Some("p#ss"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("concurrency = 4").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_boolean() {
        let err = parse_config_str("headless = yes").expect_err("invalid boolean expected");
        assert!(err.to_string().contains("headless"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_browser() {
        let err = parse_config_str(r#"browser = "firefox""#).expect_err("firefox unsupported");
        assert!(err.to_string().contains("browser"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout_value() {
        let err = parse_config_str("download_connect_timeout_secs = 0")
            .expect_err("invalid timeout expected");
        assert!(err.to_string().contains("download_connect_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_numeric_values_with_trailing_tokens() {
        let err = parse_config_str("page_timeout_secs = 4 trailing")
            .expect_err("expected trailing token error");
        assert!(err.to_string().contains("page_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_non_http_base_url() {
        let err = parse_config_str(r#"base_url = "ftp://lms.example.edu/""#)
            .expect_err("ftp base url rejected");
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("headless true").expect_err("syntax error expected");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_render_then_parse_keeps_every_value() {
        let cfg = FileConfig {
            username: Some("student".into()),
            password: Some(r#"we"ird\pass"#.into()),
            download_root: Some(PathBuf::from("/home/student/Courses")),
            browser: Some(BrowserChoice::Chromium),
            browser_path: Some(PathBuf::from("/usr/bin/chromium")),
            headless: Some(true),
            base_url: Some("https://lms.example.edu/".into()),
            page_timeout_secs: Some(12),
            download_connect_timeout_secs: Some(20),
            download_read_timeout_secs: Some(240),
        };
        let parsed = parse_config_str(&cfg.render(false)).expect("rendered config parses");
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_render_masks_password() {
        let cfg = FileConfig {
            password: Some("hunter2".into()),
            ..FileConfig::default()
        };
        let shown = cfg.render(true);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains(r#"password = "********""#));
    }

    #[test]
    fn test_save_if_changed_writes_only_on_change() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join(CONFIG_FILE_NAME);
        let mut loaded = load_config_at(Some(path.clone())).unwrap();
        assert!(!loaded.loaded_from_file);

        assert!(!loaded.save_if_changed(FileConfig::default()).unwrap());
        assert!(!path.exists());

        let updated = FileConfig {
            username: Some("student".into()),
            ..FileConfig::default()
        };
        assert!(loaded.save_if_changed(updated.clone()).unwrap());
        assert!(path.exists());
        assert!(!loaded.save_if_changed(updated.clone()).unwrap());

        let reloaded = load_config_at(Some(path)).unwrap();
        assert!(reloaded.loaded_from_file);
        assert_eq!(reloaded.config, updated);
    }
}
