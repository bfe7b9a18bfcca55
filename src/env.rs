//! Credential/config resolution.
//!
//! Three sources are merged per key, highest precedence first: a hosted-style
//! secrets file (TOML), a local `.env` dotfile, and the ambient process
//! environment. The result is an immutable `ResolvedEnv` passed explicitly to
//! the crew builder and orchestrator; nothing is written back into the
//! process environment. A missing key is not an error here — the API key is
//! checked at run trigger, not at resolution time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const KEY_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const KEY_OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const KEY_YOUTUBE_CHANNELS: &str = "YOUTUBE_CHANNELS";
pub const KEY_YOUTUBE_MAX_RESULTS: &str = "YOUTUBE_MAX_RESULTS";

const RESOLVED_KEYS: [&str; 4] = [
    KEY_OPENAI_API_KEY,
    KEY_OPENAI_MODEL,
    KEY_YOUTUBE_CHANNELS,
    KEY_YOUTUBE_MAX_RESULTS,
];

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CHANNELS: &str = "@krishnaik06";
pub const DEFAULT_MAX_RESULTS: u32 = 5;

/// Which tier supplied a key's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Secrets,
    Dotfile,
    Ambient,
    Default,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Secrets => "secrets",
            Source::Dotfile => ".env",
            Source::Ambient => "env",
            Source::Default => "default",
        }
    }
}

/// Resolved, read-only credential/config values for one process.
#[derive(Debug, Clone)]
pub struct ResolvedEnv {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub youtube_channels: String,
    pub youtube_max_results: u32,
    /// Per-key provenance, for the settings echo in the UI.
    pub sources: BTreeMap<&'static str, Source>,
}

impl ResolvedEnv {
    /// Resolution used by tests and offline paths: no files, no ambient env.
    pub fn empty() -> Self {
        let mut sources = BTreeMap::new();
        for k in RESOLVED_KEYS {
            sources.insert(k, Source::Default);
        }
        Self {
            openai_api_key: None,
            openai_model: DEFAULT_MODEL.to_string(),
            youtube_channels: DEFAULT_CHANNELS.to_string(),
            youtube_max_results: DEFAULT_MAX_RESULTS,
            sources,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }
}

/// Default location of the hosted-style secrets file.
pub fn default_secrets_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("crew-blog-cli").join("secrets.toml"))
}

/// Resolve all recognized keys. Idempotent and side-effect free.
pub fn resolve(secrets_path: Option<&Path>) -> ResolvedEnv {
    let secrets = secrets_path
        .map(|p| p.to_path_buf())
        .or_else(default_secrets_path)
        .map(|p| load_secrets_file(&p))
        .unwrap_or_default();
    let dotfile = load_dotfile();
    build(&merge_sources(&secrets, &dotfile, ambient_lookup))
}

/// Read the flat TOML secrets table. Unreadable or malformed files are
/// skipped, matching the original app which runs fine without secrets.
fn load_secrets_file(path: &Path) -> BTreeMap<String, String> {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return BTreeMap::new();
    };
    let Ok(table) = raw.parse::<toml::Table>() else {
        return BTreeMap::new();
    };
    table
        .into_iter()
        .map(|(k, v)| {
            // Non-string values (e.g. an integer max-results) are stringified.
            let s = match v {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, s)
        })
        .collect()
}

/// Read `.env` from the working directory (and ancestors) without touching
/// the process environment.
fn load_dotfile() -> BTreeMap<String, String> {
    match dotenvy::dotenv_iter() {
        Ok(iter) => iter.filter_map(|item| item.ok()).collect(),
        Err(_) => BTreeMap::new(),
    }
}

fn ambient_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Merge the three tiers for every recognized key.
fn merge_sources(
    secrets: &BTreeMap<String, String>,
    dotfile: &BTreeMap<String, String>,
    ambient: impl Fn(&str) -> Option<String>,
) -> BTreeMap<&'static str, (String, Source)> {
    let mut out = BTreeMap::new();
    for key in RESOLVED_KEYS {
        let resolved = secrets
            .get(key)
            .map(|v| (v.clone(), Source::Secrets))
            .or_else(|| dotfile.get(key).map(|v| (v.clone(), Source::Dotfile)))
            .or_else(|| ambient(key).map(|v| (v, Source::Ambient)));
        if let Some(r) = resolved {
            out.insert(key, r);
        }
    }
    out
}

fn build(merged: &BTreeMap<&'static str, (String, Source)>) -> ResolvedEnv {
    let mut sources = BTreeMap::new();
    let mut value_of = |key: &'static str| -> Option<String> {
        match merged.get(key) {
            Some((v, src)) => {
                sources.insert(key, *src);
                Some(v.clone())
            }
            None => {
                sources.insert(key, Source::Default);
                None
            }
        }
    };

    let openai_api_key = value_of(KEY_OPENAI_API_KEY);
    let openai_model = value_of(KEY_OPENAI_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let youtube_channels =
        value_of(KEY_YOUTUBE_CHANNELS).unwrap_or_else(|| DEFAULT_CHANNELS.to_string());
    let youtube_max_results = value_of(KEY_YOUTUBE_MAX_RESULTS)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(DEFAULT_MAX_RESULTS);

    ResolvedEnv {
        openai_api_key,
        openai_model,
        youtube_channels,
        youtube_max_results,
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn secrets_tier_wins_over_dotfile_and_ambient() {
        let secrets = map(&[(KEY_OPENAI_API_KEY, "sk-secrets")]);
        let dotfile = map(&[(KEY_OPENAI_API_KEY, "sk-dotfile")]);
        let merged = merge_sources(&secrets, &dotfile, |_| Some("sk-ambient".into()));
        let (value, source) = &merged[KEY_OPENAI_API_KEY];
        assert_eq!(value, "sk-secrets");
        assert_eq!(*source, Source::Secrets);
    }

    #[test]
    fn dotfile_fills_keys_secrets_did_not_set() {
        let secrets = map(&[(KEY_OPENAI_MODEL, "gpt-4o")]);
        let dotfile = map(&[(KEY_OPENAI_API_KEY, "sk-dotfile")]);
        let merged = merge_sources(&secrets, &dotfile, |_| None);
        assert_eq!(
            merged[KEY_OPENAI_API_KEY],
            ("sk-dotfile".to_string(), Source::Dotfile)
        );
        assert_eq!(
            merged[KEY_OPENAI_MODEL],
            ("gpt-4o".to_string(), Source::Secrets)
        );
    }

    #[test]
    fn ambient_is_the_fallback_for_unset_keys() {
        let merged = merge_sources(&BTreeMap::new(), &BTreeMap::new(), |k| {
            (k == KEY_YOUTUBE_CHANNELS).then(|| "@somechannel".to_string())
        });
        assert_eq!(
            merged[KEY_YOUTUBE_CHANNELS],
            ("@somechannel".to_string(), Source::Ambient)
        );
        assert!(!merged.contains_key(KEY_OPENAI_API_KEY));
    }

    #[test]
    fn defaults_apply_when_no_tier_defines_a_key() {
        let env = build(&BTreeMap::new());
        assert!(env.openai_api_key.is_none());
        assert_eq!(env.openai_model, DEFAULT_MODEL);
        assert_eq!(env.youtube_channels, DEFAULT_CHANNELS);
        assert_eq!(env.youtube_max_results, DEFAULT_MAX_RESULTS);
        assert_eq!(env.sources[KEY_OPENAI_MODEL], Source::Default);
    }

    #[test]
    fn unparseable_max_results_falls_back_to_default() {
        let secrets = map(&[(KEY_YOUTUBE_MAX_RESULTS, "lots")]);
        let merged = merge_sources(&secrets, &BTreeMap::new(), |_| None);
        let env = build(&merged);
        assert_eq!(env.youtube_max_results, DEFAULT_MAX_RESULTS);
    }

    #[test]
    fn secrets_file_stringifies_non_string_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("secrets.toml");
        std::fs::write(&path, "YOUTUBE_MAX_RESULTS = 12\nOPENAI_API_KEY = \"sk-x\"\n")
            .expect("write secrets");
        let secrets = load_secrets_file(&path);
        assert_eq!(secrets[KEY_YOUTUBE_MAX_RESULTS], "12");
        assert_eq!(secrets[KEY_OPENAI_API_KEY], "sk-x");
    }

    #[test]
    fn malformed_secrets_file_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("secrets.toml");
        std::fs::write(&path, "not [valid toml").expect("write secrets");
        assert!(load_secrets_file(&path).is_empty());
    }
}
