//! Declarative per-site rules for the pipeline.
//!
//! Dozens of near-identical site providers differ only in data: which hosts
//! to deny, which embed hosts get delegated, which playback-API hosts exist,
//! and which dead mirror hosts should be rewritten to live ones. [`SiteRules`]
//! carries that data; the pipeline's control flow never changes per site.
//!
//! Rules can be built in code or loaded from a TOML file
//! (`~/.config/streamsift/rules.toml` by default).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Built-in embed-trigger function names (the `go_to_player` family).
const BUILTIN_CALL_VOCAB: &[&str] =
    &["go_to_player", "go_to_playerVast", "loadPlayer", "showVideo"];

/// Built-in deny-list: ad networks, analytics, social widgets.
const BUILTIN_DENY_HOSTS: &[&str] = &[
    "doubleclick.net",
    "googlesyndication.com",
    "google-analytics.com",
    "googletagmanager.com",
    "facebook.com",
    "twitter.com",
    "platform.twitter.com",
    "disqus.com",
    "popads.net",
    "adsco.re",
    "exosrv.com",
    "juicyads.com",
];

/// One host rewrite: candidates on a dead mirror move to its live twin.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HostRewrite {
    pub from: String,
    pub to: String,
}

/// Per-site configuration consumed by the scanner and the strategy table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteRules {
    /// Hosts whose candidates are dropped outright.
    pub deny_hosts: Vec<String>,
    /// Host substrings handled by the external extractor delegate.
    pub delegate_hosts: Vec<String>,
    /// Hosts that speak the sealed playback API.
    pub api_hosts: Vec<String>,
    /// Alternate API hosts tried under mirror rotation.
    pub api_mirrors: Vec<String>,
    /// Dead-mirror rewrites applied to candidates before dispatch.
    pub host_rewrites: Vec<HostRewrite>,
    /// Additional embed-trigger function names beyond the built-ins.
    pub extra_call_vocab: Vec<String>,
    /// Host substrings that make a plain anchor worth scanning.
    pub host_hints: Vec<String>,
}

impl Default for SiteRules {
    fn default() -> Self {
        Self {
            deny_hosts: BUILTIN_DENY_HOSTS.iter().map(ToString::to_string).collect(),
            delegate_hosts: Vec::new(),
            api_hosts: Vec::new(),
            api_mirrors: Vec::new(),
            host_rewrites: Vec::new(),
            extra_call_vocab: Vec::new(),
            host_hints: Vec::new(),
        }
    }
}

impl SiteRules {
    /// Load rules from a TOML file, merged over the defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed; a missing *default* file
    /// is not an error (see [`SiteRules::load_default`]).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut rules: Self = toml::from_str(&content)
            .with_context(|| format!("invalid TOML in {}", path.display()))?;
        // File entries extend the built-in deny-list rather than replace it.
        let mut deny = SiteRules::default().deny_hosts;
        deny.append(&mut rules.deny_hosts);
        deny.dedup();
        rules.deny_hosts = deny;
        Ok(rules)
    }

    /// Load from the default location, falling back to built-ins when no
    /// file exists.
    pub fn load_default() -> Result<Self> {
        let path = default_rules_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Full embed-call vocabulary: built-ins plus configured extras.
    #[must_use]
    pub fn call_vocabulary(&self) -> Vec<String> {
        let mut vocab: Vec<String> = BUILTIN_CALL_VOCAB.iter().map(ToString::to_string).collect();
        vocab.extend(self.extra_call_vocab.iter().cloned());
        vocab
    }

    /// Apply dead-mirror rewrites to a candidate URL.
    #[must_use]
    pub fn apply_rewrites(&self, url: &str) -> String {
        let mut rewritten = url.to_string();
        for rewrite in &self.host_rewrites {
            rewritten = rewritten.replace(&rewrite.from, &rewrite.to);
        }
        rewritten
    }
}

/// Default rules file location.
fn default_rules_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("streamsift")
        .join("rules.toml")
}

/// Caller-owned mirror rotation state.
///
/// When a site lists alternate playback-API hosts, the rotation index
/// decides which mirror a resolution call starts from. The counter is
/// explicit and injected -- never ambient global state -- so concurrent
/// resolutions on different rotations cannot interfere.
#[derive(Debug, Default)]
pub struct MirrorRotation {
    counter: AtomicUsize,
}

impl MirrorRotation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the mirror to try first, for a mirror list of length `len`.
    #[must_use]
    pub fn current(&self, len: usize) -> usize {
        if len == 0 {
            0
        } else {
            self.counter.load(Ordering::Relaxed) % len
        }
    }

    /// Advance to the next mirror after a failure.
    pub fn advance(&self) {
        self.counter.fetch_add(1, Ordering::Relaxed);
    }
}
