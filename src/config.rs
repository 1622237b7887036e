// Acquisition configuration
//
// The pipeline never reads ambient global state: the surrounding process
// builds one AcquisitionConfig at startup (from_env in the CLI binary) and
// passes it in. The two cookie forms map to the two backends' native
// formats, and either renders a Netscape cookie file for yt-dlp.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub const DEFAULT_ACCEPT_LANGUAGE: &str = "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7";

/// Cookie lifetime written into generated Netscape files: one year.
const COOKIE_TTL_SECS: u64 = 31_536_000;

/// One structured cookie, the android backend's native form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieSpec {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
}

impl CookieSpec {
    /// Render one Netscape cookie-file line (tab-separated, 7 fields).
    pub fn netscape_line(&self, expires: u64) -> String {
        let domain = match &self.domain {
            Some(d) if d.starts_with('.') => d.clone(),
            Some(d) => format!(".{}", d),
            None => ".youtube.com".to_string(),
        };
        let path = self.path.as_deref().unwrap_or("/");
        let secure = if self.secure { "TRUE" } else { "FALSE" };
        format!(
            "{}\tTRUE\t{}\t{}\t{}\t{}\t{}",
            domain, path, secure, expires, self.name, self.value
        )
    }

    /// `name=value` pair for a Cookie request header.
    pub fn header_pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Explicit configuration for one pipeline instance.
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    pub user_agent: String,
    pub accept_language: String,
    /// Raw cookie header string, consumed by the web backend
    pub cookie_header: Option<String>,
    /// Structured cookie list, consumed by the android backend
    pub cookie_jar: Vec<CookieSpec>,
    /// Scratch directory, created on demand
    pub workspace_dir: PathBuf,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            cookie_header: None,
            cookie_jar: Vec::new(),
            workspace_dir: PathBuf::from("tmp"),
        }
    }
}

impl AcquisitionConfig {
    /// Build from environment variables; only the binary calls this.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(ua) = std::env::var("USER_AGENT") {
            if !ua.is_empty() {
                config.user_agent = ua;
            }
        }
        if let Ok(lang) = std::env::var("ACCEPT_LANGUAGE") {
            if !lang.is_empty() {
                config.accept_language = lang;
            }
        }
        if let Ok(raw) = std::env::var("YT_COOKIES") {
            if !raw.is_empty() {
                config.cookie_header = Some(raw);
            }
        }
        if let Ok(json) = std::env::var("YT_COOKIES_JSON") {
            config.cookie_jar = parse_cookie_json(&json);
        }
        if let Ok(dir) = std::env::var("VIDFETCH_TMP") {
            if !dir.is_empty() {
                config.workspace_dir = PathBuf::from(dir);
            }
        }
        config
    }

    pub fn with_cookie_header(mut self, header: Option<String>) -> Self {
        self.cookie_header = header;
        self
    }

    pub fn with_cookie_jar(mut self, jar: Vec<CookieSpec>) -> Self {
        self.cookie_jar = jar;
        self
    }

    pub fn with_workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = dir.into();
        self
    }

    /// Cookie header assembled from the structured jar, for the android
    /// backend. None when the jar is empty.
    pub fn jar_as_header(&self) -> Option<String> {
        if self.cookie_jar.is_empty() {
            return None;
        }
        Some(
            self.cookie_jar
                .iter()
                .map(CookieSpec::header_pair)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Netscape-format cookie file contents for the external extractor.
    ///
    /// Prefers the structured jar (filtered to youtube.com), falling back
    /// to splitting the raw header string. None when no cookies exist.
    pub fn netscape_cookie_contents(&self) -> Option<String> {
        let mut cookies: Vec<CookieSpec> = self
            .cookie_jar
            .iter()
            .filter(|c| {
                c.domain
                    .as_deref()
                    .map(|d| d.contains("youtube.com"))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        if cookies.is_empty() {
            if let Some(raw) = &self.cookie_header {
                cookies = parse_cookie_header(raw);
            }
        }
        if cookies.is_empty() {
            return None;
        }

        let expires = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
            + COOKIE_TTL_SECS;

        let mut out = String::from("# Netscape HTTP Cookie File\n");
        for cookie in &cookies {
            out.push_str(&cookie.netscape_line(expires));
            out.push('\n');
        }
        Some(out)
    }
}

/// Parse the structured cookie list; anything malformed yields an empty jar.
pub fn parse_cookie_json(json: &str) -> Vec<CookieSpec> {
    serde_json::from_str::<Vec<CookieSpec>>(json).unwrap_or_default()
}

/// Split a raw `k=v; k2=v2` cookie header into structured cookies.
fn parse_cookie_header(raw: &str) -> Vec<CookieSpec> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (name, value) = match pair.find('=') {
                Some(eq) => (pair[..eq].trim(), pair[eq + 1..].trim()),
                None => (pair, ""),
            };
            CookieSpec {
                name: name.to_string(),
                value: value.to_string(),
                domain: Some(".youtube.com".to_string()),
                path: Some("/".to_string()),
                secure: true,
            }
        })
        .collect()
}
