use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "SCHOOLD_WORKSPACE";
pub const LOG_ENV: &str = "SCHOOLD_LOG";
pub const MEMORY_QUOTA_ENV: &str = "SCHOOLD_MEMORY_QUOTA";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub log_filter: Option<String>,
    pub memory_quota: Option<usize>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let memory_quota = non_empty(MEMORY_QUOTA_ENV).and_then(|raw| match raw.parse::<usize>() {
            Ok(n) => Some(n),
            Err(_) => {
                // Logging is not up yet at this point.
                eprintln!("ignoring {}={:?}: not a byte count", MEMORY_QUOTA_ENV, raw);
                None
            }
        });
        Self {
            workspace: non_empty(WORKSPACE_ENV).map(PathBuf::from),
            log_filter: non_empty(LOG_ENV),
            memory_quota,
        }
    }
}
