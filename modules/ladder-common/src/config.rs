use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use tracing::info;

use crate::error::LadderError;

pub const DEFAULT_LEADERBOARD_URL: &str = "https://royaleapi.com/players/leaderboard?lang=en";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Scraping
    pub leaderboard_url: String,
    pub user_agent: String,
    pub fetch_timeout: Duration,
    pub scrape_cooldown: Duration,

    // Persistence
    pub data_dir: PathBuf,

    // Schedule
    pub points_interval: Duration,
    pub leaderboard_interval: Duration,
    pub daily_report_at: NaiveTime,
    pub health_check_interval: Duration,

    // Reporting
    pub webhook_url: Option<String>,
}

impl Config {
    /// Load configuration for admin and one-shot commands. No credentials needed.
    pub fn from_env() -> Result<Self, LadderError> {
        Ok(Self {
            leaderboard_url: env::var("LEADERBOARD_URL")
                .unwrap_or_else(|_| DEFAULT_LEADERBOARD_URL.to_string()),
            user_agent: env::var("LEADERBOARD_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            fetch_timeout: secs_env("FETCH_TIMEOUT_SECS", 15)?,
            scrape_cooldown: secs_env("SCRAPE_COOLDOWN_SECS", 30)?,
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            points_interval: secs_env("POINTS_INTERVAL_SECS", 3600)?,
            leaderboard_interval: secs_env("LEADERBOARD_INTERVAL_SECS", 3600)?,
            daily_report_at: parsed_env(
                "DAILY_REPORT_AT",
                NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
                |raw| NaiveTime::parse_from_str(raw, "%H:%M").ok(),
            )?,
            health_check_interval: secs_env("HEALTH_CHECK_INTERVAL_SECS", 300)?,
            webhook_url: env::var("TRACKER_WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
        })
    }

    /// Load configuration for the scheduled daemon, which must be able to report.
    pub fn daemon_from_env() -> Result<Self, LadderError> {
        let config = Self::from_env()?;
        if config.webhook_url.is_none() {
            return Err(LadderError::Config(
                "TRACKER_WEBHOOK_URL environment variable is required".to_string(),
            ));
        }
        Ok(config)
    }

    /// Log the effective configuration without the webhook secret.
    pub fn log_redacted(&self) {
        info!(
            leaderboard_url = %self.leaderboard_url,
            fetch_timeout_secs = self.fetch_timeout.as_secs(),
            scrape_cooldown_secs = self.scrape_cooldown.as_secs(),
            data_dir = %self.data_dir.display(),
            points_interval_secs = self.points_interval.as_secs(),
            leaderboard_interval_secs = self.leaderboard_interval.as_secs(),
            daily_report_at = %self.daily_report_at.format("%H:%M"),
            health_check_interval_secs = self.health_check_interval.as_secs(),
            webhook = if self.webhook_url.is_some() { "[set]" } else { "[unset]" },
            "Loaded config"
        );
    }
}

fn secs_env(key: &str, default: u64) -> Result<Duration, LadderError> {
    parsed_env(key, Duration::from_secs(default), |raw| {
        u64::from_str(raw.trim()).ok().map(Duration::from_secs)
    })
}

fn parsed_env<T>(
    key: &str,
    default: T,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<T, LadderError> {
    match env::var(key) {
        Ok(raw) => parse(&raw)
            .ok_or_else(|| LadderError::Config(format!("{key} has an invalid value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_var_uses_default() {
        let parsed = parsed_env("LADDER_TEST_UNSET_VAR", 5u64, |raw| raw.parse().ok());
        assert_eq!(parsed.unwrap(), 5);
    }

    #[test]
    fn unparsable_var_is_config_error() {
        // PATH is always set and never a bare integer.
        let parsed = parsed_env("PATH", 5u64, |raw| raw.parse().ok());
        assert!(matches!(parsed, Err(LadderError::Config(_))));
    }

    #[test]
    fn report_time_format() {
        assert_eq!(
            NaiveTime::parse_from_str("09:30", "%H:%M").ok(),
            NaiveTime::from_hms_opt(9, 30, 0)
        );
    }
}
