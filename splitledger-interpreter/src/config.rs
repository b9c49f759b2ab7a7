use splitledger_domain::{CurrencyContext, CurrencyError, GroupId};
use thiserror::Error;

const SCALE_VAR: &str = "SPLITLEDGER_SCALE";
const GROUP_VAR: &str = "SPLITLEDGER_GROUP";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SPLITLEDGER_SCALE must be a non-negative integer (found '{0}')")]
    InvalidScale(String),
    #[error(transparent)]
    UnsupportedScale(#[from] CurrencyError),
    #[error("SPLITLEDGER_GROUP must be a group id (found '{0}')")]
    InvalidGroup(String),
}

/// Runtime settings read from the environment (and `.env`, when present).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppConfig {
    pub context: CurrencyContext,
    /// Restricts output to one group; `None` reports every group.
    pub group: Option<GroupId>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let context = match lookup(SCALE_VAR) {
            Some(raw) => {
                let scale = raw
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| ConfigError::InvalidScale(raw.clone()))?;
                CurrencyContext::try_new(scale)?
            }
            None => CurrencyContext::default(),
        };

        let group = lookup(GROUP_VAR)
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map(GroupId)
                    .map_err(|_| ConfigError::InvalidGroup(raw.clone()))
            })
            .transpose()?;

        Ok(Self { context, group })
    }
}
