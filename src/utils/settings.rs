//! Per-run research settings.
//!
//! Values are resolved once when a run starts, in order of precedence:
//! explicit per-run override, environment variable, `[research]` section of
//! `atlas.toml`, built-in default. The resolved [`ResearchSettings`] travel
//! with the run's checkpoint so a resumed run keeps the settings it started
//! with, even if the configuration file changed in the meantime.

use crate::utils::toml_config::ResearchConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Default tool-loop ceiling for a single agent invocation.
pub const DEFAULT_AGENT_RECURSION_LIMIT: usize = 25;

pub const ENV_MAX_PLAN_ITERATIONS: &str = "MAX_PLAN_ITERATIONS";
pub const ENV_MAX_STEP_NUM: &str = "MAX_STEP_NUM";
pub const ENV_MAX_SEARCH_RESULTS: &str = "MAX_SEARCH_RESULTS";
pub const ENV_ENABLE_DEEP_THINKING: &str = "ENABLE_DEEP_THINKING";
pub const ENV_ENABLE_BACKGROUND_INVESTIGATION: &str = "ENABLE_BACKGROUND_INVESTIGATION";
pub const ENV_AUTO_ACCEPTED_PLAN: &str = "AUTO_ACCEPTED_PLAN";
pub const ENV_RECURSION_LIMIT: &str = "RECURSION_LIMIT";
pub const ENV_AGENT_RECURSION_LIMIT: &str = "AGENT_RECURSION_LIMIT";

/// Fully resolved settings for one research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSettings {
    pub max_plan_iterations: u32,
    pub max_step_num: usize,
    pub max_search_results: usize,
    pub enable_deep_thinking: bool,
    pub enable_background_investigation: bool,
    pub auto_accepted_plan: bool,
    pub recursion_limit: usize,
    pub agent_recursion_limit: usize,
    pub planner_stream_timeout_secs: u64,
    pub locale: String,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self::resolve_with(&ResearchConfig::default(), &RunOverrides::default(), |_| None)
    }
}

/// Explicit per-run settings supplied by the caller (CLI flags, request body).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOverrides {
    #[serde(default)]
    pub max_plan_iterations: Option<u32>,
    #[serde(default)]
    pub max_step_num: Option<usize>,
    #[serde(default)]
    pub max_search_results: Option<usize>,
    #[serde(default)]
    pub enable_deep_thinking: Option<bool>,
    #[serde(default)]
    pub enable_background_investigation: Option<bool>,
    #[serde(default)]
    pub auto_accepted_plan: Option<bool>,
    #[serde(default)]
    pub locale: Option<String>,
}

impl ResearchSettings {
    /// Resolve settings against the process environment.
    pub fn resolve(config: &ResearchConfig, overrides: &RunOverrides) -> Self {
        Self::resolve_with(config, overrides, |name| std::env::var(name).ok())
    }

    /// Resolve settings with an injectable environment lookup.
    pub fn resolve_with<F>(config: &ResearchConfig, overrides: &RunOverrides, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            max_plan_iterations: overrides
                .max_plan_iterations
                .or_else(|| env_parse(&env, ENV_MAX_PLAN_ITERATIONS))
                .unwrap_or(config.max_plan_iterations),
            max_step_num: overrides
                .max_step_num
                .or_else(|| env_parse(&env, ENV_MAX_STEP_NUM))
                .unwrap_or(config.max_step_num),
            max_search_results: overrides
                .max_search_results
                .or_else(|| env_parse(&env, ENV_MAX_SEARCH_RESULTS))
                .unwrap_or(config.max_search_results),
            enable_deep_thinking: overrides
                .enable_deep_thinking
                .or_else(|| env_bool(&env, ENV_ENABLE_DEEP_THINKING))
                .unwrap_or(config.enable_deep_thinking),
            enable_background_investigation: overrides
                .enable_background_investigation
                .or_else(|| env_bool(&env, ENV_ENABLE_BACKGROUND_INVESTIGATION))
                .unwrap_or(config.enable_background_investigation),
            auto_accepted_plan: overrides
                .auto_accepted_plan
                .or_else(|| env_bool(&env, ENV_AUTO_ACCEPTED_PLAN))
                .unwrap_or(config.auto_accepted_plan),
            recursion_limit: env_parse::<usize, _>(&env, ENV_RECURSION_LIMIT)
                .filter(|limit| *limit > 0)
                .unwrap_or(config.recursion_limit),
            agent_recursion_limit: agent_recursion_limit(&env, config.agent_recursion_limit),
            planner_stream_timeout_secs: config.planner_stream_timeout_secs,
            locale: overrides
                .locale
                .clone()
                .filter(|locale| !locale.trim().is_empty())
                .unwrap_or_else(|| config.locale.clone()),
        }
    }
}

/// Parse `value` as a positive limit, falling back to `default` otherwise.
pub fn positive_or_default(value: &str, default: usize) -> usize {
    match value.trim().parse::<i64>() {
        Ok(parsed) if parsed > 0 => parsed as usize,
        Ok(parsed) => {
            warn!(
                "Recursion limit '{}' must be positive, using default value {}",
                parsed, default
            );
            default
        }
        Err(_) => {
            warn!(
                "Invalid recursion limit '{}', using default value {}",
                value, default
            );
            default
        }
    }
}

fn agent_recursion_limit<F>(env: &F, configured: i64) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = env(ENV_AGENT_RECURSION_LIMIT) {
        return positive_or_default(&raw, DEFAULT_AGENT_RECURSION_LIMIT);
    }
    if configured > 0 {
        configured as usize
    } else {
        warn!(
            "research.agent_recursion_limit = {} must be positive, using default value {}",
            configured, DEFAULT_AGENT_RECURSION_LIMIT
        );
        DEFAULT_AGENT_RECURSION_LIMIT
    }
}

fn env_parse<T, F>(env: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = env(name)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}='{}': not a valid number", name, raw);
            None
        }
    }
}

fn env_bool<F>(env: &F, name: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    env(name).map(|raw| parse_bool(&raw))
}

/// Truthy strings: `1`, `true`, `yes`, `y`, `on` (case-insensitive).
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_builtin_defaults() {
        let settings = ResearchSettings::default();
        assert_eq!(settings.max_plan_iterations, 1);
        assert_eq!(settings.max_step_num, 3);
        assert_eq!(settings.max_search_results, 3);
        assert!(!settings.enable_deep_thinking);
        assert_eq!(settings.agent_recursion_limit, 25);
        assert_eq!(settings.recursion_limit, 100);
    }

    #[test]
    fn test_precedence_override_env_file() {
        let config = ResearchConfig {
            max_plan_iterations: 2,
            max_step_num: 4,
            max_search_results: 5,
            ..Default::default()
        };
        let overrides = RunOverrides {
            max_plan_iterations: Some(7),
            ..Default::default()
        };
        let env = env_from(&[("MAX_PLAN_ITERATIONS", "9"), ("MAX_STEP_NUM", "6")]);

        let settings = ResearchSettings::resolve_with(&config, &overrides, env);

        assert_eq!(settings.max_plan_iterations, 7); // override beats env
        assert_eq!(settings.max_step_num, 6); // env beats file
        assert_eq!(settings.max_search_results, 5); // file beats default
    }

    #[test]
    fn test_unparsable_env_falls_through() {
        let config = ResearchConfig {
            max_step_num: 4,
            ..Default::default()
        };
        let env = env_from(&[("MAX_STEP_NUM", "lots")]);
        let settings = ResearchSettings::resolve_with(&config, &RunOverrides::default(), env);
        assert_eq!(settings.max_step_num, 4);
    }

    #[test]
    fn test_env_booleans() {
        let env = env_from(&[
            ("AUTO_ACCEPTED_PLAN", "Yes"),
            ("ENABLE_DEEP_THINKING", "on"),
            ("ENABLE_BACKGROUND_INVESTIGATION", "0"),
        ]);
        let settings =
            ResearchSettings::resolve_with(&ResearchConfig::default(), &RunOverrides::default(), env);
        assert!(settings.auto_accepted_plan);
        assert!(settings.enable_deep_thinking);
        assert!(!settings.enable_background_investigation);
    }

    #[test]
    fn test_agent_recursion_limit_fallbacks() {
        let config = ResearchConfig::default();
        let none = RunOverrides::default();

        let valid = ResearchSettings::resolve_with(&config, &none, env_from(&[("AGENT_RECURSION_LIMIT", "40")]));
        assert_eq!(valid.agent_recursion_limit, 40);

        let zero = ResearchSettings::resolve_with(&config, &none, env_from(&[("AGENT_RECURSION_LIMIT", "0")]));
        assert_eq!(zero.agent_recursion_limit, DEFAULT_AGENT_RECURSION_LIMIT);

        let negative = ResearchSettings::resolve_with(&config, &none, env_from(&[("AGENT_RECURSION_LIMIT", "-3")]));
        assert_eq!(negative.agent_recursion_limit, DEFAULT_AGENT_RECURSION_LIMIT);

        let garbage = ResearchSettings::resolve_with(&config, &none, env_from(&[("AGENT_RECURSION_LIMIT", "abc")]));
        assert_eq!(garbage.agent_recursion_limit, DEFAULT_AGENT_RECURSION_LIMIT);

        let file_negative = ResearchConfig {
            agent_recursion_limit: -1,
            ..Default::default()
        };
        let from_file = ResearchSettings::resolve_with(&file_negative, &none, env_from(&[]));
        assert_eq!(from_file.agent_recursion_limit, DEFAULT_AGENT_RECURSION_LIMIT);
    }

    #[test]
    fn test_locale_override() {
        let overrides = RunOverrides {
            locale: Some("zh-CN".to_string()),
            ..Default::default()
        };
        let settings =
            ResearchSettings::resolve_with(&ResearchConfig::default(), &overrides, env_from(&[]));
        assert_eq!(settings.locale, "zh-CN");
    }

    #[test]
    fn test_parse_bool() {
        for truthy in ["1", "true", "TRUE", "yes", "y", "On"] {
            assert!(parse_bool(truthy), "{truthy}");
        }
        for falsy in ["0", "false", "no", "", "maybe"] {
            assert!(!parse_bool(falsy), "{falsy}");
        }
    }
}
