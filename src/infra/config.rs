use std::env;
use std::str::FromStr;

use crate::infra::AgentError;

/// Tunable thresholds for the decision loop. Orderings are fixed in code;
/// only the numbers live here.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Short-term stuck turns before the recovery chain starts.
    pub stuck_threshold: u32,
    /// Level-lifetime stuck turns before forcing a route to known stairs.
    pub level_stuck_threshold: u32,
    /// Searches issued in place by one recovery chain before moving on.
    pub search_in_place_cap: u32,
    /// Search count after which an unexplored neighbour is treated as solid rock.
    pub solid_search_threshold: u32,
    /// Search candidates searched this often are left out.
    pub search_candidate_cap: u32,
    pub heavy_search_threshold: u32,
    /// Below this HP ratio any visible threat triggers a retreat.
    pub critical_hp_ratio: f32,
    pub recent_capacity: usize,
    pub oscillation_window: usize,
    /// Failed moves toward one target before it is blacklisted.
    pub failed_move_blacklist: u32,
    pub bias_margin: f32,
    pub avoid_penalty: u32,
    pub unexplored_cost: u32,
    pub prefer_far: bool,
    pub pickup: bool,
    pub seed: Option<u64>,
    /// Turn cap for one run; None runs until the environment stops.
    pub turn_budget: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            stuck_threshold: 3,
            level_stuck_threshold: 60,
            search_in_place_cap: 5,
            solid_search_threshold: 15,
            search_candidate_cap: 25,
            heavy_search_threshold: 10,
            critical_hp_ratio: 0.25,
            recent_capacity: 20,
            oscillation_window: 6,
            failed_move_blacklist: 3,
            bias_margin: 0.5,
            avoid_penalty: 20,
            unexplored_cost: 2,
            prefer_far: false,
            pickup: true,
            seed: None,
            turn_budget: Some(5000),
        }
    }
}

fn get_env_var<T: FromStr>(key: &str) -> Result<Option<T>, AgentError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AgentError::Config {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

fn overlay<T: FromStr>(key: &str, field: &mut T) -> Result<(), AgentError> {
    if let Some(value) = get_env_var(key)? {
        *field = value;
    }
    Ok(())
}

impl AgentConfig {
    /// Defaults overlaid with any `DELVEBOT_*` environment variables.
    pub fn from_env() -> Result<Self, AgentError> {
        let mut config = Self::default();
        overlay("DELVEBOT_STUCK_THRESHOLD", &mut config.stuck_threshold)?;
        overlay("DELVEBOT_LEVEL_STUCK_THRESHOLD", &mut config.level_stuck_threshold)?;
        overlay("DELVEBOT_SEARCH_IN_PLACE_CAP", &mut config.search_in_place_cap)?;
        overlay("DELVEBOT_SOLID_SEARCH_THRESHOLD", &mut config.solid_search_threshold)?;
        overlay("DELVEBOT_SEARCH_CANDIDATE_CAP", &mut config.search_candidate_cap)?;
        overlay("DELVEBOT_HEAVY_SEARCH_THRESHOLD", &mut config.heavy_search_threshold)?;
        overlay("DELVEBOT_CRITICAL_HP_RATIO", &mut config.critical_hp_ratio)?;
        overlay("DELVEBOT_RECENT_CAPACITY", &mut config.recent_capacity)?;
        overlay("DELVEBOT_OSCILLATION_WINDOW", &mut config.oscillation_window)?;
        overlay("DELVEBOT_FAILED_MOVE_BLACKLIST", &mut config.failed_move_blacklist)?;
        overlay("DELVEBOT_BIAS_MARGIN", &mut config.bias_margin)?;
        overlay("DELVEBOT_AVOID_PENALTY", &mut config.avoid_penalty)?;
        overlay("DELVEBOT_UNEXPLORED_COST", &mut config.unexplored_cost)?;
        overlay("DELVEBOT_PREFER_FAR", &mut config.prefer_far)?;
        overlay("DELVEBOT_PICKUP", &mut config.pickup)?;
        if let Some(seed) = get_env_var("DELVEBOT_SEED")? {
            config.seed = Some(seed);
        }
        if let Some(budget) = get_env_var::<u64>("DELVEBOT_TURN_BUDGET")? {
            config.turn_budget = (budget > 0).then_some(budget);
        }

        if !(0.0..=1.0).contains(&config.critical_hp_ratio) {
            return Err(AgentError::Config {
                key: "DELVEBOT_CRITICAL_HP_RATIO".to_string(),
                value: config.critical_hp_ratio.to_string(),
            });
        }
        Ok(config)
    }
}
