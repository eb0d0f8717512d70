use crate::annotation::Styling;
use crate::domain::Timeframe;
use crate::engine::Confirmation;
use crate::orchestration::EngineSettings;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Coarse to fine.
    pub timeframes: Vec<Timeframe>,
    pub lookback_bars: usize,
    pub line_thickness: u32,
    pub chart_timeframe: Timeframe,
    pub confirmation: Confirmation,
    pub styles: BTreeMap<Timeframe, Styling>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let data_dir = env_map
            .get("SR_DATA_DIR")
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingEnv("SR_DATA_DIR".to_string()))?;

        let timeframes = parse_timeframes(
            env_map
                .get("SR_TIMEFRAMES")
                .map(|s| s.as_str())
                .unwrap_or("D1,H4"),
        )?;

        let lookback_bars = parse_positive(&env_map, "SR_LOOKBACK_BARS", 60)?;
        let line_thickness = parse_positive(&env_map, "SR_LINE_THICKNESS", 1)?;
        let line_thickness = u32::try_from(line_thickness).map_err(|_| {
            ConfigError::InvalidValue(
                "SR_LINE_THICKNESS".to_string(),
                "must fit in a u32".to_string(),
            )
        })?;

        let chart_timeframe = match env_map.get("SR_CHART_TIMEFRAME") {
            Some(raw) => raw.parse::<Timeframe>().map_err(|e| {
                ConfigError::InvalidValue("SR_CHART_TIMEFRAME".to_string(), e.to_string())
            })?,
            None => timeframes.last().copied().ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SR_TIMEFRAMES".to_string(),
                    "at least one timeframe is required".to_string(),
                )
            })?,
        };

        let confirmation = match env_map
            .get("SR_DIRECTIONAL_CONFIRMATION")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
            .unwrap_or("false")
        {
            "true" | "1" => Confirmation::Directional,
            "false" | "0" => Confirmation::Recorded,
            other => {
                return Err(ConfigError::InvalidValue(
                    "SR_DIRECTIONAL_CONFIRMATION".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        let mut styles = BTreeMap::new();
        for (position, &timeframe) in timeframes.iter().enumerate() {
            let (default_support, default_resistance) = match position {
                1 => ("Blue", "Orange"),
                _ => ("Green", "Red"),
            };
            let support = parse_color(
                &env_map,
                &format!("SR_{}_SUPPORT_COLOR", timeframe.label()),
                default_support,
            )?;
            let resistance = parse_color(
                &env_map,
                &format!("SR_{}_RESISTANCE_COLOR", timeframe.label()),
                default_resistance,
            )?;
            styles.insert(timeframe, Styling::new(&support, &resistance, line_thickness));
        }

        Ok(Config {
            data_dir,
            timeframes,
            lookback_bars,
            line_thickness,
            chart_timeframe,
            confirmation,
            styles,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            lookback_bars: self.lookback_bars,
            confirmation: self.confirmation,
        }
    }

    /// Styling for `timeframe`, falling back to Green/Red.
    pub fn styling(&self, timeframe: Timeframe) -> Styling {
        self.styles
            .get(&timeframe)
            .cloned()
            .unwrap_or_else(|| Styling::new("Green", "Red", self.line_thickness))
    }
}

fn parse_timeframes(raw: &str) -> Result<Vec<Timeframe>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue("SR_TIMEFRAMES".to_string(), reason);

    let timeframes = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Timeframe>().map_err(|e| invalid(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    if timeframes.is_empty() {
        return Err(invalid("at least one timeframe is required".to_string()));
    }
    if !timeframes.windows(2).all(|pair| pair[0] > pair[1]) {
        return Err(invalid(format!(
            "must be listed strictly coarse to fine, got {}",
            raw
        )));
    }
    Ok(timeframes)
}

fn parse_positive(
    env_map: &HashMap<String, String>,
    key: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    let Some(raw) = env_map.get(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be a positive integer".to_string(),
        )),
    }
}

fn parse_color(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<String, ConfigError> {
    match env_map.get(key).map(|s| s.trim()) {
        None => Ok(default.to_string()),
        Some("") => Err(ConfigError::InvalidValue(
            key.to_string(),
            "must not be empty".to_string(),
        )),
        Some(color) => Ok(color.to_string()),
    }
}
