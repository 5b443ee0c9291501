use crate::game::constants::{
    DEFAULT_FOOD_COUNT, DEFAULT_HEIGHT, DEFAULT_START_LENGTH, DEFAULT_TICK_MS, DEFAULT_WIDTH,
};
use serde::Serialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 10001;
const DEFAULT_SEND_TIMEOUT_MS: u64 = 1000;
const DEFAULT_OUTBOUND_BUFFER: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}: cannot parse {value:?}")]
    Unparsable { key: &'static str, value: String },

    #[error("{key}: {reason}")]
    OutOfRange { key: &'static str, reason: String },
}

/// Board and pacing parameters shared by the simulation and the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct GameConfig {
    pub width: i32,
    pub height: i32,
    pub tick_ms: u64,
    pub start_length: usize,
    pub food_count: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            tick_ms: DEFAULT_TICK_MS,
            start_length: DEFAULT_START_LENGTH,
            food_count: DEFAULT_FOOD_COUNT,
        }
    }
}

impl GameConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub send_timeout_ms: u64,
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

impl ServerConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub game: GameConfig,
    pub server: ServerConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let port = match read(&lookup, "SERVER_PORT")? {
            Some(port) => Some(port),
            None => read(&lookup, "PORT")?,
        };

        let config = Config {
            game: GameConfig {
                width: read(&lookup, "BOARD_WIDTH")?.unwrap_or(defaults.game.width),
                height: read(&lookup, "BOARD_HEIGHT")?.unwrap_or(defaults.game.height),
                tick_ms: read(&lookup, "TICK_MS")?.unwrap_or(defaults.game.tick_ms),
                start_length: read(&lookup, "START_LENGTH")?
                    .unwrap_or(defaults.game.start_length),
                food_count: read(&lookup, "FOOD_COUNT")?.unwrap_or(defaults.game.food_count),
            },
            server: ServerConfig {
                port: port.unwrap_or(defaults.server.port),
                send_timeout_ms: read(&lookup, "SEND_TIMEOUT_MS")?
                    .unwrap_or(defaults.server.send_timeout_ms),
                outbound_buffer: read(&lookup, "OUTBOUND_BUFFER")?
                    .unwrap_or(defaults.server.outbound_buffer),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let game = &self.game;
        if game.width < 1 {
            return Err(out_of_range("BOARD_WIDTH", "must be at least 1"));
        }
        if game.height < 1 {
            return Err(out_of_range("BOARD_HEIGHT", "must be at least 1"));
        }
        if game.tick_ms < 1 {
            return Err(out_of_range("TICK_MS", "must be at least 1"));
        }
        if game.start_length < 1 || game.start_length > game.width as usize {
            return Err(out_of_range(
                "START_LENGTH",
                &format!("must be between 1 and the board width ({})", game.width),
            ));
        }
        if self.server.outbound_buffer < 1 {
            return Err(out_of_range("OUTBOUND_BUFFER", "must be at least 1"));
        }
        Ok(())
    }
}

fn read<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else { return Ok(None) };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Unparsable {
            key,
            value: raw.clone(),
        })
}

fn out_of_range(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::OutOfRange {
        key,
        reason: reason.to_string(),
    }
}
