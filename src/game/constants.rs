pub const DEFAULT_WIDTH: i32 = 40;
pub const DEFAULT_HEIGHT: i32 = 30;
pub const DEFAULT_TICK_MS: u64 = 120;
pub const DEFAULT_START_LENGTH: usize = 3;
pub const DEFAULT_FOOD_COUNT: usize = 5;

pub const MAX_SPAWN_ATTEMPTS: usize = 100;
pub const MAX_RANDOM_PROBES: usize = 100;
pub const SPAWN_EDGE_MARGIN: i32 = 2;

pub const STATS_LOG_INTERVAL_TICKS: u64 = 100;
pub const BROADCAST_LOG_INTERVAL: u64 = 50;
