use std::time::Duration;

pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(5 * 60);
