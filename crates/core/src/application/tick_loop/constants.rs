// Tick loop constants (no magic values)
use std::time::Duration;

/// Interval between two ticks of the garage loop (1s)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Number of repair bays seeded on first start
pub const DEFAULT_SLOT_COUNT: u32 = 2;
