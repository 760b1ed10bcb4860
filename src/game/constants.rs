/// World bootstrap constants
pub mod world {
    /// Side length of the square world, in world units
    /// ENV: WORLD_SIZE
    pub const SIZE: u64 = 1000;
    /// Largest world side length; every coordinate up to it is exact in f32
    pub const MAX_SIZE: u64 = 1 << 24;
}

/// Food population constants
pub mod food {
    /// Smallest food mass (inclusive)
    /// ENV: FOOD_MASS_MIN
    pub const MASS_MIN: u32 = 2;
    /// Food mass upper bound (exclusive)
    /// ENV: FOOD_MASS_MAX
    pub const MASS_MAX: u32 = 4;
    /// Food count the spawner tops the world up to
    /// ENV: TARGET_FOOD_COUNT
    pub const TARGET_COUNT: u64 = 600;
}

/// Recurring spawn job constants
pub mod spawn {
    /// Interval between spawner ticks in milliseconds
    /// ENV: SPAWN_INTERVAL_MS
    pub const INTERVAL_MS: u64 = 500;
    /// How often the scheduler re-checks the job table when no job is registered
    pub const IDLE_POLL_MS: u64 = 100;
}

/// Calculate radius from mass
#[inline]
pub fn mass_to_radius(mass: u32) -> f32 {
    (mass as f32).sqrt()
}
