/// Errors that abort a reducer's transaction
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReducerError {
    /// The world config singleton is absent. Never expected after init.
    #[error("World config not found")]
    ConfigMissing,
    #[error("Constraint violation on {table}.{column}: duplicate value {value}")]
    ConstraintViolation {
        table: &'static str,
        column: &'static str,
        value: String,
    },
    #[error("World size {world_size} cannot contain a food circle of radius {radius}")]
    InvalidWorldBounds { world_size: u64, radius: f32 },
    #[error("Recurring job interval must be non-zero")]
    InvalidSchedule,
    #[error("Invalid spawn rules: {0}")]
    InvalidRules(String),
}

impl ReducerError {
    /// Failures that indicate a broken world rather than a bad request
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReducerError::ConfigMissing)
    }
}
