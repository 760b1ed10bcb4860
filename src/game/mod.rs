pub mod constants;
pub mod scheduler;
pub mod systems;
pub mod tables;
