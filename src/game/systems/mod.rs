pub mod food;
pub mod lifecycle;
