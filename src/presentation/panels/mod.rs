pub mod console;
pub mod control;
pub mod devices;
pub mod tuning;
