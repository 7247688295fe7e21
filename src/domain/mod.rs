pub mod command;
pub mod console;
pub mod discovery;
pub mod error;
pub mod joystick;
pub mod link;
pub mod models;
pub mod session;
pub mod settings;
pub mod timer;
pub mod tuning;
