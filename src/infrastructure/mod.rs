pub mod logging;
pub mod scheduler;
pub mod serial;
pub mod worker;
