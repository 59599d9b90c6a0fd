pub use gateway::*;
pub use memory::*;
pub use monitor::*;
pub use online::*;

mod gateway;
mod memory;
mod monitor;
mod online;
