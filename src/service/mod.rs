pub mod command;
pub mod device;
pub mod http;
pub mod state;
