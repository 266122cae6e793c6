// Client module
// Consumer side of the link: status tracking and a reconnecting listener

pub mod listener;
pub mod status;

pub use listener::{ClientConfig, ClientError, ClientEvent, ClientHandle, DrumstickClient};
pub use status::DrumstickStatus;
