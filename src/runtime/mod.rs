mod channel;
mod context;
mod registry;

pub use channel::{Channel, ChannelEvent, ChannelOptions};
pub use context::Context;
pub use registry::Registry;
