mod handler;
mod message;
mod session;

pub use handler::ws_handler;
pub use message::{reply, Action, ClientFrame, SubscriptionMessage};
pub use session::Session;
