pub mod app;
pub mod components;
pub mod conversations;
pub mod intake;
pub mod message_store;
pub mod state;

pub use app::{ChatApp, Launch};
pub use state::ChatViewState;
