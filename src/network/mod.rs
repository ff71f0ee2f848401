pub mod api;
pub mod capability;
pub mod client;
pub mod socket;
pub mod transport;
pub mod wire;

pub use api::ChatApi;
pub use capability::{AdminCapability, ImpersonationGrant};
pub use client::ChatClient;
pub use socket::{SocketConnector, SocketHandle, SocketIoConnector};
pub use transport::ChatTransport;
pub use wire::DocumentKey;
