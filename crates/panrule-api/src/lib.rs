// panrule-api: Async Rust client for the PAN-OS XML configuration API

pub mod client;
pub mod error;
pub mod platform;
pub mod system;
pub mod transport;
pub mod xml;
pub mod xpath;

pub use platform::Platform;
pub use client::{MoveWhere, MultiConfigOp, XmlApiClient};
pub use error::Error;
pub use system::SystemInfo;
pub use transport::{TlsMode, TransportConfig};
pub use xml::XmlNode;
