pub mod behaviour;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod exchange;
pub mod fabric;
pub mod identity;
pub mod manager;
pub mod message;
pub mod node;
pub mod payload;
pub mod probe;
pub mod state;
pub mod transport;

pub use config::{NodeConfig, ProbeTuning};
pub use error::P2pError;
pub use exchange::{ExchangeClient, ExchangeLatency, ReqwestExchangeClient, SecondaryExchangeLatency};
pub use fabric::Fabric;
pub use message::Message;
pub use node::Node;
pub use payload::{Payload, RequestType};
pub use state::FabricState;
