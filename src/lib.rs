pub mod analysis;
pub mod config;
pub mod cost;
pub mod error;
pub mod events;
pub mod findings;
pub mod graph;
pub mod introspection;
pub mod phase;
pub mod request;
pub mod routes;
pub mod secrets;
pub mod session;
pub mod startup;
pub mod state;
pub mod status;
pub mod transport;
