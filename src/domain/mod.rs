// Domain layer: wire-level models and the ports adapters implement.

pub mod model;
pub mod ports;
