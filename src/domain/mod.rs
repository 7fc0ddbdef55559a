// Domain layer: service records and ports (traits). Implementations live in adapters/ and config/.

pub mod model;
pub mod ports;
