// Domain layer: records, handles and the ports the protocol core talks through.

pub mod model;
pub mod ports;
