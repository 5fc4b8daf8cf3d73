// Adapters layer: concrete implementations of the domain ports (storage, table sources, robot session).

pub mod labware;
pub mod simulator;
pub mod source;
pub mod storage;
