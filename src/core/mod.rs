pub mod deck;
pub mod engine;
pub mod liquids;
pub mod report;
pub mod table;
pub mod transfers;

pub use crate::domain::model::{LiquidRecord, TransferRecord, Volume, VolumeUnit};
pub use crate::domain::ports::{RobotSession, Storage, TableSource};
pub use crate::utils::error::Result;
