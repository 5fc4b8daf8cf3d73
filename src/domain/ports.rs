use crate::domain::model::{
    DeckSlot, InstrumentHandle, LabwareHandle, LiquidHandle, Location, ModuleHandle, Mount,
    Volume,
};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Produces the raw text of one table, rows in order.
#[async_trait]
pub trait TableSource: Send + Sync {
    async fn read_table(&self) -> Result<String>;

    /// Human readable origin, used in logs and dry-run output.
    fn describe(&self) -> String {
        "table".to_string()
    }
}

/// Capability surface of the robot-control runtime.
///
/// Every call blocks until the robot has finished the step. Implementations
/// report failures with the matching error kind: `Labware` for deck setup,
/// `Registration` for liquid setup, `TipExhausted` for an empty tip supply
/// and `Transfer` for aspirate/dispense rejections.
pub trait RobotSession {
    fn load_vessel_rack(&mut self, load_name: &str, slot: DeckSlot) -> Result<LabwareHandle>;

    /// Thermocyclers occupy a fixed footprint and take no slot.
    fn load_module(&mut self, model: &str, slot: Option<DeckSlot>) -> Result<ModuleHandle>;

    fn load_module_labware(&mut self, module: ModuleHandle, load_name: &str)
        -> Result<LabwareHandle>;

    fn open_lid(&mut self, module: ModuleHandle) -> Result<()>;

    fn load_instrument(
        &mut self,
        instrument_name: &str,
        mount: Mount,
        tip_racks: &[LabwareHandle],
    ) -> Result<InstrumentHandle>;

    fn set_starting_tip(
        &mut self,
        pipette: InstrumentHandle,
        tip_rack: LabwareHandle,
        well: &str,
    ) -> Result<()>;

    fn register_liquid(
        &mut self,
        name: &str,
        description: &str,
        display_color: &str,
    ) -> Result<LiquidHandle>;

    fn load_liquid(
        &mut self,
        labware: LabwareHandle,
        well: &str,
        liquid: LiquidHandle,
        volume: Volume,
    ) -> Result<()>;

    fn pick_up_tip(&mut self, pipette: InstrumentHandle) -> Result<()>;

    fn aspirate(&mut self, pipette: InstrumentHandle, volume: Volume, location: &Location)
        -> Result<()>;

    fn dispense(&mut self, pipette: InstrumentHandle, volume: Volume, location: &Location)
        -> Result<()>;

    fn drop_tip(&mut self, pipette: InstrumentHandle) -> Result<()>;
}
