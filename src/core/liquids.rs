use crate::domain::model::{LabwareHandle, LiquidHandle, LiquidRecord, Volume, VolumeUnit};
use crate::domain::ports::RobotSession;
use crate::utils::error::{ProtocolError, Result};
use std::collections::HashSet;

/// Registers every liquid and seeds its starting well on `rack`.
///
/// Names are checked across the whole table before the first registration,
/// so a repeated name leaves the session untouched.
pub fn load_liquids<S: RobotSession + ?Sized>(
    session: &mut S,
    rack: LabwareHandle,
    records: &[LiquidRecord],
    unit: VolumeUnit,
) -> Result<Vec<LiquidHandle>> {
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.name.as_str()) {
            return Err(ProtocolError::DuplicateLiquidError {
                name: record.name.clone(),
            });
        }
    }

    let mut handles = Vec::with_capacity(records.len());
    for record in records {
        let liquid = session.register_liquid(&record.name, &record.description, &record.color)?;
        let volume = Volume::from_unit(record.initial_volume, unit);
        session.load_liquid(rack, &record.well_location, liquid, volume)?;

        tracing::debug!(
            "Loaded {} ({}) into {} [{}]",
            record.name,
            volume,
            rack,
            record.well_location
        );
        handles.push(liquid);
    }

    tracing::info!("Defined {} starting liquids", handles.len());
    Ok(handles)
}
