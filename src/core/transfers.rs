use crate::domain::model::{
    InstrumentHandle, LabwareHandle, Location, TransferRecord, Volume, VolumeUnit, WellAnchor,
};
use crate::domain::ports::RobotSession;
use crate::utils::error::Result;
use serde::Serialize;

/// What every transfer row is executed against.
#[derive(Debug, Clone, Copy)]
pub struct TransferPlan {
    pub pipette: InstrumentHandle,
    pub source: LabwareHandle,
    pub destination: LabwareHandle,
    pub unit: VolumeUnit,
    pub aspirate_at: WellAnchor,
    pub dispense_at: WellAnchor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferReport {
    pub transfers_completed: usize,
    pub tips_used: usize,
    pub volume_moved: Volume,
}

/// A tip on the pipette. Dropping the guard without calling `discard`
/// still sends the tip to the trash, so failed cycles never keep a tip.
struct MountedTip<'a, S: RobotSession + ?Sized> {
    session: &'a mut S,
    pipette: InstrumentHandle,
    discarded: bool,
}

impl<'a, S: RobotSession + ?Sized> MountedTip<'a, S> {
    fn pick_up(session: &'a mut S, pipette: InstrumentHandle) -> Result<Self> {
        session.pick_up_tip(pipette)?;
        Ok(Self {
            session,
            pipette,
            discarded: false,
        })
    }

    fn aspirate(&mut self, volume: Volume, location: &Location) -> Result<()> {
        self.session.aspirate(self.pipette, volume, location)
    }

    fn dispense(&mut self, volume: Volume, location: &Location) -> Result<()> {
        self.session.dispense(self.pipette, volume, location)
    }

    fn discard(mut self) -> Result<()> {
        self.discarded = true;
        self.session.drop_tip(self.pipette)
    }
}

impl<S: RobotSession + ?Sized> Drop for MountedTip<'_, S> {
    fn drop(&mut self) {
        if self.discarded {
            return;
        }
        tracing::warn!("Cycle aborted, dropping tip on {}", self.pipette);
        if let Err(e) = self.session.drop_tip(self.pipette) {
            tracing::warn!("Could not drop tip on {} after failure: {}", self.pipette, e);
        }
    }
}

/// One pick-up, aspirate, dispense, drop cycle per row, in row order.
/// The first failure aborts the batch; finished transfers are not undone.
pub fn execute_transfers<S: RobotSession + ?Sized>(
    session: &mut S,
    plan: &TransferPlan,
    records: &[TransferRecord],
) -> Result<TransferReport> {
    let mut report = TransferReport::default();

    for (index, record) in records.iter().enumerate() {
        let volume = Volume::from_unit(record.volume, plan.unit);
        let source = Location::new(plan.source, record.source_well.clone(), plan.aspirate_at);
        let destination = Location::new(
            plan.destination,
            record.destination_well.clone(),
            plan.dispense_at,
        );

        tracing::debug!(
            "Transfer {}/{}: {} from {} to {}",
            index + 1,
            records.len(),
            volume,
            source,
            destination
        );

        let mut tip = MountedTip::pick_up(&mut *session, plan.pipette)?;
        report.tips_used += 1;
        tip.aspirate(volume, &source)?;
        tip.dispense(volume, &destination)?;
        tip.discard()?;

        report.transfers_completed += 1;
        report.volume_moved = report.volume_moved + volume;
    }

    tracing::info!(
        "Completed {} transfers ({} moved)",
        report.transfers_completed,
        report.volume_moved
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::simulator::{SessionCommand, SimulatedSession};
    use crate::domain::model::{DeckSlot, Mount};
    use crate::utils::error::ProtocolError;

    struct Deck {
        session: SimulatedSession,
        plan: TransferPlan,
        tips: LabwareHandle,
    }

    fn deck() -> Deck {
        let mut session = SimulatedSession::new();
        let tips = session
            .load_vessel_rack("opentrons_96_tiprack_20ul", DeckSlot(1))
            .unwrap();
        let rack = session
            .load_vessel_rack("opentrons_15_tuberack_falcon_15ml_conical", DeckSlot(5))
            .unwrap();
        let plate = session
            .load_vessel_rack("nest_96_wellplate_100ul_pcr_full_skirt", DeckSlot(2))
            .unwrap();
        let pipette = session
            .load_instrument("p20_single_gen2", Mount::Left, &[tips])
            .unwrap();

        Deck {
            session,
            tips,
            plan: TransferPlan {
                pipette,
                source: rack,
                destination: plate,
                unit: VolumeUnit::Microliters,
                aspirate_at: WellAnchor::Top { offset_mm: -35.0 },
                dispense_at: WellAnchor::Default,
            },
        }
    }

    fn transfer(source: &str, destination: &str, volume: f64) -> TransferRecord {
        TransferRecord {
            source_well: source.to_string(),
            destination_well: destination.to_string(),
            volume,
        }
    }

    #[test]
    fn test_one_cycle_per_row_in_order() {
        let Deck {
            mut session, plan, ..
        } = deck();
        let records = vec![transfer("A1", "A2", 15.0), transfer("A2", "A6", 15.0)];

        let report = execute_transfers(&mut session, &plan, &records).unwrap();

        assert_eq!(report.transfers_completed, 2);
        assert_eq!(report.tips_used, 2);
        assert_eq!(report.volume_moved, Volume::microliters(30.0));

        let cycle: Vec<String> = session
            .journal()
            .iter()
            .filter_map(|c| match c {
                SessionCommand::PickUpTip { .. } => Some("pick_up".to_string()),
                SessionCommand::Aspirate { well, .. } => Some(format!("aspirate {well}")),
                SessionCommand::Dispense { well, .. } => Some(format!("dispense {well}")),
                SessionCommand::DropTip { .. } => Some("drop".to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(
            cycle,
            vec![
                "pick_up",
                "aspirate A1",
                "dispense A2",
                "drop",
                "pick_up",
                "aspirate A2",
                "dispense A6",
                "drop",
            ]
        );
    }

    #[test]
    fn test_aspirate_uses_configured_anchor() {
        let Deck {
            mut session, plan, ..
        } = deck();

        execute_transfers(&mut session, &plan, &[transfer("A1", "B1", 5.0)]).unwrap();

        let anchors: Vec<WellAnchor> = session
            .journal()
            .iter()
            .filter_map(|c| match c {
                SessionCommand::Aspirate { anchor, .. } | SessionCommand::Dispense { anchor, .. } => {
                    Some(*anchor)
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            anchors,
            vec![WellAnchor::Top { offset_mm: -35.0 }, WellAnchor::Default]
        );
    }

    #[test]
    fn test_tip_exhaustion_stops_the_batch() {
        let Deck {
            mut session,
            plan,
            tips,
        } = deck();
        // H12 is the last tip of the rack: one transfer fits.
        session.set_starting_tip(plan.pipette, tips, "H12").unwrap();
        let records = vec![
            transfer("A1", "A2", 10.0),
            transfer("A2", "A3", 10.0),
            transfer("A3", "A4", 10.0),
        ];

        let err = execute_transfers(&mut session, &plan, &records).unwrap_err();

        assert!(matches!(err, ProtocolError::TipExhaustedError { .. }));
        let aspirates = session
            .journal()
            .iter()
            .filter(|c| matches!(c, SessionCommand::Aspirate { .. }))
            .count();
        assert_eq!(aspirates, 1);
    }

    #[test]
    fn test_failed_aspirate_still_drops_tip() {
        let Deck {
            mut session, plan, ..
        } = deck();
        // The p20 cannot hold 50 uL.
        let records = vec![transfer("A1", "A2", 50.0), transfer("A2", "A3", 5.0)];

        let err = execute_transfers(&mut session, &plan, &records).unwrap_err();

        assert!(matches!(err, ProtocolError::TransferError { .. }));
        assert!(!session.has_tip(plan.pipette));
        assert!(matches!(
            session.journal().last(),
            Some(SessionCommand::DropTip { .. })
        ));
        let pickups = session
            .journal()
            .iter()
            .filter(|c| matches!(c, SessionCommand::PickUpTip { .. }))
            .count();
        assert_eq!(pickups, 1);
    }

    #[test]
    fn test_invalid_destination_well_is_transfer_error() {
        let Deck {
            mut session, plan, ..
        } = deck();

        let err = execute_transfers(&mut session, &plan, &[transfer("A1", "Z99", 5.0)]).unwrap_err();

        assert!(matches!(err, ProtocolError::TransferError { .. }));
        assert!(!session.has_tip(plan.pipette));
    }

    #[test]
    fn test_signed_or_padded_wells_are_transfer_errors() {
        let Deck {
            mut session, plan, ..
        } = deck();

        let err = execute_transfers(&mut session, &plan, &[transfer("A+1", "A2", 5.0)]).unwrap_err();
        assert!(matches!(err, ProtocolError::TransferError { .. }));

        let err = execute_transfers(&mut session, &plan, &[transfer("A1", "A002", 5.0)]).unwrap_err();
        assert!(matches!(err, ProtocolError::TransferError { .. }));

        assert!(!session
            .journal()
            .iter()
            .any(|c| matches!(c, SessionCommand::Dispense { .. })));
        assert!(!session.has_tip(plan.pipette));
    }
}
