//! In-memory robot session.
//!
//! Models the deck closely enough to reject the mistakes a real robot would
//! reject (unknown wells, occupied slots, empty tip racks, over-full tips) and
//! records every accepted command in a journal.

use crate::adapters::labware::{
    find_labware, find_module, find_pipette, LabwareDefinition, ModuleDefinition, ModuleKind,
    PipetteDefinition,
};
use crate::domain::model::{
    DeckSlot, InstrumentHandle, LabwareHandle, LiquidHandle, Location, ModuleHandle, Mount,
    Volume, WellAnchor,
};
use crate::domain::ports::RobotSession;
use crate::utils::error::{ProtocolError, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Tolerance for comparing pipetted volumes.
const VOLUME_EPSILON_UL: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SessionCommand {
    LoadLabware {
        labware: LabwareHandle,
        load_name: String,
        location: String,
    },
    LoadModule {
        module: ModuleHandle,
        model: String,
        slot: Option<DeckSlot>,
    },
    OpenLid {
        module: ModuleHandle,
    },
    LoadInstrument {
        pipette: InstrumentHandle,
        instrument_name: String,
        mount: Mount,
    },
    SetStartingTip {
        pipette: InstrumentHandle,
        tip_rack: LabwareHandle,
        well: String,
    },
    RegisterLiquid {
        liquid: LiquidHandle,
        name: String,
        description: String,
        display_color: String,
    },
    LoadLiquid {
        labware: LabwareHandle,
        well: String,
        liquid: LiquidHandle,
        volume: Volume,
    },
    PickUpTip {
        pipette: InstrumentHandle,
        tip_rack: LabwareHandle,
        well: String,
    },
    Aspirate {
        pipette: InstrumentHandle,
        labware: LabwareHandle,
        well: String,
        anchor: WellAnchor,
        volume: Volume,
    },
    Dispense {
        pipette: InstrumentHandle,
        labware: LabwareHandle,
        well: String,
        anchor: WellAnchor,
        volume: Volume,
    },
    DropTip {
        pipette: InstrumentHandle,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidDefinition {
    pub name: String,
    pub description: String,
    pub display_color: String,
}

#[derive(Debug, Clone, Default)]
struct WellState {
    liquid: Option<LiquidHandle>,
    volume: Volume,
}

#[derive(Debug)]
struct LoadedLabware {
    definition: &'static LabwareDefinition,
    on_module: Option<ModuleHandle>,
    wells: Vec<WellState>,
}

#[derive(Debug)]
struct LoadedModule {
    definition: &'static ModuleDefinition,
    labware: Option<LabwareHandle>,
    lid_open: bool,
}

#[derive(Debug)]
struct LoadedInstrument {
    definition: &'static PipetteDefinition,
    tip_racks: Vec<LabwareHandle>,
    /// (position in `tip_racks`, tip index in that rack) of the next unused tip.
    next_tip: (usize, usize),
    has_tip: bool,
    held: Volume,
    held_liquid: Option<LiquidHandle>,
}

#[derive(Debug, Default)]
pub struct SimulatedSession {
    labware: Vec<LoadedLabware>,
    modules: Vec<LoadedModule>,
    instruments: Vec<LoadedInstrument>,
    mounts: HashMap<Mount, InstrumentHandle>,
    slots: HashMap<DeckSlot, String>,
    liquids: Vec<LiquidDefinition>,
    journal: Vec<SessionCommand>,
}

fn labware_error(message: impl Into<String>) -> ProtocolError {
    ProtocolError::LabwareError {
        message: message.into(),
    }
}

fn registration_error(message: impl Into<String>) -> ProtocolError {
    ProtocolError::RegistrationError {
        message: message.into(),
    }
}

fn transfer_error(message: impl Into<String>) -> ProtocolError {
    ProtocolError::TransferError {
        message: message.into(),
    }
}

fn is_display_color(color: &str) -> bool {
    static COLOR: OnceLock<Regex> = OnceLock::new();
    COLOR
        .get_or_init(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid regex"))
        .is_match(color)
}

impl SimulatedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> &[SessionCommand] {
        &self.journal
    }

    pub fn into_journal(self) -> Vec<SessionCommand> {
        self.journal
    }

    pub fn liquids(&self) -> &[LiquidDefinition] {
        &self.liquids
    }

    /// Tracked volume of a well, `None` if the well does not exist.
    pub fn well_volume(&self, labware: LabwareHandle, well: &str) -> Option<Volume> {
        let (_, index) = self.resolve_well(labware, well)?;
        Some(self.labware[labware.0].wells[index].volume)
    }

    pub fn well_liquid(&self, labware: LabwareHandle, well: &str) -> Option<LiquidHandle> {
        let (_, index) = self.resolve_well(labware, well)?;
        self.labware[labware.0].wells[index].liquid
    }

    pub fn has_tip(&self, pipette: InstrumentHandle) -> bool {
        self.instruments
            .get(pipette.0)
            .map(|p| p.has_tip)
            .unwrap_or(false)
    }

    /// Unused tips left across all of the pipette's tip racks.
    pub fn tips_remaining(&self, pipette: InstrumentHandle) -> usize {
        let Some(instrument) = self.instruments.get(pipette.0) else {
            return 0;
        };
        let (rack_pos, tip_index) = instrument.next_tip;
        instrument
            .tip_racks
            .iter()
            .enumerate()
            .skip(rack_pos)
            .map(|(pos, rack)| {
                let count = self.labware[rack.0].definition.well_count();
                if pos == rack_pos {
                    count.saturating_sub(tip_index)
                } else {
                    count
                }
            })
            .sum()
    }

    fn resolve_well(&self, labware: LabwareHandle, well: &str) -> Option<(&LoadedLabware, usize)> {
        let loaded = self.labware.get(labware.0)?;
        let index = loaded.definition.well_index(well)?;
        Some((loaded, index))
    }

    fn add_labware(
        &mut self,
        load_name: &str,
        on_module: Option<ModuleHandle>,
    ) -> Result<(LabwareHandle, &'static LabwareDefinition)> {
        let definition = find_labware(load_name)
            .ok_or_else(|| labware_error(format!("unknown labware '{}'", load_name)))?;
        let handle = LabwareHandle(self.labware.len());
        self.labware.push(LoadedLabware {
            definition,
            on_module,
            wells: vec![WellState::default(); definition.well_count()],
        });
        Ok((handle, definition))
    }

    fn occupy(&mut self, slot: DeckSlot, occupant: String) -> Result<()> {
        if slot.0 < DeckSlot::MIN || slot.0 > DeckSlot::MAX {
            return Err(labware_error(format!("{} does not exist on the deck", slot)));
        }
        if let Some(existing) = self.slots.get(&slot) {
            return Err(labware_error(format!("{} is already occupied by {}", slot, existing)));
        }
        self.slots.insert(slot, occupant);
        Ok(())
    }

    fn instrument(&self, pipette: InstrumentHandle) -> Result<&LoadedInstrument> {
        self.instruments
            .get(pipette.0)
            .ok_or_else(|| transfer_error(format!("{} is not loaded", pipette)))
    }

    /// Resolves a pipetting target and checks the robot can reach it.
    fn reachable_well(&self, location: &Location) -> Result<usize> {
        let loaded = self
            .labware
            .get(location.labware.0)
            .ok_or_else(|| transfer_error(format!("{} is not loaded", location.labware)))?;
        if loaded.definition.is_tip_rack() {
            return Err(transfer_error(format!(
                "cannot pipette liquid in tip rack {}",
                location.labware
            )));
        }
        let index = loaded.definition.well_index(&location.well).ok_or_else(|| {
            transfer_error(format!(
                "well {} does not exist on {} ({})",
                location.well, location.labware, loaded.definition.load_name
            ))
        })?;
        if let Some(module) = loaded.on_module {
            let module_state = &self.modules[module.0];
            if module_state.definition.kind == ModuleKind::Thermocycler && !module_state.lid_open {
                return Err(transfer_error(format!(
                    "{} is inside {} and the lid is closed",
                    location.labware, module
                )));
            }
        }
        Ok(index)
    }
}

impl RobotSession for SimulatedSession {
    fn load_vessel_rack(&mut self, load_name: &str, slot: DeckSlot) -> Result<LabwareHandle> {
        if find_labware(load_name).is_none() {
            return Err(labware_error(format!("unknown labware '{}'", load_name)));
        }
        self.occupy(slot, load_name.to_string())?;
        let (handle, _) = self.add_labware(load_name, None)?;

        tracing::debug!("Loaded {} as {} in {}", load_name, handle, slot);
        self.journal.push(SessionCommand::LoadLabware {
            labware: handle,
            load_name: load_name.to_string(),
            location: slot.to_string(),
        });
        Ok(handle)
    }

    fn load_module(&mut self, model: &str, slot: Option<DeckSlot>) -> Result<ModuleHandle> {
        let definition = find_module(model)
            .ok_or_else(|| labware_error(format!("unknown module '{}'", model)))?;
        let handle = ModuleHandle(self.modules.len());

        if definition.fixed_slots.is_empty() {
            let slot = slot
                .ok_or_else(|| labware_error(format!("module '{}' needs a deck slot", model)))?;
            self.occupy(slot, model.to_string())?;
        } else {
            if let Some(slot) = slot {
                if !definition.fixed_slots.contains(&slot.0) {
                    return Err(labware_error(format!(
                        "module '{}' can only be placed over slots {:?}",
                        model, definition.fixed_slots
                    )));
                }
            }
            if let Some(taken) = definition
                .fixed_slots
                .iter()
                .find(|s| self.slots.contains_key(&DeckSlot(**s)))
            {
                return Err(labware_error(format!(
                    "module '{}' needs slot {} which is already occupied",
                    model, taken
                )));
            }
            for s in definition.fixed_slots {
                self.slots.insert(DeckSlot(*s), model.to_string());
            }
        }

        self.modules.push(LoadedModule {
            definition,
            labware: None,
            lid_open: false,
        });
        tracing::debug!("Loaded module {} as {}", model, handle);
        self.journal.push(SessionCommand::LoadModule {
            module: handle,
            model: model.to_string(),
            slot,
        });
        Ok(handle)
    }

    fn load_module_labware(
        &mut self,
        module: ModuleHandle,
        load_name: &str,
    ) -> Result<LabwareHandle> {
        let state = self
            .modules
            .get(module.0)
            .ok_or_else(|| labware_error(format!("{} is not loaded", module)))?;
        if let Some(existing) = state.labware {
            return Err(labware_error(format!("{} already holds {}", module, existing)));
        }

        let (handle, definition) = self.add_labware(load_name, Some(module))?;
        if definition.is_tip_rack() {
            self.labware.pop();
            return Err(labware_error(format!(
                "tip rack '{}' cannot be placed on a module",
                load_name
            )));
        }
        self.modules[module.0].labware = Some(handle);

        tracing::debug!("Loaded {} as {} on {}", load_name, handle, module);
        self.journal.push(SessionCommand::LoadLabware {
            labware: handle,
            load_name: load_name.to_string(),
            location: module.to_string(),
        });
        Ok(handle)
    }

    fn open_lid(&mut self, module: ModuleHandle) -> Result<()> {
        let state = self
            .modules
            .get_mut(module.0)
            .ok_or_else(|| labware_error(format!("{} is not loaded", module)))?;
        if state.definition.kind != ModuleKind::Thermocycler {
            return Err(labware_error(format!(
                "{} ({}) has no lid",
                module, state.definition.model
            )));
        }
        state.lid_open = true;
        self.journal.push(SessionCommand::OpenLid { module });
        Ok(())
    }

    fn load_instrument(
        &mut self,
        instrument_name: &str,
        mount: Mount,
        tip_racks: &[LabwareHandle],
    ) -> Result<InstrumentHandle> {
        let definition = find_pipette(instrument_name)
            .ok_or_else(|| labware_error(format!("unknown pipette '{}'", instrument_name)))?;
        if let Some(existing) = self.mounts.get(&mount) {
            return Err(labware_error(format!(
                "{} mount already carries {}",
                mount, existing
            )));
        }
        for rack in tip_racks {
            let loaded = self
                .labware
                .get(rack.0)
                .ok_or_else(|| labware_error(format!("{} is not loaded", rack)))?;
            if !loaded.definition.is_tip_rack() {
                return Err(labware_error(format!(
                    "{} ({}) is not a tip rack",
                    rack, loaded.definition.load_name
                )));
            }
        }

        let handle = InstrumentHandle(self.instruments.len());
        self.instruments.push(LoadedInstrument {
            definition,
            tip_racks: tip_racks.to_vec(),
            next_tip: (0, 0),
            has_tip: false,
            held: Volume::ZERO,
            held_liquid: None,
        });
        self.mounts.insert(mount, handle);

        tracing::debug!("Loaded {} on the {} mount as {}", instrument_name, mount, handle);
        self.journal.push(SessionCommand::LoadInstrument {
            pipette: handle,
            instrument_name: instrument_name.to_string(),
            mount,
        });
        Ok(handle)
    }

    fn set_starting_tip(
        &mut self,
        pipette: InstrumentHandle,
        tip_rack: LabwareHandle,
        well: &str,
    ) -> Result<()> {
        let instrument = self
            .instruments
            .get(pipette.0)
            .ok_or_else(|| labware_error(format!("{} is not loaded", pipette)))?;
        let rack_pos = instrument
            .tip_racks
            .iter()
            .position(|r| *r == tip_rack)
            .ok_or_else(|| {
                labware_error(format!("{} is not a tip rack of {}", tip_rack, pipette))
            })?;
        let tip_index = self.labware[tip_rack.0]
            .definition
            .well_index(well)
            .ok_or_else(|| labware_error(format!("tip {} does not exist on {}", well, tip_rack)))?;

        self.instruments[pipette.0].next_tip = (rack_pos, tip_index);
        self.journal.push(SessionCommand::SetStartingTip {
            pipette,
            tip_rack,
            well: well.to_string(),
        });
        Ok(())
    }

    fn register_liquid(
        &mut self,
        name: &str,
        description: &str,
        display_color: &str,
    ) -> Result<LiquidHandle> {
        if name.trim().is_empty() {
            return Err(registration_error("liquid name cannot be empty"));
        }
        if self.liquids.iter().any(|l| l.name == name) {
            return Err(ProtocolError::DuplicateLiquidError {
                name: name.to_string(),
            });
        }
        if !is_display_color(display_color) {
            return Err(registration_error(format!(
                "display color '{}' for '{}' is not in #RRGGBB form",
                display_color, name
            )));
        }

        let handle = LiquidHandle(self.liquids.len());
        self.liquids.push(LiquidDefinition {
            name: name.to_string(),
            description: description.to_string(),
            display_color: display_color.to_string(),
        });
        self.journal.push(SessionCommand::RegisterLiquid {
            liquid: handle,
            name: name.to_string(),
            description: description.to_string(),
            display_color: display_color.to_string(),
        });
        Ok(handle)
    }

    fn load_liquid(
        &mut self,
        labware: LabwareHandle,
        well: &str,
        liquid: LiquidHandle,
        volume: Volume,
    ) -> Result<()> {
        if liquid.0 >= self.liquids.len() {
            return Err(registration_error(format!("{} was never registered", liquid)));
        }
        let loaded = self
            .labware
            .get(labware.0)
            .ok_or_else(|| registration_error(format!("{} is not loaded", labware)))?;
        if loaded.definition.is_tip_rack() {
            return Err(registration_error(format!(
                "cannot load liquid into tip rack {}",
                labware
            )));
        }
        let index = loaded.definition.well_index(well).ok_or_else(|| {
            registration_error(format!(
                "well {} does not exist on {} ({})",
                well, labware, loaded.definition.load_name
            ))
        })?;
        if volume.as_microliters() > loaded.definition.capacity_ul {
            tracing::warn!(
                "Seeding {} into {} [{}], above its {} uL capacity",
                volume,
                labware,
                well,
                loaded.definition.capacity_ul
            );
        }

        self.labware[labware.0].wells[index] = WellState {
            liquid: Some(liquid),
            volume,
        };
        self.journal.push(SessionCommand::LoadLiquid {
            labware,
            well: well.to_string(),
            liquid,
            volume,
        });
        Ok(())
    }

    fn pick_up_tip(&mut self, pipette: InstrumentHandle) -> Result<()> {
        let instrument = self.instrument(pipette)?;
        if instrument.has_tip {
            return Err(transfer_error(format!("{} already has a tip", pipette)));
        }

        let (mut rack_pos, mut tip_index) = instrument.next_tip;
        while let Some(rack) = instrument.tip_racks.get(rack_pos) {
            if tip_index < self.labware[rack.0].definition.well_count() {
                break;
            }
            rack_pos += 1;
            tip_index = 0;
        }
        let Some(&rack) = instrument.tip_racks.get(rack_pos) else {
            return Err(ProtocolError::TipExhaustedError {
                pipette: format!("{} ({})", pipette, instrument.definition.name),
            });
        };
        let definition = self.labware[rack.0].definition;
        let well = definition.well_name(tip_index).unwrap_or_default();

        let instrument = &mut self.instruments[pipette.0];
        instrument.has_tip = true;
        instrument.held = Volume::ZERO;
        instrument.held_liquid = None;
        instrument.next_tip = (rack_pos, tip_index + 1);

        tracing::debug!("{} picked up tip {} from {}", pipette, well, rack);
        self.journal.push(SessionCommand::PickUpTip {
            pipette,
            tip_rack: rack,
            well,
        });
        Ok(())
    }

    fn aspirate(
        &mut self,
        pipette: InstrumentHandle,
        volume: Volume,
        location: &Location,
    ) -> Result<()> {
        let instrument = self.instrument(pipette)?;
        if !instrument.has_tip {
            return Err(transfer_error(format!("{} has no tip to aspirate with", pipette)));
        }
        let ul = volume.as_microliters();
        if ul <= 0.0 {
            return Err(transfer_error(format!("cannot aspirate {}", volume)));
        }
        let max = instrument.definition.max_volume_ul;
        if (instrument.held + volume).as_microliters() > max + VOLUME_EPSILON_UL {
            return Err(transfer_error(format!(
                "{} exceeds the {} uL capacity of {} ({})",
                volume, max, pipette, instrument.definition.name
            )));
        }
        if ul < instrument.definition.min_volume_ul {
            tracing::warn!(
                "{} is below the {} uL minimum of {}",
                volume,
                instrument.definition.min_volume_ul,
                instrument.definition.name
            );
        }
        let index = self.reachable_well(location)?;

        let well = &mut self.labware[location.labware.0].wells[index];
        if well.volume.as_microliters() + VOLUME_EPSILON_UL < ul {
            tracing::warn!(
                "Aspirating {} from {} which only tracks {}",
                volume,
                location,
                well.volume
            );
            well.volume = Volume::ZERO;
        } else {
            well.volume = well.volume - volume;
        }
        let liquid = well.liquid;

        let instrument = &mut self.instruments[pipette.0];
        instrument.held = instrument.held + volume;
        instrument.held_liquid = instrument.held_liquid.or(liquid);

        self.journal.push(SessionCommand::Aspirate {
            pipette,
            labware: location.labware,
            well: location.well.clone(),
            anchor: location.anchor,
            volume,
        });
        Ok(())
    }

    fn dispense(
        &mut self,
        pipette: InstrumentHandle,
        volume: Volume,
        location: &Location,
    ) -> Result<()> {
        let instrument = self.instrument(pipette)?;
        if !instrument.has_tip {
            return Err(transfer_error(format!("{} has no tip to dispense from", pipette)));
        }
        if volume.as_microliters() <= 0.0 {
            return Err(transfer_error(format!("cannot dispense {}", volume)));
        }
        if volume.as_microliters() > instrument.held.as_microliters() + VOLUME_EPSILON_UL {
            return Err(transfer_error(format!(
                "cannot dispense {} from {} holding {}",
                volume, pipette, instrument.held
            )));
        }
        let held_liquid = instrument.held_liquid;
        let index = self.reachable_well(location)?;

        let capacity = self.labware[location.labware.0].definition.capacity_ul;
        let well = &mut self.labware[location.labware.0].wells[index];
        well.volume = well.volume + volume;
        if well.liquid.is_none() {
            well.liquid = held_liquid;
        }
        if well.volume.as_microliters() > capacity {
            tracing::warn!("{} now holds {}, above its {} uL capacity", location, well.volume, capacity);
        }

        let instrument = &mut self.instruments[pipette.0];
        instrument.held = if instrument.held.as_microliters() - volume.as_microliters()
            < VOLUME_EPSILON_UL
        {
            Volume::ZERO
        } else {
            instrument.held - volume
        };

        self.journal.push(SessionCommand::Dispense {
            pipette,
            labware: location.labware,
            well: location.well.clone(),
            anchor: location.anchor,
            volume,
        });
        Ok(())
    }

    fn drop_tip(&mut self, pipette: InstrumentHandle) -> Result<()> {
        let instrument = self.instrument(pipette)?;
        if !instrument.has_tip {
            return Err(transfer_error(format!("{} has no tip to drop", pipette)));
        }

        let instrument = &mut self.instruments[pipette.0];
        instrument.has_tip = false;
        instrument.held = Volume::ZERO;
        instrument.held_liquid = None;
        self.journal.push(SessionCommand::DropTip { pipette });
        Ok(())
    }
}
