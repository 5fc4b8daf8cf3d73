//! Static definitions for the labware, modules and pipettes the simulator knows.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabwareKind {
    TubeRack,
    Plate,
    Reservoir,
    AluminumBlock,
    TipRack,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabwareDefinition {
    pub load_name: &'static str,
    pub kind: LabwareKind,
    pub rows: u8,
    pub columns: u8,
    /// Well capacity, or tip capacity for tip racks.
    pub capacity_ul: f64,
}

impl LabwareDefinition {
    pub fn well_count(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    pub fn is_tip_rack(&self) -> bool {
        self.kind == LabwareKind::TipRack
    }

    /// Column-major index: A1, B1, ... then A2. Tips are consumed in this order.
    pub fn well_index(&self, well: &str) -> Option<usize> {
        let mut chars = well.chars();
        let row_letter = chars.next()?;
        if !row_letter.is_ascii_uppercase() {
            return None;
        }
        let row = (row_letter as u8 - b'A') as usize;
        // Plain digits only: "A01" and "A+1" are not wells.
        let digits = chars.as_str();
        if digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let column: usize = digits.parse().ok()?;

        if row >= self.rows as usize || column == 0 || column > self.columns as usize {
            return None;
        }
        Some((column - 1) * self.rows as usize + row)
    }

    pub fn well_name(&self, index: usize) -> Option<String> {
        if index >= self.well_count() {
            return None;
        }
        let rows = self.rows as usize;
        let row = (b'A' + (index % rows) as u8) as char;
        Some(format!("{}{}", row, index / rows + 1))
    }
}

const fn labware(
    load_name: &'static str,
    kind: LabwareKind,
    rows: u8,
    columns: u8,
    capacity_ul: f64,
) -> LabwareDefinition {
    LabwareDefinition {
        load_name,
        kind,
        rows,
        columns,
        capacity_ul,
    }
}

const LABWARE: &[LabwareDefinition] = &[
    labware("opentrons_15_tuberack_falcon_15ml_conical", LabwareKind::TubeRack, 3, 5, 15000.0),
    labware("opentrons_6_tuberack_falcon_50ml_conical", LabwareKind::TubeRack, 2, 3, 50000.0),
    labware("opentrons_24_tuberack_nest_1.5ml_snapcap", LabwareKind::TubeRack, 4, 6, 1500.0),
    labware("opentrons_24_aluminumblock_nest_1.5ml_snapcap", LabwareKind::AluminumBlock, 4, 6, 1500.0),
    labware("opentrons_96_aluminumblock_nest_wellplate_100ul", LabwareKind::AluminumBlock, 8, 12, 100.0),
    labware("nest_96_wellplate_100ul_pcr_full_skirt", LabwareKind::Plate, 8, 12, 100.0),
    labware("nest_96_wellplate_200ul_flat", LabwareKind::Plate, 8, 12, 200.0),
    labware("corning_96_wellplate_360ul_flat", LabwareKind::Plate, 8, 12, 360.0),
    labware("corning_384_wellplate_112ul_flat", LabwareKind::Plate, 16, 24, 112.0),
    labware("nest_12_reservoir_15ml", LabwareKind::Reservoir, 1, 12, 15000.0),
    labware("opentrons_96_tiprack_20ul", LabwareKind::TipRack, 8, 12, 20.0),
    labware("opentrons_96_filtertiprack_20ul", LabwareKind::TipRack, 8, 12, 20.0),
    labware("opentrons_96_tiprack_300ul", LabwareKind::TipRack, 8, 12, 300.0),
    labware("opentrons_96_tiprack_1000ul", LabwareKind::TipRack, 8, 12, 1000.0),
];

pub fn find_labware(load_name: &str) -> Option<&'static LabwareDefinition> {
    LABWARE.iter().find(|l| l.load_name == load_name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Temperature,
    Thermocycler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleDefinition {
    pub model: &'static str,
    pub kind: ModuleKind,
    /// Slots covered by modules that cannot be placed freely.
    pub fixed_slots: &'static [u8],
}

const THERMOCYCLER_SLOTS: &[u8] = &[7, 8, 10, 11];

const MODULES: &[ModuleDefinition] = &[
    ModuleDefinition { model: "temperature module", kind: ModuleKind::Temperature, fixed_slots: &[] },
    ModuleDefinition { model: "temperature module gen2", kind: ModuleKind::Temperature, fixed_slots: &[] },
    ModuleDefinition { model: "temperatureModuleV1", kind: ModuleKind::Temperature, fixed_slots: &[] },
    ModuleDefinition { model: "temperatureModuleV2", kind: ModuleKind::Temperature, fixed_slots: &[] },
    ModuleDefinition { model: "thermocycler module", kind: ModuleKind::Thermocycler, fixed_slots: THERMOCYCLER_SLOTS },
    ModuleDefinition { model: "thermocycler module gen2", kind: ModuleKind::Thermocycler, fixed_slots: THERMOCYCLER_SLOTS },
    ModuleDefinition { model: "thermocyclerModuleV1", kind: ModuleKind::Thermocycler, fixed_slots: THERMOCYCLER_SLOTS },
    ModuleDefinition { model: "thermocyclerModuleV2", kind: ModuleKind::Thermocycler, fixed_slots: THERMOCYCLER_SLOTS },
];

pub fn find_module(model: &str) -> Option<&'static ModuleDefinition> {
    MODULES.iter().find(|m| m.model == model)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipetteDefinition {
    pub name: &'static str,
    pub min_volume_ul: f64,
    pub max_volume_ul: f64,
}

const PIPETTES: &[PipetteDefinition] = &[
    PipetteDefinition { name: "p20_single_gen2", min_volume_ul: 1.0, max_volume_ul: 20.0 },
    PipetteDefinition { name: "p300_single_gen2", min_volume_ul: 20.0, max_volume_ul: 300.0 },
    PipetteDefinition { name: "p1000_single_gen2", min_volume_ul: 100.0, max_volume_ul: 1000.0 },
];

pub fn find_pipette(name: &str) -> Option<&'static PipetteDefinition> {
    PIPETTES.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_index_is_column_major() {
        let tips = find_labware("opentrons_96_tiprack_20ul").unwrap();
        assert_eq!(tips.well_index("A1"), Some(0));
        assert_eq!(tips.well_index("H1"), Some(7));
        assert_eq!(tips.well_index("A2"), Some(8));
        assert_eq!(tips.well_index("H12"), Some(95));
        assert_eq!(tips.well_name(4).as_deref(), Some("E1"));
        assert_eq!(tips.well_name(96), None);
    }

    #[test]
    fn test_well_index_rejects_out_of_range() {
        let rack = find_labware("opentrons_15_tuberack_falcon_15ml_conical").unwrap();
        assert_eq!(rack.well_count(), 15);
        assert_eq!(rack.well_index("C5"), Some(14));
        assert_eq!(rack.well_index("D1"), None);
        assert_eq!(rack.well_index("A6"), None);
        assert_eq!(rack.well_index("A0"), None);
        assert_eq!(rack.well_index("a1"), None);
        assert_eq!(rack.well_index(""), None);
    }

    #[test]
    fn test_well_index_rejects_padded_or_signed_columns() {
        let plate = find_labware("nest_96_wellplate_100ul_pcr_full_skirt").unwrap();
        assert_eq!(plate.well_index("A01"), None);
        assert_eq!(plate.well_index("A002"), None);
        assert_eq!(plate.well_index("A+1"), None);
        assert_eq!(plate.well_index("A 1"), None);
        assert_eq!(plate.well_index("A"), None);
        assert_eq!(plate.well_index("A10"), Some(72));
    }

    #[test]
    fn test_catalog_lookups() {
        assert!(find_labware("opentrons_24_aluminumblock_nest_1.5ml_snapcap").is_some());
        assert!(find_labware("not_a_plate").is_none());
        assert_eq!(
            find_module("thermocyclerModuleV2").map(|m| m.kind),
            Some(ModuleKind::Thermocycler)
        );
        assert_eq!(find_pipette("p20_single_gen2").map(|p| p.max_volume_ul), Some(20.0));
    }
}
