use crate::domain::model::{DeckSlot, Mount, VolumeUnit, WellAnchor};
use crate::utils::error::{ProtocolError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The default run: two dye/water tubes in a 15-tube rack moved into a PCR
/// plate inside an open thermocycler.
///
/// Both tables are declared in microliters, which is how the robot read the
/// unconverted numbers. Switch `liquids.volume_unit` to "mL" if the starting
/// volumes really are milliliters.
pub const BUILTIN_PROTOCOL: &str = r##"
[metadata]
protocol_name = "Small_Volume_Transfer_With_CSV"
api_level = "2.16"
description = "Transfer small volumes between wells, driven by CSV tables instead of a one-off protocol"
author = "Abigail Lin"

[[modules]]
name = "temp_mod"
model = "temperature module gen2"
slot = 3

[[modules]]
name = "tc_mod"
model = "thermocyclerModuleV2"
open_lid = true

[[labware]]
name = "temp_tubes"
load_name = "opentrons_24_aluminumblock_nest_1.5ml_snapcap"
module = "temp_mod"

[[labware]]
name = "tube_rack"
load_name = "opentrons_15_tuberack_falcon_15ml_conical"
slot = 5

[[labware]]
name = "tips"
load_name = "opentrons_96_tiprack_20ul"
slot = 1

[[labware]]
name = "plate"
load_name = "nest_96_wellplate_100ul_pcr_full_skirt"
module = "tc_mod"

[pipette]
instrument = "p20_single_gen2"
mount = "left"
tip_racks = ["tips"]
starting_tip = "E1"

[liquids]
labware = "tube_rack"
volume_unit = "uL"

[liquids.source]
type = "inline"
data = """

Initial_Wells,Initial_Volume,Liquid_Name,Description,Color
A1,0.5,Water,This is water,#00FF00
A2,0.5,Dye,This is dyed pink water,#FFC0CB

"""

[transfers]
source_labware = "tube_rack"
destination_labware = "plate"
volume_unit = "uL"
aspirate = { anchor = "top", offset_mm = -35.0 }
dispense = { anchor = "default" }

[transfers.source]
type = "inline"
data = """

Source_Well,Destination_Well,Transfer_Volume
A1,A2,15
A2,A6,15
"""
"##;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
    pub labware: Vec<LabwareConfig>,
    pub pipette: PipetteConfig,
    pub liquids: LiquidTableConfig,
    pub transfers: TransferTableConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    pub protocol_name: String,
    pub api_level: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,
    pub model: String,
    /// Omitted for modules with a fixed footprint (thermocycler).
    pub slot: Option<u8>,
    #[serde(default)]
    pub open_lid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabwareConfig {
    pub name: String,
    pub load_name: String,
    pub slot: Option<u8>,
    /// Name of the module the labware sits on, instead of a slot.
    pub module: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipetteConfig {
    pub instrument: String,
    pub mount: Mount,
    pub tip_racks: Vec<String>,
    /// First tip to use on the first tip rack.
    pub starting_tip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TableSourceConfig {
    Inline { data: String },
    File { path: String },
    Http { url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidTableConfig {
    pub source: TableSourceConfig,
    /// Labware holding the starting liquids.
    pub labware: String,
    pub volume_unit: VolumeUnit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferTableConfig {
    pub source: TableSourceConfig,
    pub source_labware: String,
    pub destination_labware: String,
    pub volume_unit: VolumeUnit,
    #[serde(default = "default_aspirate_position")]
    pub aspirate: WellAnchor,
    #[serde(default)]
    pub dispense: WellAnchor,
}

/// 35 mm below the top of the source vessel, deep enough to reach the
/// liquid in a 15 mL conical tube.
fn default_aspirate_position() -> WellAnchor {
    WellAnchor::Top { offset_mm: -35.0 }
}

impl LabwareConfig {
    pub fn deck_slot(&self) -> Option<DeckSlot> {
        self.slot.map(DeckSlot)
    }
}

impl ModuleConfig {
    pub fn deck_slot(&self) -> Option<DeckSlot> {
        self.slot.map(DeckSlot)
    }
}

impl ProtocolConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ProtocolError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ProtocolError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_PROTOCOL)
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn protocol_name(&self) -> &str {
        &self.metadata.protocol_name
    }

    pub fn find_labware(&self, name: &str) -> Option<&LabwareConfig> {
        self.labware.iter().find(|l| l.name == name)
    }

    pub fn find_module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.name == name)
    }

    fn validate_labware_ref(&self, field: &str, name: &str) -> Result<()> {
        if self.find_labware(name).is_none() {
            return Err(ProtocolError::InvalidConfigValueError {
                field: field.to_string(),
                value: name.to_string(),
                reason: "No labware with this name is declared".to_string(),
            });
        }
        Ok(())
    }

    fn validate_source(field: &str, source: &TableSourceConfig) -> Result<()> {
        match source {
            TableSourceConfig::Inline { data } => validation::validate_non_empty_string(field, data),
            TableSourceConfig::File { path } => validation::validate_path(field, path),
            TableSourceConfig::Http { url } => validation::validate_url(field, url),
        }
    }

    fn validate_anchor(field: &str, anchor: &WellAnchor) -> Result<()> {
        match anchor {
            WellAnchor::Top { offset_mm } | WellAnchor::Bottom { offset_mm } if !offset_mm.is_finite() => {
                Err(ProtocolError::InvalidConfigValueError {
                    field: field.to_string(),
                    value: offset_mm.to_string(),
                    reason: "Offset must be a finite number of millimeters".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("metadata.protocol_name", &self.metadata.protocol_name)?;

        validation::validate_unique_names("modules.name", self.modules.iter().map(|m| m.name.as_str()))?;
        for module in &self.modules {
            validation::validate_non_empty_string("modules.model", &module.model)?;
            if let Some(slot) = module.slot {
                validation::validate_range("modules.slot", slot, DeckSlot::MIN, DeckSlot::MAX)?;
            }
        }

        if self.labware.is_empty() {
            return Err(ProtocolError::MissingConfigError {
                field: "labware".to_string(),
            });
        }
        validation::validate_unique_names("labware.name", self.labware.iter().map(|l| l.name.as_str()))?;
        for labware in &self.labware {
            validation::validate_non_empty_string("labware.load_name", &labware.load_name)?;
            match (&labware.slot, &labware.module) {
                (Some(slot), None) => {
                    validation::validate_range("labware.slot", *slot, DeckSlot::MIN, DeckSlot::MAX)?
                }
                (None, Some(module)) => {
                    if self.find_module(module).is_none() {
                        return Err(ProtocolError::InvalidConfigValueError {
                            field: "labware.module".to_string(),
                            value: module.clone(),
                            reason: "No module with this name is declared".to_string(),
                        });
                    }
                }
                _ => {
                    return Err(ProtocolError::InvalidConfigValueError {
                        field: "labware".to_string(),
                        value: labware.name.clone(),
                        reason: "Set exactly one of 'slot' or 'module'".to_string(),
                    })
                }
            }
        }

        validation::validate_non_empty_string("pipette.instrument", &self.pipette.instrument)?;
        if self.pipette.tip_racks.is_empty() {
            return Err(ProtocolError::MissingConfigError {
                field: "pipette.tip_racks".to_string(),
            });
        }
        for rack in &self.pipette.tip_racks {
            self.validate_labware_ref("pipette.tip_racks", rack)?;
        }
        if let Some(tip) = &self.pipette.starting_tip {
            validation::validate_well_name("pipette.starting_tip", tip)?;
        }

        self.validate_labware_ref("liquids.labware", &self.liquids.labware)?;
        Self::validate_source("liquids.source", &self.liquids.source)?;

        self.validate_labware_ref("transfers.source_labware", &self.transfers.source_labware)?;
        self.validate_labware_ref("transfers.destination_labware", &self.transfers.destination_labware)?;
        Self::validate_source("transfers.source", &self.transfers.source)?;
        Self::validate_anchor("transfers.aspirate.offset_mm", &self.transfers.aspirate)?;
        Self::validate_anchor("transfers.dispense.offset_mm", &self.transfers.dispense)?;

        Ok(())
    }
}

impl Validate for ProtocolConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[metadata]
protocol_name = "minimal"

[[labware]]
name = "tips"
load_name = "opentrons_96_tiprack_20ul"
slot = 1

[[labware]]
name = "plate"
load_name = "nest_96_wellplate_200ul_flat"
slot = 2

[pipette]
instrument = "p20_single_gen2"
mount = "right"
tip_racks = ["tips"]

[liquids]
labware = "plate"
volume_unit = "uL"
source = { type = "file", path = "volumes.csv" }

[transfers]
source_labware = "plate"
destination_labware = "plate"
volume_unit = "uL"
source = { type = "http", url = "${TRANSFER_TABLE_URL}" }
"#;

    #[test]
    fn test_builtin_protocol_is_valid() {
        let config = ProtocolConfig::builtin().unwrap();

        assert_eq!(config.protocol_name(), "Small_Volume_Transfer_With_CSV");
        assert_eq!(config.modules.len(), 2);
        assert!(config.modules[1].open_lid);
        assert_eq!(config.pipette.mount, Mount::Left);
        assert_eq!(config.pipette.starting_tip.as_deref(), Some("E1"));
        assert_eq!(config.liquids.volume_unit, VolumeUnit::Microliters);
        assert_eq!(
            config.transfers.aspirate,
            WellAnchor::Top { offset_mm: -35.0 }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_and_env_var_substitution() {
        std::env::set_var("TRANSFER_TABLE_URL", "https://lab.example.com/transfers.csv");

        let config = ProtocolConfig::from_toml_str(MINIMAL).unwrap();

        assert!(config.modules.is_empty());
        assert_eq!(config.transfers.aspirate, WellAnchor::Top { offset_mm: -35.0 });
        assert_eq!(config.transfers.dispense, WellAnchor::Default);
        assert_eq!(
            config.transfers.source,
            TableSourceConfig::Http {
                url: "https://lab.example.com/transfers.csv".to_string()
            }
        );
        assert!(config.validate().is_ok());

        std::env::remove_var("TRANSFER_TABLE_URL");
    }

    #[test]
    fn test_volume_unit_is_required() {
        let without_unit = MINIMAL.replacen("volume_unit = \"uL\"\n", "", 1);
        let err = ProtocolConfig::from_toml_str(&without_unit).unwrap_err();
        assert!(matches!(err, ProtocolError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_unknown_labware_reference_rejected() {
        let config = ProtocolConfig::from_toml_str(
            &MINIMAL.replace("destination_labware = \"plate\"", "destination_labware = \"missing\""),
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidConfigValueError { ref field, .. } if field == "transfers.destination_labware"
        ));
    }

    #[test]
    fn test_labware_needs_slot_or_module() {
        let config = ProtocolConfig::from_toml_str(&MINIMAL.replace("slot = 2\n", "")).unwrap();
        assert!(config.validate().is_err());

        let config = ProtocolConfig::from_toml_str(&MINIMAL.replace("slot = 2", "slot = 12")).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_anchor_offsets_rejected() {
        let with_anchors = |aspirate: &str, dispense: &str| {
            MINIMAL
                .replace("${TRANSFER_TABLE_URL}", "https://lab.example.com/transfers.csv")
                .replace(
                    "volume_unit = \"uL\"\nsource = { type = \"http\"",
                    &format!(
                        "volume_unit = \"uL\"\naspirate = {}\ndispense = {}\nsource = {{ type = \"http\"",
                        aspirate, dispense
                    ),
                )
        };

        let config = ProtocolConfig::from_toml_str(&with_anchors(
            "{ anchor = \"top\", offset_mm = nan }",
            "{ anchor = \"default\" }",
        ))
        .unwrap();
        assert!(matches!(
            config.validate().unwrap_err(),
            ProtocolError::InvalidConfigValueError { ref field, .. } if field == "transfers.aspirate.offset_mm"
        ));

        let config = ProtocolConfig::from_toml_str(&with_anchors(
            "{ anchor = \"top\", offset_mm = -35.0 }",
            "{ anchor = \"bottom\", offset_mm = inf }",
        ))
        .unwrap();
        assert!(matches!(
            config.validate().unwrap_err(),
            ProtocolError::InvalidConfigValueError { ref field, .. } if field == "transfers.dispense.offset_mm"
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = ProtocolConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.protocol_name(), "minimal");
        assert_eq!(
            config.liquids.source,
            TableSourceConfig::File {
                path: "volumes.csv".to_string()
            }
        );
    }
}
