use crate::config::toml_config::ProtocolConfig;
use crate::domain::model::{InstrumentHandle, LabwareHandle, ModuleHandle};
use crate::domain::ports::RobotSession;
use crate::utils::error::{ProtocolError, Result};
use std::collections::HashMap;

/// Handles for everything loaded during setup, looked up by configured name.
#[derive(Debug, Clone)]
pub struct Deck {
    modules: HashMap<String, ModuleHandle>,
    labware: HashMap<String, LabwareHandle>,
    pub pipette: InstrumentHandle,
}

impl Deck {
    /// Loads modules, then labware, then the pipette; sets the starting tip
    /// and finally opens any lids the configuration asks for.
    pub fn initialize<S: RobotSession + ?Sized>(
        session: &mut S,
        config: &ProtocolConfig,
    ) -> Result<Self> {
        let mut modules = HashMap::new();
        for module in &config.modules {
            let handle = session.load_module(&module.model, module.deck_slot())?;
            tracing::debug!("Module '{}' is {}", module.name, handle);
            modules.insert(module.name.clone(), handle);
        }

        let mut labware = HashMap::new();
        for item in &config.labware {
            let handle = match (item.deck_slot(), &item.module) {
                (Some(slot), None) => session.load_vessel_rack(&item.load_name, slot)?,
                (None, Some(module)) => {
                    let module = lookup(&modules, "module", module)?;
                    session.load_module_labware(module, &item.load_name)?
                }
                _ => {
                    return Err(ProtocolError::ConfigError {
                        message: format!("labware '{}' needs exactly one of slot or module", item.name),
                    })
                }
            };
            tracing::debug!("Labware '{}' is {}", item.name, handle);
            labware.insert(item.name.clone(), handle);
        }

        let tip_racks = config
            .pipette
            .tip_racks
            .iter()
            .map(|name| lookup(&labware, "tip rack", name))
            .collect::<Result<Vec<_>>>()?;
        let pipette = session.load_instrument(&config.pipette.instrument, config.pipette.mount, &tip_racks)?;

        if let Some(tip) = &config.pipette.starting_tip {
            let first_rack = tip_racks.first().copied().ok_or_else(|| ProtocolError::MissingConfigError {
                field: "pipette.tip_racks".to_string(),
            })?;
            session.set_starting_tip(pipette, first_rack, tip)?;
        }

        for module in config.modules.iter().filter(|m| m.open_lid) {
            session.open_lid(lookup(&modules, "module", &module.name)?)?;
        }

        tracing::info!(
            "Deck ready: {} modules, {} labware, {} on the {} mount",
            modules.len(),
            labware.len(),
            config.pipette.instrument,
            config.pipette.mount
        );
        Ok(Self {
            modules,
            labware,
            pipette,
        })
    }

    pub fn labware(&self, name: &str) -> Result<LabwareHandle> {
        lookup(&self.labware, "labware", name)
    }

    pub fn module(&self, name: &str) -> Result<ModuleHandle> {
        lookup(&self.modules, "module", name)
    }
}

fn lookup<H: Copy>(handles: &HashMap<String, H>, kind: &str, name: &str) -> Result<H> {
    handles
        .get(name)
        .copied()
        .ok_or_else(|| ProtocolError::ConfigError {
            message: format!("no {} named '{}' was loaded", kind, name),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::simulator::{SessionCommand, SimulatedSession};

    #[test]
    fn test_builtin_deck_layout() {
        let config = ProtocolConfig::builtin().unwrap();
        let mut session = SimulatedSession::new();

        let deck = Deck::initialize(&mut session, &config).unwrap();

        assert!(deck.labware("tube_rack").is_ok());
        assert!(deck.labware("plate").is_ok());
        assert!(deck.module("tc_mod").is_ok());
        assert!(deck.labware("nothing").is_err());

        let tips = deck.labware("tips").unwrap();
        // E1 is the fifth tip in column-major order.
        assert_eq!(session.tips_remaining(deck.pipette), 96 - 4);
        assert!(session.journal().iter().any(|c| matches!(
            c,
            SessionCommand::SetStartingTip { tip_rack, well, .. } if *tip_rack == tips && well == "E1"
        )));
        assert!(matches!(
            session.journal().last(),
            Some(SessionCommand::OpenLid { .. })
        ));
    }

    #[test]
    fn test_unknown_load_name_fails_setup() {
        let mut config = ProtocolConfig::builtin().unwrap();
        config.labware[1].load_name = "not_real_labware".to_string();
        let mut session = SimulatedSession::new();

        let err = Deck::initialize(&mut session, &config).unwrap_err();
        assert!(matches!(err, ProtocolError::LabwareError { .. }));
    }
}
