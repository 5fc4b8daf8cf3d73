use crate::adapters::source::build_table_source;
use crate::config::toml_config::ProtocolConfig;
use crate::core::deck::Deck;
use crate::core::liquids::load_liquids;
use crate::core::table::parse_table;
use crate::core::transfers::{execute_transfers, TransferPlan, TransferReport};
use crate::domain::model::{LiquidRecord, TransferRecord};
use crate::domain::ports::{RobotSession, TableSource};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Both tables, parsed and ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolTables {
    pub liquids: Vec<LiquidRecord>,
    pub transfers: Vec<TransferRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub protocol_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub liquids_defined: usize,
    pub transfers: TransferReport,
}

pub struct ProtocolEngine<S: RobotSession> {
    session: S,
    config: ProtocolConfig,
    liquid_source: Box<dyn TableSource>,
    transfer_source: Box<dyn TableSource>,
}

impl<S: RobotSession> ProtocolEngine<S> {
    pub fn new(
        session: S,
        config: ProtocolConfig,
        liquid_source: Box<dyn TableSource>,
        transfer_source: Box<dyn TableSource>,
    ) -> Self {
        Self {
            session,
            config,
            liquid_source,
            transfer_source,
        }
    }

    /// Uses the table sources named in `config`; relative file paths resolve against `base_dir`.
    pub fn from_config(session: S, config: ProtocolConfig, base_dir: &Path) -> Self {
        let liquid_source = build_table_source(&config.liquids.source, base_dir);
        let transfer_source = build_table_source(&config.transfers.source, base_dir);
        Self::new(session, config, liquid_source, transfer_source)
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    pub fn describe_sources(&self) -> (String, String) {
        (self.liquid_source.describe(), self.transfer_source.describe())
    }

    /// Fetches and parses both tables without touching the robot.
    pub async fn load_tables(&self) -> Result<ProtocolTables> {
        tracing::info!("Reading liquid table from {}", self.liquid_source.describe());
        let liquid_text = self.liquid_source.read_table().await?;
        tracing::info!("Reading transfer table from {}", self.transfer_source.describe());
        let transfer_text = self.transfer_source.read_table().await?;

        Ok(ProtocolTables {
            liquids: parse_table(&liquid_text)?,
            transfers: parse_table(&transfer_text)?,
        })
    }

    /// Runs the whole protocol. Both tables are parsed before the first
    /// robot command, so malformed input never leaves a half-set-up deck.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let started_at = Utc::now();
        tracing::info!("Starting protocol '{}'", self.config.protocol_name());

        let tables = self.load_tables().await?;
        tracing::info!(
            "Parsed {} liquids and {} transfers",
            tables.liquids.len(),
            tables.transfers.len()
        );

        let deck = Deck::initialize(&mut self.session, &self.config)?;

        let rack = deck.labware(&self.config.liquids.labware)?;
        let liquids = load_liquids(
            &mut self.session,
            rack,
            &tables.liquids,
            self.config.liquids.volume_unit,
        )?;

        let plan = TransferPlan {
            pipette: deck.pipette,
            source: deck.labware(&self.config.transfers.source_labware)?,
            destination: deck.labware(&self.config.transfers.destination_labware)?,
            unit: self.config.transfers.volume_unit,
            aspirate_at: self.config.transfers.aspirate,
            dispense_at: self.config.transfers.dispense,
        };
        let transfers = execute_transfers(&mut self.session, &plan, &tables.transfers)?;

        Ok(RunSummary {
            protocol_name: self.config.protocol_name().to_string(),
            started_at,
            finished_at: Utc::now(),
            liquids_defined: liquids.len(),
            transfers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::simulator::{SessionCommand, SimulatedSession};
    use crate::adapters::source::InlineTableSource;
    use crate::domain::model::Volume;
    use crate::utils::error::ProtocolError;

    fn engine(liquids: &str, transfers: &str) -> ProtocolEngine<SimulatedSession> {
        ProtocolEngine::new(
            SimulatedSession::new(),
            ProtocolConfig::builtin().unwrap(),
            Box::new(InlineTableSource::new(liquids)),
            Box::new(InlineTableSource::new(transfers)),
        )
    }

    #[tokio::test]
    async fn test_builtin_protocol_runs() {
        let config = ProtocolConfig::builtin().unwrap();
        let mut engine = ProtocolEngine::from_config(SimulatedSession::new(), config, Path::new("."));

        let summary = engine.run().await.unwrap();

        assert_eq!(summary.protocol_name, "Small_Volume_Transfer_With_CSV");
        assert_eq!(summary.liquids_defined, 2);
        assert_eq!(summary.transfers.transfers_completed, 2);
        assert_eq!(summary.transfers.tips_used, 2);
        assert_eq!(summary.transfers.volume_moved, Volume::microliters(30.0));
        assert!(summary.finished_at >= summary.started_at);
    }

    #[tokio::test]
    async fn test_malformed_liquid_row_stops_before_any_robot_command() {
        let mut engine = engine(
            "\nInitial_Wells,Initial_Volume,Liquid_Name,Description,Color\nA1,notanumber,Water,desc,#000000\n",
            "\nSource_Well,Destination_Well,Transfer_Volume\nA1,A2,15\n",
        );

        let err = engine.run().await.unwrap_err();

        assert!(matches!(err, ProtocolError::ParseError { ref table, .. } if table == "liquid"));
        assert!(engine.session().journal().is_empty());
        assert!(engine.session().liquids().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_transfer_row_stops_before_setup() {
        let mut engine = engine(
            "\nInitial_Wells,Initial_Volume,Liquid_Name,Description,Color\nA1,0.5,Water,This is water,#00FF00\n",
            "\nSource_Well,Destination_Well,Transfer_Volume\nA1,A2\n",
        );

        let err = engine.run().await.unwrap_err();

        assert!(matches!(err, ProtocolError::ParseError { ref table, line: 3, .. } if table == "transfer"));
        assert!(engine.session().journal().is_empty());
    }

    #[tokio::test]
    async fn test_zero_volume_row_fails_before_first_transfer() {
        let mut engine = engine(
            "\nInitial_Wells,Initial_Volume,Liquid_Name,Description,Color\nA1,0.5,Water,This is water,#00FF00\n",
            "\nSource_Well,Destination_Well,Transfer_Volume\nA1,A2,15\nA1,A3,0\n",
        );

        let err = engine.run().await.unwrap_err();

        assert!(matches!(err, ProtocolError::ParseError { ref table, line: 4, .. } if table == "transfer"));
        assert!(engine.session().journal().is_empty());
    }

    #[tokio::test]
    async fn test_load_tables_is_side_effect_free() {
        let engine = engine(
            "Initial_Wells,Initial_Volume,Liquid_Name,Description,Color\nA1,0.5,Water,This is water,#00FF00\n",
            "Source_Well,Destination_Well,Transfer_Volume\nA1,A2,15\nA2,A6,15\n",
        );

        let tables = engine.load_tables().await.unwrap();

        assert_eq!(tables.liquids.len(), 1);
        assert_eq!(tables.transfers.len(), 2);
        assert!(engine.session().journal().is_empty());
    }

    #[tokio::test]
    async fn test_transfers_follow_setup_and_liquids() {
        let config = ProtocolConfig::builtin().unwrap();
        let mut engine = ProtocolEngine::from_config(SimulatedSession::new(), config, Path::new("."));
        engine.run().await.unwrap();

        let journal = engine.into_session().into_journal();
        let last_liquid = journal
            .iter()
            .rposition(|c| matches!(c, SessionCommand::LoadLiquid { .. }))
            .unwrap();
        let first_pickup = journal
            .iter()
            .position(|c| matches!(c, SessionCommand::PickUpTip { .. }))
            .unwrap();
        assert!(last_liquid < first_pickup);
        assert!(matches!(journal.last(), Some(SessionCommand::DropTip { .. })));
    }
}
