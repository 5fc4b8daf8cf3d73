use crate::adapters::simulator::SessionCommand;
use crate::core::engine::RunSummary;
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use serde::Serialize;

pub const RUN_REPORT_FILE: &str = "run_report.json";

/// What was attempted and what the robot accepted, in command order.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub protocol_name: &'a str,
    pub summary: Option<&'a RunSummary>,
    pub error: Option<String>,
    pub journal: &'a [SessionCommand],
}

/// Writes the report as pretty JSON and returns the file name it used.
pub async fn write_run_report<S: Storage>(storage: &S, report: &RunReport<'_>) -> Result<String> {
    let data = serde_json::to_vec_pretty(report)?;
    tracing::debug!("Writing run report ({} bytes)", data.len());
    storage.write_file(RUN_REPORT_FILE, &data).await?;
    Ok(RUN_REPORT_FILE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use crate::domain::model::InstrumentHandle;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_failed_run_report_keeps_error_and_journal() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap());
        let journal = vec![SessionCommand::DropTip {
            pipette: InstrumentHandle(0),
        }];
        let report = RunReport {
            protocol_name: "demo",
            summary: None,
            error: Some("No tips left for pipette#0".to_string()),
            journal: &journal,
        };

        let file = write_run_report(&storage, &report).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join(file)).unwrap()).unwrap();
        assert_eq!(written["protocol_name"], "demo");
        assert!(written["summary"].is_null());
        assert_eq!(written["error"], "No tips left for pipette#0");
        assert_eq!(written["journal"][0]["command"], "drop_tip");
        assert_eq!(written["journal"][0]["pipette"], 0);
    }
}
