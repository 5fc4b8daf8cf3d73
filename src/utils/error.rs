use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed {table} table at line {line}: {message}")]
    ParseError {
        table: String,
        line: u64,
        message: String,
    },

    #[error("Liquid registration failed: {message}")]
    RegistrationError { message: String },

    #[error("Liquid '{name}' is defined more than once")]
    DuplicateLiquidError { name: String },

    #[error("No tips left for {pipette}")]
    TipExhaustedError { pipette: String },

    #[error("Transfer failed: {message}")]
    TransferError { message: String },

    #[error("Deck setup failed: {message}")]
    LabwareError { message: String },

    #[error("Table request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration '{field}' could not be read: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Configuration,
    Deck,
    Liquid,
    Pipetting,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Transient; running again may succeed.
    Medium,
    /// Bad data or configuration; needs a fix before rerunning.
    High,
    /// The robot refused a step mid-run; the deck needs attention.
    Critical,
}

impl ErrorSeverity {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl ProtocolError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProtocolError::ParseError { .. } | ProtocolError::CsvError(_) => ErrorCategory::Input,
            ProtocolError::ConfigError { .. }
            | ProtocolError::InvalidConfigValueError { .. }
            | ProtocolError::MissingConfigError { .. }
            | ProtocolError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            ProtocolError::LabwareError { .. } => ErrorCategory::Deck,
            ProtocolError::RegistrationError { .. } | ProtocolError::DuplicateLiquidError { .. } => {
                ErrorCategory::Liquid
            }
            ProtocolError::TipExhaustedError { .. } | ProtocolError::TransferError { .. } => {
                ErrorCategory::Pipetting
            }
            ProtocolError::HttpError(_)
            | ProtocolError::IoError(_)
            | ProtocolError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::System => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Configuration | ErrorCategory::Liquid => {
                ErrorSeverity::High
            }
            ErrorCategory::Deck | ErrorCategory::Pipetting => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ProtocolError::ParseError { table, .. } => format!(
                "Check the {} table: every row needs the same columns as the header and numeric columns must be numbers",
                table
            ),
            ProtocolError::CsvError(_) => "Check that the table is valid comma-separated text".to_string(),
            ProtocolError::RegistrationError { .. } => {
                "Make sure every well exists on the rack and colors are written as #RRGGBB".to_string()
            }
            ProtocolError::DuplicateLiquidError { name } => {
                format!("Give each liquid a unique name or merge the rows for '{}'", name)
            }
            ProtocolError::TipExhaustedError { .. } => {
                "Add tip racks to the pipette or move the starting tip earlier".to_string()
            }
            ProtocolError::TransferError { .. } => {
                "Check wells and volumes against the labware and pipette, then clear the deck before rerunning".to_string()
            }
            ProtocolError::LabwareError { .. } => {
                "Check load names, slot numbers and module assignments in the deck layout".to_string()
            }
            ProtocolError::HttpError(_) => "Check the table URL and network connection, then retry".to_string(),
            ProtocolError::IoError(_) => "Check that the file exists and is readable".to_string(),
            ProtocolError::SerializationError(_) => "Check free disk space and output permissions".to_string(),
            ProtocolError::ConfigError { .. }
            | ProtocolError::InvalidConfigValueError { .. }
            | ProtocolError::MissingConfigError { .. }
            | ProtocolError::ConfigValidationError { .. } => {
                "Fix the protocol configuration file and run again".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input => format!("The input tables could not be read. {}", self),
            ErrorCategory::Configuration => format!("The protocol configuration is invalid. {}", self),
            ErrorCategory::Deck => format!("The deck could not be set up. {}", self),
            ErrorCategory::Liquid => format!("Starting liquids could not be defined. {}", self),
            ErrorCategory::Pipetting => format!("The run stopped during pipetting. {}", self),
            ErrorCategory::System => format!("A system error occurred. {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
