use crate::utils::error::{ProtocolError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(ProtocolError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(ProtocolError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(ProtocolError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ProtocolError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(ProtocolError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ProtocolError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(ProtocolError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Rejects the second occurrence of any name.
pub fn validate_unique_names<'a, I>(field_name: &str, names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ProtocolError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: name.to_string(),
                reason: "Name is used more than once".to_string(),
            });
        }
    }
    Ok(())
}

/// Well names look like `A1` or `H12`: one row letter then a column number.
pub fn validate_well_name(field_name: &str, well: &str) -> Result<()> {
    static WELL: OnceLock<Regex> = OnceLock::new();
    let re = WELL.get_or_init(|| Regex::new(r"^[A-P](?:[1-9]|1[0-9]|2[0-4])$").expect("valid regex"));

    if !re.is_match(well) {
        return Err(ProtocolError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: well.to_string(),
            reason: "Expected a well name such as A1 or H12".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("liquids.source.url", "https://example.com/volumes.csv").is_ok());
        assert!(validate_url("liquids.source.url", "http://example.com").is_ok());
        assert!(validate_url("liquids.source.url", "").is_err());
        assert!(validate_url("liquids.source.url", "invalid-url").is_err());
        assert!(validate_url("liquids.source.url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("labware.slot", 5u8, 1, 11).is_ok());
        assert!(validate_range("labware.slot", 0u8, 1, 11).is_err());
        assert!(validate_range("labware.slot", 12u8, 1, 11).is_err());
    }

    #[test]
    fn test_validate_unique_names() {
        assert!(validate_unique_names("labware.name", ["tips", "plate"]).is_ok());
        assert!(validate_unique_names("labware.name", ["tips", "plate", "tips"]).is_err());
    }

    #[test]
    fn test_validate_well_name() {
        assert!(validate_well_name("pipette.starting_tip", "E1").is_ok());
        assert!(validate_well_name("pipette.starting_tip", "H12").is_ok());
        assert!(validate_well_name("pipette.starting_tip", "e1").is_err());
        assert!(validate_well_name("pipette.starting_tip", "A0").is_err());
        assert!(validate_well_name("pipette.starting_tip", "").is_err());
    }
}
