use std::net::{IpAddr, SocketAddr};

use serde::Deserialize;

use super::RegistryError;

pub const MAX_NAME_LEN: usize = 190;

/// Registration payload as received. Every field is optional so that a missing
/// field surfaces as a validation error instead of a body rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterNodeRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A registration that passed every field check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidNode {
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl RegisterNodeRequest {
    pub fn validate(self) -> Result<ValidNode, RegistryError> {
        let name = validate_name(self.name.as_deref())?;
        let address = validate_address(self.address.as_deref())?;
        let latitude = validate_coordinate("latitude", self.latitude, 90.0)?;
        let longitude = validate_coordinate("longitude", self.longitude, 180.0)?;

        Ok(ValidNode {
            name,
            address,
            latitude,
            longitude,
        })
    }
}

fn validate_name(name: Option<&str>) -> Result<String, RegistryError> {
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| RegistryError::Validation("name is required".to_string()))?;

    if name.chars().count() > MAX_NAME_LEN {
        return Err(RegistryError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(RegistryError::Validation(
            "name must not contain control characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Accepts a bare IP (`10.0.0.7`, `::1`) or a socket address (`10.0.0.7:8443`, `[::1]:80`).
fn validate_address(address: Option<&str>) -> Result<String, RegistryError> {
    let address = address
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| RegistryError::Validation("address is required".to_string()))?;

    if address.parse::<IpAddr>().is_ok() || address.parse::<SocketAddr>().is_ok() {
        Ok(address.to_string())
    } else {
        Err(RegistryError::Validation(format!(
            "address '{address}' is not a valid IP or socket address"
        )))
    }
}

fn validate_coordinate(field: &str, value: Option<f64>, bound: f64) -> Result<f64, RegistryError> {
    let value =
        value.ok_or_else(|| RegistryError::Validation(format!("{field} is required")))?;

    if !value.is_finite() || value < -bound || value > bound {
        return Err(RegistryError::Validation(format!(
            "{field} must be between -{bound} and {bound}, got {value}"
        )));
    }
    Ok(value)
}
