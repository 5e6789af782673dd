use serde::{Deserialize, Serialize};

use crate::ids::DriverId;

/// Registered driver, read-only from the dashboard's point of view
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub driver_id: DriverId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    /// Base64-encoded PNG of the driver's QR code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code_image: Option<String>,
}

impl Driver {
    pub fn new(driver_id: impl Into<DriverId>, name: impl Into<String>) -> Self {
        Self {
            driver_id: driver_id.into(),
            name: name.into(),
            avatar: None,
            email: None,
            phone: None,
            vehicle_id: None,
            qr_code: None,
            qr_code_image: None,
        }
    }
}
