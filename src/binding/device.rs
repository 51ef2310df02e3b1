//! Device descriptors handed to callers of `list`.

use crate::platform::DeviceInfo;
use serde::{Deserialize, Serialize};

/// A serial device as the higher-level port abstraction expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    pub path: String,
    pub manufacturer: String,
    pub display_name: String,
    pub serial_number: String,
    pub pnp_id: String,
    pub location_id: String,
    /// Lowercase hex with a `0x` prefix.
    pub vendor_id: String,
    /// Lowercase hex with a `0x` prefix.
    pub product_id: String,
}

impl From<DeviceInfo> for PortInfo {
    fn from(device: DeviceInfo) -> Self {
        let display_name = device.display_name.unwrap_or_default();
        Self {
            path: device.path,
            manufacturer: display_name.clone(),
            display_name,
            serial_number: String::new(),
            pnp_id: String::new(),
            location_id: String::new(),
            vendor_id: format_usb_id(device.vendor_id),
            product_id: format_usb_id(device.product_id),
        }
    }
}

fn format_usb_id(id: Option<u16>) -> String {
    format!("0x{:x}", id.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_usb_device_mapping() {
        let port = PortInfo::from(DeviceInfo {
            path: "/dev/ttyACM0".to_string(),
            display_name: Some("Arduino Uno".to_string()),
            vendor_id: Some(0x2341),
            product_id: Some(0x0043),
        });
        assert_eq!(
            port,
            PortInfo {
                path: "/dev/ttyACM0".to_string(),
                manufacturer: "Arduino Uno".to_string(),
                display_name: "Arduino Uno".to_string(),
                serial_number: String::new(),
                pnp_id: String::new(),
                location_id: String::new(),
                vendor_id: "0x2341".to_string(),
                product_id: "0x43".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_ids_default_to_zero() {
        let port = PortInfo::from(DeviceInfo {
            path: "COM1".to_string(),
            ..DeviceInfo::default()
        });
        assert_eq!(port.vendor_id, "0x0");
        assert_eq!(port.product_id, "0x0");
        assert_eq!(port.display_name, "");
    }
}
