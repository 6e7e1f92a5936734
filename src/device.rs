//! Device resolution
//!
//! Maps a canonical PCI bus address (`domain:bus:device.function`, as it
//! appears in sysfs) to the vendor library's device index, and resolves a
//! human-readable device name. The index is the sole handle for all
//! per-device queries; it is stable for the lifetime of a session but not
//! across sessions.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::session::SmiSession;

/// Vendor-assigned index of a monitored device
pub type DeviceIndex = u32;

/// A device's location on the PCI bus.
///
/// Derived from the vendor's 64-bit BDF identifier by exact-width masked
/// bit-field extraction: domain = bits 63:32, bus = bits 15:8,
/// device = bits 7:3, function = bits 2:0. Bits outside these fields do not
/// influence the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusAddress {
    pub domain: u32,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl BusAddress {
    /// Extracts the bus address from a vendor BDF location identifier
    pub fn from_location_id(bdfid: u64) -> Self {
        Self {
            domain: (bdfid >> 32) as u32,
            bus: ((bdfid >> 8) & 0xff) as u8,
            device: ((bdfid >> 3) & 0x1f) as u8,
            function: (bdfid & 0x7) as u8,
        }
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:02x}:{:02x}.{:x}", self.domain, self.bus, self.device, self.function)
    }
}

impl FromStr for BusAddress {
    type Err = Error;

    /// Parses the fixed-width form `dddd:bb:dd.f` (hex, lowercase or upper)
    fn from_str(s: &str) -> Result<Self, Error> {
        let invalid = || Error::invalid_bus_address(s);

        let (domain, rest) = s.split_once(':').ok_or_else(invalid)?;
        let (bus, rest) = rest.split_once(':').ok_or_else(invalid)?;
        let (device, function) = rest.split_once('.').ok_or_else(invalid)?;

        if domain.len() != 4 || bus.len() != 2 || device.len() != 2 || function.len() != 1 {
            return Err(invalid());
        }

        let domain = u32::from_str_radix(domain, 16).map_err(|_| invalid())?;
        let bus = u8::from_str_radix(bus, 16).map_err(|_| invalid())?;
        let device = u8::from_str_radix(device, 16).map_err(|_| invalid())?;
        let function = u8::from_str_radix(function, 16).map_err(|_| invalid())?;

        if device > 0x1f || function > 0x7 {
            return Err(invalid());
        }

        Ok(Self { domain, bus, device, function })
    }
}

impl SmiSession {
    /// Resolves the vendor device index for a canonical bus-address string.
    ///
    /// Linear scan in the vendor's enumeration order; the first device whose
    /// derived address matches `pdev` exactly wins. Devices whose location
    /// query fails are skipped. Returns `None` when the session is not
    /// initialized or no monitored device matches.
    pub fn find_device(&self, pdev: &str) -> Option<DeviceIndex> {
        if !self.is_available() {
            return None;
        }

        for index in 0..self.device_count() {
            let Ok(location) = self.interface().device_location(index) else {
                continue;
            };
            if BusAddress::from_location_id(location).to_string() == pdev {
                return Some(index);
            }
        }

        log::debug!("no monitored device at {pdev}");
        None
    }

    /// Resolves a human-readable device name.
    ///
    /// The market name is tried first; it is more specific but not
    /// implemented on all generations, so a failed or empty result falls
    /// back to the generic name. `None` when both sources fail or are empty.
    pub fn device_name(&self, index: DeviceIndex) -> Option<String> {
        if !self.is_available() {
            return None;
        }

        if let Ok(name) = self.interface().market_name(index) {
            if !name.is_empty() {
                return Some(name);
            }
        }

        match self.interface().device_name(index) {
            Ok(name) if !name.is_empty() => Some(name),
            _ => None,
        }
    }
}
