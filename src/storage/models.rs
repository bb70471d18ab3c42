use serde::{Deserialize, Serialize};

use super::layout::{FieldSpec, RecordLayout};
use crate::utils::error::RecordError;

pub type FileId = u8;

pub const BUTTON_FILE_ID: FileId = 51;
pub const ENERGY_FILE_ID: FileId = 52;
pub const BUTTON_CONFIG_FILE_ID: FileId = 61;
pub const ENERGY_CONFIG_FILE_ID: FileId = 62;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageClass {
    Volatile,
    Permanent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub guest_read: bool,
    pub guest_write: bool,
    pub user_read: bool,
    pub user_write: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub permissions: Permissions,
    pub storage_class: StorageClass,
    pub length: usize,
    pub allocated_length: usize,
}

impl FileHeader {
    pub fn volatile(length: usize) -> Self {
        Self {
            permissions: Permissions {
                guest_read: true,
                user_read: true,
                ..Permissions::default()
            },
            storage_class: StorageClass::Volatile,
            length,
            allocated_length: length,
        }
    }

    pub fn permanent(length: usize) -> Self {
        Self {
            permissions: Permissions {
                guest_read: true,
                guest_write: true,
                user_read: true,
                user_write: true,
            },
            storage_class: StorageClass::Permanent,
            length,
            allocated_length: length + 10,
        }
    }
}

pub trait Record: Sized {
    const FILE_ID: FileId;
    const LAYOUT: RecordLayout;
    const STORAGE_CLASS: StorageClass;

    fn to_fields(&self) -> Vec<i64>;

    fn from_fields(fields: &[i64]) -> Self;

    fn encode(&self) -> Vec<u8> {
        Self::LAYOUT.encode(&self.to_fields())
    }

    fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        Self::LAYOUT
            .decode(bytes)
            .map(|fields| Self::from_fields(&fields))
    }

    fn header() -> FileHeader {
        match Self::STORAGE_CLASS {
            StorageClass::Volatile => FileHeader::volatile(Self::LAYOUT.size),
            StorageClass::Permanent => FileHeader::permanent(Self::LAYOUT.size),
        }
    }
}

const ENERGY_FIELDS: [FieldSpec; 13] = [
    FieldSpec::signed("real_energy_a", 0, 8),
    FieldSpec::signed("real_energy_b", 8, 8),
    FieldSpec::signed("real_energy_c", 16, 8),
    FieldSpec::signed("apparent_energy_a", 24, 8),
    FieldSpec::signed("apparent_energy_b", 32, 8),
    FieldSpec::signed("apparent_energy_c", 40, 8),
    FieldSpec::signed("voltage_a", 48, 2),
    FieldSpec::signed("voltage_b", 50, 2),
    FieldSpec::signed("voltage_c", 52, 2),
    FieldSpec::signed("current_a", 54, 4),
    FieldSpec::signed("current_b", 58, 4),
    FieldSpec::signed("current_c", 62, 4),
    FieldSpec::unsigned("measurement_valid", 66, 1),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyFile {
    pub real_energy: [i64; 3],
    pub apparent_energy: [i64; 3],
    pub voltage: [i16; 3],
    pub current: [i32; 3],
    pub measurement_valid: bool,
}

impl Record for EnergyFile {
    const FILE_ID: FileId = ENERGY_FILE_ID;
    const LAYOUT: RecordLayout = RecordLayout {
        name: "energy",
        size: 67,
        fields: &ENERGY_FIELDS,
    };
    const STORAGE_CLASS: StorageClass = StorageClass::Volatile;

    fn to_fields(&self) -> Vec<i64> {
        let mut fields = Vec::with_capacity(ENERGY_FIELDS.len());
        fields.extend(self.real_energy);
        fields.extend(self.apparent_energy);
        fields.extend(self.voltage.iter().map(|&v| v as i64));
        fields.extend(self.current.iter().map(|&c| c as i64));
        fields.push(self.measurement_valid as i64);
        fields
    }

    fn from_fields(f: &[i64]) -> Self {
        Self {
            real_energy: [f[0], f[1], f[2]],
            apparent_energy: [f[3], f[4], f[5]],
            voltage: [f[6] as i16, f[7] as i16, f[8] as i16],
            current: [f[9] as i32, f[10] as i32, f[11] as i32],
            measurement_valid: f[12] != 0,
        }
    }
}

const ENERGY_CONFIG_FIELDS: [FieldSpec; 2] = [
    FieldSpec::unsigned("interval", 0, 4),
    FieldSpec::unsigned("enabled", 4, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyConfigFile {
    pub interval: u32,
    pub enabled: bool,
}

impl Default for EnergyConfigFile {
    fn default() -> Self {
        Self {
            interval: 15 * 60,
            enabled: true,
        }
    }
}

impl Record for EnergyConfigFile {
    const FILE_ID: FileId = ENERGY_CONFIG_FILE_ID;
    const LAYOUT: RecordLayout = RecordLayout {
        name: "energy config",
        size: 5,
        fields: &ENERGY_CONFIG_FIELDS,
    };
    const STORAGE_CLASS: StorageClass = StorageClass::Permanent;

    fn to_fields(&self) -> Vec<i64> {
        vec![self.interval as i64, self.enabled as i64]
    }

    fn from_fields(f: &[i64]) -> Self {
        Self {
            interval: f[0] as u32,
            enabled: f[1] != 0,
        }
    }
}

const BUTTON_FIELDS: [FieldSpec; 3] = [
    FieldSpec::unsigned("button_id", 0, 1),
    FieldSpec::unsigned("mask", 1, 1),
    FieldSpec::unsigned("buttons_state", 2, 1),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonFile {
    pub button_id: u8,
    pub mask: bool,
    pub buttons_state: u8,
}

impl Record for ButtonFile {
    const FILE_ID: FileId = BUTTON_FILE_ID;
    const LAYOUT: RecordLayout = RecordLayout {
        name: "button",
        size: 3,
        fields: &BUTTON_FIELDS,
    };
    const STORAGE_CLASS: StorageClass = StorageClass::Volatile;

    fn to_fields(&self) -> Vec<i64> {
        vec![
            self.button_id as i64,
            self.mask as i64,
            self.buttons_state as i64,
        ]
    }

    fn from_fields(f: &[i64]) -> Self {
        Self {
            button_id: f[0] as u8,
            mask: f[1] != 0,
            buttons_state: f[2] as u8,
        }
    }
}

const BUTTON_CONFIG_FIELDS: [FieldSpec; 4] = [
    FieldSpec::unsigned("transmit_mask_0", 0, 1),
    FieldSpec::unsigned("transmit_mask_1", 1, 1),
    FieldSpec::unsigned("button_control_menu", 2, 1),
    FieldSpec::unsigned("enabled", 3, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonConfigFile {
    /// Transmit releases.
    pub transmit_mask_0: bool,
    /// Transmit presses.
    pub transmit_mask_1: bool,
    pub button_control_menu: bool,
    pub enabled: bool,
}

impl Default for ButtonConfigFile {
    fn default() -> Self {
        Self {
            transmit_mask_0: true,
            transmit_mask_1: true,
            button_control_menu: true,
            enabled: true,
        }
    }
}

impl Record for ButtonConfigFile {
    const FILE_ID: FileId = BUTTON_CONFIG_FILE_ID;
    const LAYOUT: RecordLayout = RecordLayout {
        name: "button config",
        size: 4,
        fields: &BUTTON_CONFIG_FIELDS,
    };
    const STORAGE_CLASS: StorageClass = StorageClass::Permanent;

    fn to_fields(&self) -> Vec<i64> {
        vec![
            self.transmit_mask_0 as i64,
            self.transmit_mask_1 as i64,
            self.button_control_menu as i64,
            self.enabled as i64,
        ]
    }

    fn from_fields(f: &[i64]) -> Self {
        Self {
            transmit_mask_0: f[0] != 0,
            transmit_mask_1: f[1] != 0,
            button_control_menu: f[2] != 0,
            enabled: f[3] != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_are_packed() {
        assert!(EnergyFile::LAYOUT.is_packed());
        assert!(EnergyConfigFile::LAYOUT.is_packed());
        assert!(ButtonFile::LAYOUT.is_packed());
        assert!(ButtonConfigFile::LAYOUT.is_packed());
    }

    #[test]
    fn test_energy_file_byte_layout() {
        let record = EnergyFile {
            real_energy: [1, 2, -1],
            apparent_energy: [0, 0, 0x0102],
            voltage: [230, -1, 0],
            current: [5000, 0, 0],
            measurement_valid: true,
        };
        let bytes = record.encode();
        assert_eq!(bytes.len(), 67);
        assert_eq!(&bytes[0..8], &1i64.to_le_bytes());
        assert_eq!(&bytes[16..24], &(-1i64).to_le_bytes());
        assert_eq!(&bytes[40..42], &[0x02, 0x01]);
        assert_eq!(&bytes[48..50], &230i16.to_le_bytes());
        assert_eq!(&bytes[50..52], &[0xFF, 0xFF]);
        assert_eq!(&bytes[54..58], &5000i32.to_le_bytes());
        assert_eq!(bytes[66], 1);
        assert_eq!(EnergyFile::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn test_energy_config_defaults_and_layout() {
        let config = EnergyConfigFile::default();
        assert_eq!(config.interval, 900);
        let bytes = config.encode();
        assert_eq!(bytes, vec![0x84, 0x03, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_button_file_decodes_any_nonzero_as_true() {
        let file = ButtonFile::decode(&[3, 7, 1]).unwrap();
        assert_eq!(file.button_id, 3);
        assert!(file.mask);
        assert_eq!(file.buttons_state, 1);
    }

    #[test]
    fn test_headers_follow_storage_class() {
        let header = EnergyConfigFile::header();
        assert_eq!(header.storage_class, StorageClass::Permanent);
        assert_eq!(header.allocated_length, 15);
        assert!(header.permissions.guest_write);

        let header = EnergyFile::header();
        assert_eq!(header.storage_class, StorageClass::Volatile);
        assert!(!header.permissions.guest_write);
    }
}
