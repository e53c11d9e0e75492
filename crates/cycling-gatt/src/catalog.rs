use serde::{Deserialize, Serialize};
use std::ops::BitOr;

pub const CYCLING_POWER_SERVICE_UUID: u16 = 0x1818;
pub const CYCLING_POWER_FEATURE_CHAR_UUID: u16 = 0x2A65;
pub const CYCLING_POWER_MEASUREMENT_CHAR_UUID: u16 = 0x2A63;
pub const SENSOR_LOCATION_CHAR_UUID: u16 = 0x2A5D;
pub const CYCLING_POWER_CONTROL_POINT_CHAR_UUID: u16 = 0x2A66;

/// Sensor location code for a right-crank power meter.
pub const SENSOR_LOCATION_RIGHT_CRANK: u8 = 6;

/// Cycling Power Feature bits.
pub const CPF_WHEEL_REVOLUTION_DATA_SUPPORTED: u32 = 1 << 2;
pub const CPF_CRANK_REVOLUTION_DATA_SUPPORTED: u32 = 1 << 3;

/// GATT characteristic property bitmask.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(u8);

impl Properties {
    pub const BROADCAST: Properties = Properties(0x01);
    pub const READ: Properties = Properties(0x02);
    pub const WRITE_WITHOUT_RESPONSE: Properties = Properties(0x04);
    pub const WRITE: Properties = Properties(0x08);
    pub const NOTIFY: Properties = Properties(0x10);
    pub const INDICATE: Properties = Properties(0x20);

    pub const fn from_bits(bits: u8) -> Self {
        Properties(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Properties) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Properties {
    type Output = Properties;

    fn bitor(self, rhs: Properties) -> Properties {
        Properties(self.0 | rhs.0)
    }
}

/// Value type the module reports for a characteristic. Every slot in this profile lets the
/// module infer it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    Auto,
}

impl DataType {
    pub fn code(self) -> u8 {
        match self {
            DataType::Auto => 0,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicDescriptor {
    pub uuid: u16,
    pub properties: Properties,
    pub min_len: u8,
    pub max_len: u8,
    pub datatype: DataType,
    /// Set by the module when the characteristic is created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_id: Option<u8>,
}

impl CharacteristicDescriptor {
    pub fn new(uuid: u16, properties: Properties, min_len: u8, max_len: u8) -> Self {
        Self {
            uuid,
            properties,
            min_len,
            max_len,
            datatype: DataType::Auto,
            assigned_id: None,
        }
    }

    pub fn add_command(&self) -> String {
        format!(
            "AT+GATTADDCHAR=UUID=0x{:04X},PROPERTIES=0x{:02X},MIN_LEN={},MAX_LEN={},DATATYPE={}",
            self.uuid,
            self.properties.bits(),
            self.min_len,
            self.max_len,
            self.datatype.code()
        )
    }
}

/// One service and its characteristics, in creation order.
///
/// Order matters twice: it is the order lines appear in the module's listing, and the order
/// in which the module hands out identifiers.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServiceCatalog {
    pub uuid: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_id: Option<u8>,
    pub characteristics: Vec<CharacteristicDescriptor>,
}

impl ServiceCatalog {
    pub fn new(uuid: u16) -> Self {
        Self {
            uuid,
            assigned_id: None,
            characteristics: Vec::new(),
        }
    }

    /// The minimal Cycling Power profile: Feature, Measurement and Sensor Location.
    pub fn cycling_power() -> Self {
        let mut svc = Self::new(CYCLING_POWER_SERVICE_UUID);
        svc.characteristics.push(CharacteristicDescriptor::new(
            CYCLING_POWER_FEATURE_CHAR_UUID,
            Properties::READ,
            4,
            4,
        ));
        svc.characteristics.push(CharacteristicDescriptor::new(
            CYCLING_POWER_MEASUREMENT_CHAR_UUID,
            Properties::READ | Properties::NOTIFY,
            crate::telemetry::MEASUREMENT_RECORD_LEN as u8,
            crate::telemetry::MEASUREMENT_RECORD_LEN as u8,
        ));
        svc.characteristics.push(CharacteristicDescriptor::new(
            SENSOR_LOCATION_CHAR_UUID,
            Properties::READ,
            1,
            1,
        ));
        svc
    }

    /// The minimal profile plus a writable control point.
    pub fn cycling_power_with_control_point() -> Self {
        let mut svc = Self::cycling_power();
        svc.characteristics.push(CharacteristicDescriptor::new(
            CYCLING_POWER_CONTROL_POINT_CHAR_UUID,
            Properties::WRITE | Properties::INDICATE,
            1,
            20,
        ));
        svc
    }

    pub fn add_command(&self) -> String {
        format!("AT+GATTADDSERVICE=UUID=0x{:04X}", self.uuid)
    }

    pub fn characteristic(&self, uuid: u16) -> Option<&CharacteristicDescriptor> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }

    pub fn assigned_id_of(&self, uuid: u16) -> Option<u8> {
        self.characteristic(uuid).and_then(|c| c.assigned_id)
    }

    /// Forget every identifier; the declarations stay.
    pub fn clear_assignments(&mut self) {
        self.assigned_id = None;
        for c in &mut self.characteristics {
            c.assigned_id = None;
        }
    }

    pub fn is_provisioned(&self) -> bool {
        self.assigned_id.is_some() && self.characteristics.iter().all(|c| c.assigned_id.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycling_power_profile_order() {
        let svc = ServiceCatalog::cycling_power();
        let uuids: Vec<u16> = svc.characteristics.iter().map(|c| c.uuid).collect();
        assert_eq!(uuids, vec![0x2A65, 0x2A63, 0x2A5D]);
        assert!(!svc.is_provisioned());
    }

    #[test]
    fn test_add_commands() {
        let svc = ServiceCatalog::cycling_power();
        assert_eq!(svc.add_command(), "AT+GATTADDSERVICE=UUID=0x1818");
        assert_eq!(
            svc.characteristics[1].add_command(),
            "AT+GATTADDCHAR=UUID=0x2A63,PROPERTIES=0x12,MIN_LEN=14,MAX_LEN=14,DATATYPE=0"
        );
    }

    #[test]
    fn test_every_slot_uses_auto_datatype() {
        let svc = ServiceCatalog::cycling_power_with_control_point();
        for c in &svc.characteristics {
            assert_eq!(c.datatype, DataType::Auto);
            assert!(c.add_command().ends_with(",DATATYPE=0"), "{}", c.add_command());
        }
        assert_eq!(
            svc.characteristic(CYCLING_POWER_CONTROL_POINT_CHAR_UUID)
                .map(|c| c.properties),
            Some(Properties::WRITE | Properties::INDICATE)
        );
    }

    #[test]
    fn test_properties_bits() {
        let p = Properties::READ | Properties::NOTIFY;
        assert_eq!(p.bits(), 0x12);
        assert!(p.contains(Properties::NOTIFY));
        assert!(!p.contains(Properties::WRITE));
    }

    #[test]
    fn test_clear_assignments() {
        let mut svc = ServiceCatalog::cycling_power();
        svc.assigned_id = Some(1);
        for (i, c) in svc.characteristics.iter_mut().enumerate() {
            c.assigned_id = Some(i as u8 + 1);
        }
        assert!(svc.is_provisioned());
        assert_eq!(svc.assigned_id_of(SENSOR_LOCATION_CHAR_UUID), Some(3));
        svc.clear_assignments();
        assert!(!svc.is_provisioned());
        assert_eq!(svc.assigned_id_of(SENSOR_LOCATION_CHAR_UUID), None);
    }
}
