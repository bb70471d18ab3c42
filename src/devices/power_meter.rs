use serde::{Deserialize, Serialize};
use std::fmt;

use crate::modbus::protocol::MAX_READ_COUNT;
use crate::modbus::{SimulatedMeter, WordOrder};

pub const SUNSPEC_203_BASE: u16 = 4165;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    I16,
    U16,
    I32,
    U32,
}

impl ValueFormat {
    pub fn words(self) -> u16 {
        match self {
            ValueFormat::I16 | ValueFormat::U16 => 1,
            ValueFormat::I32 | ValueFormat::U32 => 2,
        }
    }

    pub fn decode(self, words: &[u16], order: WordOrder) -> i64 {
        match (self, words) {
            (ValueFormat::I16, [w, ..]) => *w as i16 as i64,
            (ValueFormat::U16, [w, ..]) => *w as i64,
            (ValueFormat::I32, [a, b, ..]) => order.combine(*a, *b) as i32 as i64,
            (ValueFormat::U32, [a, b, ..]) => order.combine(*a, *b) as i64,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleLocation {
    Trailing,
    Register(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterGroup {
    pub start: u16,
    pub values: u16,
    pub format: ValueFormat,
    pub scale: ScaleLocation,
}

impl RegisterGroup {
    pub fn span(&self) -> u16 {
        let block = self.values.saturating_mul(self.format.words());
        match self.scale {
            ScaleLocation::Trailing => block.saturating_add(1),
            ScaleLocation::Register(_) => block,
        }
    }

    pub fn scale_register(&self) -> u16 {
        match self.scale {
            ScaleLocation::Trailing => self
                .start
                .saturating_add(self.values.saturating_mul(self.format.words())),
            ScaleLocation::Register(register) => register,
        }
    }

    pub fn value_register(&self, index: u16) -> u16 {
        self.start
            .saturating_add(index.saturating_mul(self.format.words()))
    }

    pub fn check(&self) -> Result<(), String> {
        if self.values == 0 {
            return Err("group has no values".to_string());
        }
        let span = self.values as u32 * self.format.words() as u32
            + matches!(self.scale, ScaleLocation::Trailing) as u32;
        if span > MAX_READ_COUNT as u32 {
            return Err(format!(
                "{} registers exceed the {} register read limit",
                span, MAX_READ_COUNT
            ));
        }
        if self.start as u32 + span > u16::MAX as u32 + 1 {
            return Err(format!(
                "{} registers from {} run past the last register",
                span, self.start
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterMap {
    pub real_energy: RegisterGroup,
    pub apparent_energy: RegisterGroup,
    pub voltage: RegisterGroup,
    pub current: RegisterGroup,
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            // TotWhImpPhA..PhC, TotWh_SF
            real_energy: RegisterGroup {
                start: SUNSPEC_203_BASE + 48,
                values: 3,
                format: ValueFormat::I32,
                scale: ScaleLocation::Trailing,
            },
            // TotVAhImpPhA..PhC, TotVAh_SF
            apparent_energy: RegisterGroup {
                start: SUNSPEC_203_BASE + 65,
                values: 3,
                format: ValueFormat::I32,
                scale: ScaleLocation::Trailing,
            },
            // PhVphA..PhC, V_SF
            voltage: RegisterGroup {
                start: SUNSPEC_203_BASE + 6,
                values: 3,
                format: ValueFormat::U16,
                scale: ScaleLocation::Register(SUNSPEC_203_BASE + 13),
            },
            // AphA..AphC, A_SF
            current: RegisterGroup {
                start: SUNSPEC_203_BASE + 1,
                values: 3,
                format: ValueFormat::I16,
                scale: ScaleLocation::Trailing,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    RealEnergy,
    ApparentEnergy,
    Voltage,
    Current,
}

impl Quantity {
    pub const ALL: [Quantity; 4] = [
        Quantity::RealEnergy,
        Quantity::ApparentEnergy,
        Quantity::Voltage,
        Quantity::Current,
    ];

    pub fn scale_offset(self) -> i32 {
        match self {
            Quantity::RealEnergy | Quantity::ApparentEnergy | Quantity::Current => 3,
            Quantity::Voltage => 0,
        }
    }

    pub fn value_range(self) -> (i64, i64) {
        match self {
            Quantity::RealEnergy | Quantity::ApparentEnergy => (i64::MIN, i64::MAX),
            Quantity::Current => (i32::MIN as i64, i32::MAX as i64),
            Quantity::Voltage => (i16::MIN as i64, i16::MAX as i64),
        }
    }

    pub fn group(self, map: &RegisterMap) -> &RegisterGroup {
        match self {
            Quantity::RealEnergy => &map.real_energy,
            Quantity::ApparentEnergy => &map.apparent_energy,
            Quantity::Voltage => &map.voltage,
            Quantity::Current => &map.current,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quantity::RealEnergy => "real energy",
            Quantity::ApparentEnergy => "apparent energy",
            Quantity::Voltage => "voltage",
            Quantity::Current => "current",
        };
        f.write_str(name)
    }
}

pub fn populate_demo_meter(meter: &SimulatedMeter, map: &RegisterMap, order: WordOrder) {
    let put = |group: &RegisterGroup, raw: [i64; 3], scale: i16| {
        for (i, value) in raw.iter().enumerate() {
            let register = group.value_register(i as u16);
            match group.format {
                ValueFormat::I16 | ValueFormat::U16 => meter.set_u16(register, *value as u16),
                ValueFormat::I32 | ValueFormat::U32 => meter.set_u32(register, *value as u32, order),
            }
        }
        meter.set_i16(group.scale_register(), scale);
    };

    // energy in 0.1 Wh, voltage in 0.1 V, current in 0.01 A
    put(&map.real_energy, [123_456, 120_010, 98_765], -4);
    put(&map.apparent_energy, [130_002, 125_500, 101_010], -4);
    put(&map.voltage, [2301, 2298, 2310], -1);
    put(&map.current, [523, 498, 610], -2);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map_matches_sunspec_offsets() {
        let map = RegisterMap::default();
        assert_eq!(map.real_energy.start, 4213);
        assert_eq!(map.real_energy.scale_register(), 4219);
        assert_eq!(map.apparent_energy.start, 4230);
        assert_eq!(map.apparent_energy.scale_register(), 4236);
        assert_eq!(map.voltage.scale_register(), 4178);
        assert_eq!(map.current.scale_register(), 4169);
        assert_eq!(map.real_energy.span(), 7);
        assert_eq!(map.voltage.span(), 3);
    }

    #[test]
    fn test_oversized_group_saturates_and_fails_check() {
        let group = RegisterGroup {
            start: 100,
            values: 40_000,
            format: ValueFormat::I32,
            scale: ScaleLocation::Trailing,
        };
        assert_eq!(group.span(), u16::MAX);
        assert_eq!(group.scale_register(), u16::MAX);
        assert!(group.check().is_err());
        assert!(RegisterMap::default().real_energy.check().is_ok());
    }

    #[test]
    fn test_value_format_decode() {
        assert_eq!(ValueFormat::I16.decode(&[0xFFFE], WordOrder::Abcd), -2);
        assert_eq!(ValueFormat::U16.decode(&[0xFFFE], WordOrder::Abcd), 0xFFFE);
        assert_eq!(
            ValueFormat::I32.decode(&[0xFFFF, 0xFFFF], WordOrder::Cdab),
            -1
        );
        assert_eq!(
            ValueFormat::U32.decode(&[0x0001, 0x0000], WordOrder::Cdab),
            1
        );
    }

    #[test]
    fn test_offsets_per_quantity() {
        assert_eq!(Quantity::RealEnergy.scale_offset(), 3);
        assert_eq!(Quantity::Current.scale_offset(), 3);
        assert_eq!(Quantity::Voltage.scale_offset(), 0);
    }
}
