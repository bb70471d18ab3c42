//! Bounded-retry acquisition of scaled register groups.
//!
//! A group is a run of raw values that share one signed power-of-ten exponent.
//! One attempt reads the whole group; it only counts as successful when every
//! read in it succeeded and the exponent and all converted values are valid.
//! Failed attempts are retried up to the configured budget with an optional
//! blocking backoff in between. The caller's scheduler turn is held for the
//! whole routine, which stays bounded by `max_attempts × (timeout + backoff)`.

use log::{debug, warn};
use std::thread;
use std::time::Duration;

use super::power_meter::{Quantity, RegisterGroup, RegisterMap, ScaleLocation};
use crate::config::settings::MeterConfig;
use crate::modbus::{RegisterTransport, WordOrder};
use crate::utils::error::ModbusError;

const SCALE_NOT_IMPLEMENTED: i16 = i16::MIN;
const SCALE_LIMIT: i16 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScaledReading {
    pub raw: Vec<i64>,
    pub scale: i16,
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquisition {
    pub reading: ScaledReading,
    pub success: bool,
    pub attempts: u32,
}

impl Acquisition {
    pub fn values<T, const N: usize>(&self) -> [T; N]
    where
        T: TryFrom<i64> + Default + Copy,
    {
        let mut out = [T::default(); N];
        if self.success {
            for (slot, value) in out.iter_mut().zip(&self.reading.values) {
                *slot = T::try_from(*value).unwrap_or_default();
            }
        }
        out
    }
}

/// Applies a power-of-ten exponent. Negative exponents divide and truncate
/// toward zero. Returns `None` on overflow.
pub fn apply_scale(raw: i64, exponent: i32) -> Option<i64> {
    if exponent >= 0 {
        10i64
            .checked_pow(exponent as u32)
            .and_then(|factor| raw.checked_mul(factor))
    } else {
        match 10i64.checked_pow(exponent.unsigned_abs()) {
            Some(divisor) => Some(raw / divisor),
            None => Some(0),
        }
    }
}

pub struct RegisterReader {
    transport: Box<dyn RegisterTransport>,
    slave_id: u8,
    word_order: WordOrder,
    max_attempts: u32,
    backoff: Duration,
    map: RegisterMap,
}

impl RegisterReader {
    pub fn new(transport: Box<dyn RegisterTransport>, config: &MeterConfig) -> Self {
        Self {
            transport,
            slave_id: config.device_address,
            word_order: config.word_order,
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
            map: config.registers,
        }
    }

    pub fn register_map(&self) -> &RegisterMap {
        &self.map
    }

    pub fn read_quantity(&mut self, quantity: Quantity) -> Acquisition {
        let group = *quantity.group(&self.map);
        self.read_group(&group, quantity)
    }

    pub fn read_group(&mut self, group: &RegisterGroup, quantity: Quantity) -> Acquisition {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.attempt(group, quantity) {
                Ok(reading) => {
                    debug!(
                        "📊 {} read in {} attempt(s): raw {:?} scale {} -> {:?}",
                        quantity, attempts, reading.raw, reading.scale, reading.values
                    );
                    return Acquisition {
                        reading,
                        success: true,
                        attempts,
                    };
                }
                Err(e) if attempts < self.max_attempts => {
                    debug!("🔁 {} attempt {} failed: {}", quantity, attempts, e);
                    if !self.backoff.is_zero() {
                        thread::sleep(self.backoff);
                    }
                }
                Err(e) => {
                    warn!(
                        "❌ {} read failed after {} attempts: {}",
                        quantity, attempts, e
                    );
                    return Acquisition {
                        reading: ScaledReading::default(),
                        success: false,
                        attempts,
                    };
                }
            }
        }
    }

    fn attempt(
        &mut self,
        group: &RegisterGroup,
        quantity: Quantity,
    ) -> Result<ScaledReading, ModbusError> {
        let (block, scale) = match group.scale {
            ScaleLocation::Trailing => {
                let mut block =
                    self.transport
                        .read_holding_registers(self.slave_id, group.start, group.span())?;
                let scale = block.pop().ok_or(ModbusError::InvalidResponse)? as i16;
                (block, scale)
            }
            ScaleLocation::Register(register) => {
                let scale = self
                    .transport
                    .read_holding_registers(self.slave_id, register, 1)?
                    .first()
                    .copied()
                    .ok_or(ModbusError::InvalidResponse)? as i16;
                let block =
                    self.transport
                        .read_holding_registers(self.slave_id, group.start, group.span())?;
                (block, scale)
            }
        };

        if scale == SCALE_NOT_IMPLEMENTED || !(-SCALE_LIMIT..=SCALE_LIMIT).contains(&scale) {
            return Err(ModbusError::InvalidData(format!(
                "{} scale factor {} out of range",
                quantity, scale
            )));
        }

        let words = group.format.words() as usize;
        if block.len() != group.values as usize * words {
            return Err(ModbusError::InvalidResponse);
        }

        let raw: Vec<i64> = block
            .chunks_exact(words)
            .map(|chunk| group.format.decode(chunk, self.word_order))
            .collect();

        let exponent = scale as i32 + quantity.scale_offset();
        let (min, max) = quantity.value_range();
        let values = raw
            .iter()
            .map(|&r| {
                apply_scale(r, exponent)
                    .filter(|v| (min..=max).contains(v))
                    .ok_or_else(|| {
                        ModbusError::InvalidData(format!(
                            "{} value {} x 10^{} does not fit",
                            quantity, r, exponent
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ScaledReading { raw, scale, values })
    }
}
