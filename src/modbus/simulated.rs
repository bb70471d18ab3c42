use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::client::RegisterTransport;
use super::protocol::WordOrder;
use crate::utils::error::ModbusError;

#[derive(Debug, Default)]
struct MeterState {
    registers: HashMap<u16, u16>,
    fail_next: usize,
    failing: Vec<u16>,
    reads: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedMeter {
    slave_id: u8,
    state: Rc<RefCell<MeterState>>,
}

impl SimulatedMeter {
    pub fn new(slave_id: u8) -> Self {
        Self {
            slave_id,
            state: Rc::default(),
        }
    }

    pub fn set_u16(&self, register: u16, value: u16) {
        self.state.borrow_mut().registers.insert(register, value);
    }

    pub fn set_i16(&self, register: u16, value: i16) {
        self.set_u16(register, value as u16);
    }

    pub fn set_u32(&self, register: u16, value: u32, order: WordOrder) {
        let [first, second] = order.split(value);
        self.set_u16(register, first);
        self.set_u16(register.wrapping_add(1), second);
    }

    pub fn fail_next(&self, count: usize) {
        self.state.borrow_mut().fail_next = count;
    }

    /// Every read touching `register` fails until [`SimulatedMeter::heal`].
    pub fn fail_register(&self, register: u16) {
        self.state.borrow_mut().failing.push(register);
    }

    pub fn heal(&self) {
        let mut state = self.state.borrow_mut();
        state.failing.clear();
        state.fail_next = 0;
    }

    pub fn reads(&self) -> usize {
        self.state.borrow().reads
    }
}

impl RegisterTransport for SimulatedMeter {
    fn read_holding_registers(
        &mut self,
        slave_id: u8,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<u16>, ModbusError> {
        let mut state = self.state.borrow_mut();
        state.reads += 1;

        if slave_id != self.slave_id {
            return Err(ModbusError::Timeout);
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            debug!("simulated timeout for {}+{}", start_addr, count);
            return Err(ModbusError::Timeout);
        }
        let end = start_addr as u32 + count as u32;
        if state
            .failing
            .iter()
            .any(|&r| (r as u32) >= start_addr as u32 && (r as u32) < end)
        {
            return Err(ModbusError::Timeout);
        }

        Ok((0..count)
            .map(|i| {
                let register = start_addr.wrapping_add(i);
                state.registers.get(&register).copied().unwrap_or(0)
            })
            .collect())
    }
}
