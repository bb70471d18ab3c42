use serde::{Deserialize, Serialize};

use super::crc::crc16_modbus;
use crate::utils::error::ModbusError;

pub const READ_HOLDING_REGISTERS: u8 = 0x03;
pub const EXCEPTION_FLAG: u8 = 0x80;
pub const MAX_READ_COUNT: u16 = 125;

/// Order of the two 16-bit words that make up a 32-bit value. `ABCD` puts the
/// high word in the lower register, `CDAB` the low word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WordOrder {
    #[serde(rename = "ABCD")]
    Abcd,
    #[default]
    #[serde(rename = "CDAB")]
    Cdab,
}

impl WordOrder {
    pub fn combine(self, first: u16, second: u16) -> u32 {
        match self {
            WordOrder::Abcd => ((first as u32) << 16) | second as u32,
            WordOrder::Cdab => ((second as u32) << 16) | first as u32,
        }
    }

    pub fn split(self, value: u32) -> [u16; 2] {
        let high = (value >> 16) as u16;
        let low = (value & 0xFFFF) as u16;
        match self {
            WordOrder::Abcd => [high, low],
            WordOrder::Cdab => [low, high],
        }
    }
}

pub fn read_holding_request(slave_id: u8, start_addr: u16, count: u16) -> Vec<u8> {
    let mut request = vec![slave_id, READ_HOLDING_REGISTERS];
    request.extend_from_slice(&start_addr.to_be_bytes());
    request.extend_from_slice(&count.to_be_bytes());

    let crc = crc16_modbus(&request);
    request.extend_from_slice(&crc.to_le_bytes());
    request
}

pub fn expected_response_len(count: u16) -> usize {
    5 + (count as usize) * 2
}

pub fn parse_read_holding_response(
    slave_id: u8,
    count: u16,
    frame: &[u8],
) -> Result<Vec<u16>, ModbusError> {
    if frame.len() < 5 {
        return Err(ModbusError::InvalidResponse);
    }

    let data_len = frame.len() - 2;
    let received_crc = u16::from_le_bytes([frame[data_len], frame[data_len + 1]]);
    if received_crc != crc16_modbus(&frame[..data_len]) {
        return Err(ModbusError::CrcError);
    }

    if frame[0] != slave_id {
        return Err(ModbusError::InvalidResponse);
    }

    if frame[1] == READ_HOLDING_REGISTERS | EXCEPTION_FLAG {
        return Err(ModbusError::Exception {
            address: slave_id,
            code: frame[2],
        });
    }

    if frame[1] != READ_HOLDING_REGISTERS
        || frame.len() != expected_response_len(count)
        || frame[2] as usize != count as usize * 2
    {
        return Err(ModbusError::InvalidResponse);
    }

    Ok(frame[3..data_len]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(slave_id: u8, registers: &[u16]) -> Vec<u8> {
        let mut frame = vec![slave_id, READ_HOLDING_REGISTERS, (registers.len() * 2) as u8];
        for r in registers {
            frame.extend_from_slice(&r.to_be_bytes());
        }
        let crc = crc16_modbus(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        frame
    }

    #[test]
    fn test_request_layout() {
        let request = read_holding_request(1, 4219, 1);
        assert_eq!(&request[..6], &[0x01, 0x03, 0x10, 0x7B, 0x00, 0x01]);
        assert_eq!(request.len(), 8);
    }

    #[test]
    fn test_parse_valid_response() {
        let frame = response(1, &[0x1234, 0xFFFE]);
        let values = parse_read_holding_response(1, 2, &frame).unwrap();
        assert_eq!(values, vec![0x1234, 0xFFFE]);
    }

    #[test]
    fn test_parse_rejects_bad_crc() {
        let mut frame = response(1, &[7]);
        frame[3] ^= 0xFF;
        assert_eq!(
            parse_read_holding_response(1, 1, &frame),
            Err(ModbusError::CrcError)
        );
    }

    #[test]
    fn test_parse_rejects_wrong_slave_and_count() {
        let frame = response(2, &[7]);
        assert_eq!(
            parse_read_holding_response(1, 1, &frame),
            Err(ModbusError::InvalidResponse)
        );
        let frame = response(1, &[7, 8]);
        assert_eq!(
            parse_read_holding_response(1, 1, &frame),
            Err(ModbusError::InvalidResponse)
        );
    }

    #[test]
    fn test_parse_exception_response() {
        let mut frame = vec![1, 0x83, 0x02];
        let crc = crc16_modbus(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        assert_eq!(
            parse_read_holding_response(1, 1, &frame),
            Err(ModbusError::Exception { address: 1, code: 2 })
        );
    }

    #[test]
    fn test_word_order() {
        assert_eq!(WordOrder::Abcd.combine(0x0001, 0x0002), 0x0001_0002);
        assert_eq!(WordOrder::Cdab.combine(0x0001, 0x0002), 0x0002_0001);
        assert_eq!(WordOrder::Cdab.split(0x0002_0001), [0x0001, 0x0002]);
    }
}
