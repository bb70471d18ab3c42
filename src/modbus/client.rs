use crate::utils::error::ModbusError;

/// Register-level access to a meter. Reads are synchronous: the caller's
/// scheduler turn blocks until the answer (or the transport timeout) arrives.
pub trait RegisterTransport {
    fn read_holding_registers(
        &mut self,
        slave_id: u8,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<u16>, ModbusError>;
}

#[cfg(feature = "serial")]
pub use rtu::RtuClient;

#[cfg(feature = "serial")]
mod rtu {
    use log::{debug, error, info};
    use serialport::{ClearBuffer, SerialPort};
    use std::io::{Read, Write};
    use std::thread;
    use std::time::Duration;

    use super::RegisterTransport;
    use crate::config::settings::{MeterConfig, ParityConfig};
    use crate::modbus::protocol::{
        parse_read_holding_response, read_holding_request, EXCEPTION_FLAG, MAX_READ_COUNT,
    };
    use crate::utils::error::ModbusError;

    pub struct RtuClient {
        port: Box<dyn SerialPort>,
        turnaround: Duration,
    }

    impl RtuClient {
        pub fn open(config: &MeterConfig) -> Result<Self, ModbusError> {
            info!("🔌 Connecting to Modbus RTU port: {}", config.serial_port);
            info!(
                "⚙️  Configuration: {} baud, 8 data bits, 1 stop bit, parity {:?}",
                config.baud_rate, config.parity
            );

            let serial_parity = match config.parity {
                ParityConfig::None => serialport::Parity::None,
                ParityConfig::Even => serialport::Parity::Even,
                ParityConfig::Odd => serialport::Parity::Odd,
            };

            let port = serialport::new(&config.serial_port, config.baud_rate)
                .timeout(Duration::from_millis(config.timeout_ms))
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serial_parity)
                .open()
                .map_err(|e| {
                    error!("❌ Failed to open serial port {}: {}", config.serial_port, e);
                    ModbusError::ConnectionError(format!("Failed to open port: {}", e))
                })?;

            info!("✅ Modbus RTU connection established");
            Ok(Self {
                port,
                turnaround: Duration::from_millis(config.turnaround_ms),
            })
        }

        fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ModbusError> {
            self.port.read_exact(buf).map_err(ModbusError::from)
        }
    }

    impl RegisterTransport for RtuClient {
        fn read_holding_registers(
            &mut self,
            slave_id: u8,
            start_addr: u16,
            count: u16,
        ) -> Result<Vec<u16>, ModbusError> {
            if count == 0 || count > MAX_READ_COUNT {
                return Err(ModbusError::InvalidData(format!(
                    "register count {} out of range",
                    count
                )));
            }
            debug!(
                "📊 Reading {} registers from device {} starting at {}",
                count, slave_id, start_addr
            );

            let request = read_holding_request(slave_id, start_addr, count);
            self.port
                .clear(ClearBuffer::Input)
                .map_err(|e| ModbusError::CommunicationError(format!("Clear failed: {}", e)))?;
            self.port
                .write_all(&request)
                .map_err(|e| ModbusError::CommunicationError(format!("Write failed: {}", e)))?;
            self.port
                .flush()
                .map_err(|e| ModbusError::CommunicationError(format!("Flush failed: {}", e)))?;

            thread::sleep(self.turnaround);

            // address, function, byte count (or exception code)
            let mut frame = vec![0u8; 3];
            self.read_exact(&mut frame)?;

            let remaining = if frame[1] & EXCEPTION_FLAG != 0 {
                2
            } else {
                frame[2] as usize + 2
            };
            let header_len = frame.len();
            frame.resize(header_len + remaining, 0);
            self.read_exact(&mut frame[header_len..])?;

            parse_read_holding_response(slave_id, count, &frame)
        }
    }
}
