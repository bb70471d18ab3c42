use log::info;

pub trait Indicator {
    fn flash(&mut self, times: u8);
}

#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn flash(&mut self, times: u8) {
        info!("💡 LED flash x{}", times);
    }
}
