use chrono::Utc;
use serde_json::json;

use crate::storage::models::{ButtonConfigFile, ButtonFile, EnergyConfigFile, EnergyFile};
use crate::services::transmission::NetworkQuality;

pub trait RecordFormatter {
    fn format_energy(&self, record: &EnergyFile) -> String;
    fn format_energy_config(&self, config: &EnergyConfigFile) -> String;
    fn format_button(&self, record: &ButtonFile) -> String;
    fn format_button_config(&self, config: &ButtonConfigFile) -> String;
    fn format_network_quality(&self, quality: &NetworkQuality) -> String;
}

pub struct ConsoleFormatter;

impl RecordFormatter for ConsoleFormatter {
    fn format_energy(&self, record: &EnergyFile) -> String {
        let status = if record.measurement_valid {
            "✅ valid"
        } else {
            "⚠️  INVALID"
        };
        let mut output = format!("🔹 Energy measurement ({})\n", status);
        for (i, phase) in ["A", "B", "C"].iter().enumerate() {
            output.push_str(&format!(
                "  Phase {}: real {} Wh | apparent {} VAh | {} V | {} mA\n",
                phase,
                record.real_energy[i],
                record.apparent_energy[i],
                record.voltage[i],
                record.current[i]
            ));
        }
        output
    }

    fn format_energy_config(&self, config: &EnergyConfigFile) -> String {
        format!(
            "⚙️  Energy config: every {} s, {}\n",
            config.interval,
            if config.enabled { "enabled" } else { "disabled" }
        )
    }

    fn format_button(&self, record: &ButtonFile) -> String {
        format!(
            "🔘 Button {} {} (state 0b{:08b})\n",
            record.button_id,
            if record.mask { "pressed" } else { "released" },
            record.buttons_state
        )
    }

    fn format_button_config(&self, config: &ButtonConfigFile) -> String {
        format!(
            "⚙️  Button config: releases {}, presses {}, menu {}, {}\n",
            config.transmit_mask_0,
            config.transmit_mask_1,
            config.button_control_menu,
            if config.enabled { "enabled" } else { "disabled" }
        )
    }

    fn format_network_quality(&self, quality: &NetworkQuality) -> String {
        let mut output = format!("📶 Acks: {} | Nacks: {}\n", quality.acks, quality.nacks);
        if let Some(budget) = quality.last_link_budget {
            output.push_str(&format!("   Last link budget: {} dB\n", budget));
        }
        if let Some(at) = quality.last_ack_at {
            output.push_str(&format!("   Last ack: {}\n", at.format("%Y-%m-%d %H:%M:%S")));
        }
        output
    }
}

pub struct JsonFormatter;

impl JsonFormatter {
    fn render<T: serde::Serialize>(kind: &str, value: &T) -> String {
        json!({
            "type": kind,
            "timestamp": Utc::now().to_rfc3339(),
            "data": value,
        })
        .to_string()
    }
}

impl RecordFormatter for JsonFormatter {
    fn format_energy(&self, record: &EnergyFile) -> String {
        Self::render("energy", record)
    }

    fn format_energy_config(&self, config: &EnergyConfigFile) -> String {
        Self::render("energy_config", config)
    }

    fn format_button(&self, record: &ButtonFile) -> String {
        Self::render("button", record)
    }

    fn format_button_config(&self, config: &ButtonConfigFile) -> String {
        Self::render("button_config", config)
    }

    fn format_network_quality(&self, quality: &NetworkQuality) -> String {
        Self::render("network_quality", quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_energy_record() {
        let record = EnergyFile {
            real_energy: [1, 2, 3],
            measurement_valid: true,
            ..EnergyFile::default()
        };
        let value: serde_json::Value =
            serde_json::from_str(&JsonFormatter.format_energy(&record)).unwrap();
        assert_eq!(value["type"], "energy");
        assert_eq!(value["data"]["real_energy"][2], 3);
        assert_eq!(value["data"]["measurement_valid"], true);
    }

    #[test]
    fn test_console_marks_invalid_records() {
        let output = ConsoleFormatter.format_energy(&EnergyFile::default());
        assert!(output.contains("INVALID"));
        assert!(output.contains("Phase C"));
    }
}
