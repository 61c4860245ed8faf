// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::Deserialize;
use std::io::Write;

/// This represents our _subset_ of global config and _must not_ be marked with
/// `deny_unknown_fields`!
#[derive(Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct GlobalConfig {
    #[serde(default)]
    var_eeprom: VarEepromConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
struct VarEepromConfig {
    /// Bus carrying the SOM EEPROM, by device-tree node name
    som_bus: String,
    som_address: u8,
    carrier_bus: String,
    carrier_address: u8,
    /// Capacity reported when the SOM EEPROM can't be trusted
    default_dram_size_mib: u32,
    /// Printed in front of the part number read from the EEPROM
    part_prefix: String,
}

impl Default for VarEepromConfig {
    fn default() -> Self {
        Self {
            som_bus: "i2c@44350000".to_string(),
            som_address: 0x52,
            carrier_bus: "i2c@42530000".to_string(),
            carrier_address: 0x54,
            default_dram_size_mib: 2048,
            part_prefix: "VSM-MX93-".to_string(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cfg = build_util::config_or_default::<GlobalConfig>()?.var_eeprom;

    if cfg.default_dram_size_mib == 0 {
        anyhow::bail!("var-eeprom.default-dram-size-mib must be non-zero");
    }

    let mut out = build_util::out_file("eeprom_config.rs")?;
    writeln!(
        out,
        "/// Board configuration, generated from the app config.
pub const BOARD_CONFIG: EepromConfig = EepromConfig {{
    som_bus: {:?},
    som_address: {:#04x},
    carrier_bus: {:?},
    carrier_address: {:#04x},
    default_dram_size: {} << 20,
    part_prefix: {:?},
}};",
        cfg.som_bus,
        cfg.som_address,
        cfg.carrier_bus,
        cfg.carrier_address,
        u64::from(cfg.default_dram_size_mib),
        cfg.part_prefix,
    )?;
    Ok(())
}
