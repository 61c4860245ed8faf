// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver for Variscite-format identity EEPROMs.
//!
//! Two EEPROMs are involved during bring-up:
//!
//! - The SOM EEPROM ([`som`]) holds the module identity (MAC, part number,
//!   DRAM size) and, from version 2 on, a set of sparse override tables for
//!   the DDR initialization tables.  [`adjust`] merges those overrides into
//!   the compiled-in tables before DRAM is trained.
//! - The carrier EEPROM ([`carrier`]) identifies the carrier board revision
//!   and is checksummed from structure version 2 on.
//!
//! Nothing here treats a missing or corrupt EEPROM as fatal: accessors fall
//! back to defaults so that boot can continue.

#![cfg_attr(not(test), no_std)]

use drv_i2c_api::ResponseCode;

pub mod adjust;
pub mod carrier;
mod reader;
pub mod som;

pub use reader::{Coherence, Eeprom, NoCache};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EepromError {
    /// The bus or the device on it could not be found
    BusUnavailable(ResponseCode),
    /// A read was started but did not complete
    TransactionFailed(ResponseCode),
}

impl From<EepromError> for ResponseCode {
    fn from(err: EepromError) -> Self {
        match err {
            EepromError::BusUnavailable(code) => code,
            EepromError::TransactionFailed(code) => code,
        }
    }
}

/// Where the EEPROMs live and what to assume when they can't be read.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EepromConfig {
    pub som_bus: &'static str,
    pub som_address: u8,
    pub carrier_bus: &'static str,
    pub carrier_address: u8,
    /// DRAM size in bytes reported for an untrusted SOM EEPROM
    pub default_dram_size: u64,
    pub part_prefix: &'static str,
}

include!(concat!(env!("OUT_DIR"), "/eeprom_config.rs"));
