// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DDR controller initialization tables
//!
//! These are the register/value tables that get written into the DDR
//! controller and PHY during bring-up.  Boards compile in a default set and
//! hand out mutable references to it, so that code which knows better (e.g.
//! from a manufacturing EEPROM) can patch values in place before training
//! starts.

#![cfg_attr(not(test), no_std)]

/// A single register write.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[repr(C)]
pub struct DramCfgParam {
    pub reg: u32,
    pub val: u32,
}

impl DramCfgParam {
    pub const fn new(reg: u32, val: u32) -> Self {
        Self { reg, val }
    }
}

/// Which PHY training firmware a frequency set point runs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FwType {
    OneD,
    TwoD,
}

/// Message block for one frequency set point (FSP).
#[derive(Debug)]
pub struct FspMsg<'a> {
    /// Data rate in MT/s
    pub drate: u32,
    pub fw_type: FwType,
    pub fsp_cfg: &'a mut [DramCfgParam],
}

/// The complete set of tables used to bring up DRAM.
///
/// Register addresses within each table are expected to be sorted; code that
/// patches these tables is allowed to rely on that.
#[derive(Debug)]
pub struct DramTimingInfo<'a> {
    pub ddrc_cfg: &'a mut [DramCfgParam],
    pub ddrphy_cfg: &'a mut [DramCfgParam],
    pub fsp_msg: &'a mut [FspMsg<'a>],
    pub ddrphy_trained_csr: &'a mut [DramCfgParam],
    pub ddrphy_pie: &'a mut [DramCfgParam],
    /// Data rate for each FSP, indexed by set point
    pub fsp_table: [u32; 4],
}

/// Names one of the register tables in [`DramTimingInfo`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CfgTable {
    Ddrc,
    DdrPhy,
    DdrPhyTrainedCsr,
    DdrPhyPie,
    /// The `fsp_cfg` table of the given FSP message
    Fsp(usize),
}

impl DramTimingInfo<'_> {
    /// Returns the requested table, or `None` if it refers to an FSP message
    /// this board doesn't have.
    pub fn table(&self, which: CfgTable) -> Option<&[DramCfgParam]> {
        match which {
            CfgTable::Ddrc => Some(&*self.ddrc_cfg),
            CfgTable::DdrPhy => Some(&*self.ddrphy_cfg),
            CfgTable::DdrPhyTrainedCsr => Some(&*self.ddrphy_trained_csr),
            CfgTable::DdrPhyPie => Some(&*self.ddrphy_pie),
            CfgTable::Fsp(i) => self.fsp_msg.get(i).map(|m| &*m.fsp_cfg),
        }
    }

    pub fn table_mut(
        &mut self,
        which: CfgTable,
    ) -> Option<&mut [DramCfgParam]> {
        match which {
            CfgTable::Ddrc => Some(&mut *self.ddrc_cfg),
            CfgTable::DdrPhy => Some(&mut *self.ddrphy_cfg),
            CfgTable::DdrPhyTrainedCsr => Some(&mut *self.ddrphy_trained_csr),
            CfgTable::DdrPhyPie => Some(&mut *self.ddrphy_pie),
            CfgTable::Fsp(i) => {
                self.fsp_msg.get_mut(i).map(|m| &mut *m.fsp_cfg)
            }
        }
    }
}
