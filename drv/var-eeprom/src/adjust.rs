// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DDR table adjustment from the SOM EEPROM
//!
//! From record version 2 on, the SOM EEPROM carries one sparse table of
//! register overrides per DDR table, laid out back to back.  `off[i]` is
//! where table `i` starts and `off[i + 1]` where it ends; a zero in
//! `off[i + 1]` means there are no more tables.  Table lengths aren't stored
//! anywhere else.
//!
//! Overrides are assumed to be listed in the same register order as the
//! table they patch, which lets us merge with a single forward pass: the
//! search position in the base table only ever moves forward.  An override
//! that doesn't match anything at or after that position runs the position
//! off the end of the table, and every override after it in the same table
//! is then dropped.

use drv_ddr_api::{CfgTable, DramCfgParam, DramTimingInfo};
use drv_i2c_api::I2cBus;
use ringbuf::*;
use static_assertions::const_assert_eq;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::EepromError;
use crate::reader::{Coherence, Eeprom};
use crate::som::{DRAM_TABLE_NUM, RecordValidity, SomRecord};

/// Records older than this have no adjustment tables.
pub const MIN_ADJUST_VERSION: u8 = 2;

/// An override row as stored in the EEPROM.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Unaligned,
)]
#[repr(C)]
pub struct CfgRow {
    pub reg: U32<LittleEndian>,
    pub val: U32<LittleEndian>,
}

pub const ROW_SIZE: usize = core::mem::size_of::<CfgRow>();
const_assert_eq!(ROW_SIZE, core::mem::size_of::<DramCfgParam>());

impl From<CfgRow> for DramCfgParam {
    fn from(row: CfgRow) -> Self {
        DramCfgParam::new(row.reg.get(), row.val.get())
    }
}

impl From<DramCfgParam> for CfgRow {
    fn from(p: DramCfgParam) -> Self {
        CfgRow {
            reg: U32::new(p.reg),
            val: U32::new(p.val),
        }
    }
}

/// One table the EEPROM knows how to adjust.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AdjustTable {
    pub name: &'static str,
    pub table: CfgTable,
}

/// The tables behind `off[0]`, `off[1]`, ... in that order.  Nothing in the
/// EEPROM says which table is which; this has to agree with the tool that
/// provisioned it.
pub const ADJUST_TABLES: [AdjustTable; DRAM_TABLE_NUM] = [
    AdjustTable {
        name: "DDRC",
        table: CfgTable::Ddrc,
    },
    AdjustTable {
        name: "DDR PHY",
        table: CfgTable::DdrPhy,
    },
    AdjustTable {
        name: "PIE",
        table: CfgTable::DdrPhyPie,
    },
    AdjustTable {
        name: "FSP0",
        table: CfgTable::Fsp(0),
    },
    AdjustTable {
        name: "FSP0 2D",
        table: CfgTable::Fsp(1),
    },
];

/// What to do when reading an override row fails.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReadFailurePolicy {
    /// Stop and return the error; tables patched so far stay patched and the
    /// data rate is left alone.
    Abort,
    /// Give up on the current table and carry on with the next one.
    SkipTable,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    Untrusted,
    /// Record predates adjustment tables
    Version(u8),
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TableReport {
    pub offset: u8,
    /// Rows the offset table says are there
    pub rows: u16,
    /// Rows actually read
    pub read: u16,
    pub matched: u16,
    pub error: Option<EepromError>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AdjustReport {
    pub tables: [TableReport; DRAM_TABLE_NUM],
    pub fsp_drate: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Adjustment {
    Skipped(SkipReason),
    Applied(AdjustReport),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AdjustError {
    pub table: &'static str,
    pub row: u16,
    pub error: EepromError,
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Skipped(SkipReason),
    Offsets([u8; DRAM_TABLE_NUM + 1]),
    Sizes([u16; DRAM_TABLE_NUM]),
    NoSuchTable(CfgTable),
    Table { table: CfgTable, offset: u8, rows: u16 },
    Adjusted { reg: u32, val: u32 },
    Dropped { reg: u32 },
    ReadFailed { table: CfgTable, row: u16, err: EepromError },
    FspDrate(u32),
}

ringbuf!(Trace, 32, Trace::None);

/// Computes the number of rows in each adjustment table from the offset
/// table.
///
/// Tables at and after the first zero end offset are absent.  An end offset
/// below its start also yields an empty table.
pub fn adjustment_table_sizes(
    off: &[u8; DRAM_TABLE_NUM + 1],
) -> [u16; DRAM_TABLE_NUM] {
    let mut sizes = [0; DRAM_TABLE_NUM];
    for (size, pair) in sizes.iter_mut().zip(off.windows(2)) {
        let (start, end) = (pair[0], pair[1]);
        if end == 0 {
            break;
        }
        *size = (usize::from(end.saturating_sub(start)) / ROW_SIZE) as u16;
    }
    sizes
}

/// Forward-only merge of override rows into a single table.
pub struct Merge<'t> {
    table: &'t mut [DramCfgParam],
    cursor: usize,
}

impl<'t> Merge<'t> {
    pub fn new(table: &'t mut [DramCfgParam]) -> Self {
        Self { table, cursor: 0 }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Overwrites the first entry at or after the cursor whose register
    /// matches `row`, returning its index.
    ///
    /// The cursor stays on the matched entry, so a repeated register hits the
    /// same entry again.  With no match the cursor is left at the end of the
    /// table.
    pub fn apply(&mut self, row: DramCfgParam) -> Option<usize> {
        while let Some(entry) = self.table.get_mut(self.cursor) {
            if entry.reg == row.reg {
                entry.val = row.val;
                return Some(self.cursor);
            }
            self.cursor += 1;
        }
        None
    }
}

/// Patches `timing` with the adjustment tables described by `record`.
///
/// Untrusted records and records older than [`MIN_ADJUST_VERSION`] leave
/// `timing` untouched and issue no reads.  Otherwise every present table is
/// merged, reading one row per bus transaction, and the data rate from the
/// record is applied to both frequency set points.
pub fn adjust_dram<B: I2cBus, C: Coherence>(
    eeprom: &Eeprom<B, C>,
    record: &SomRecord,
    validity: &(impl RecordValidity + ?Sized),
    timing: &mut DramTimingInfo<'_>,
    policy: ReadFailurePolicy,
) -> Result<Adjustment, AdjustError> {
    if !validity.is_trusted(record) {
        ringbuf_entry!(Trace::Skipped(SkipReason::Untrusted));
        return Ok(Adjustment::Skipped(SkipReason::Untrusted));
    }

    if record.version < MIN_ADJUST_VERSION {
        let reason = SkipReason::Version(record.version);
        ringbuf_entry!(Trace::Skipped(reason));
        return Ok(Adjustment::Skipped(reason));
    }

    ringbuf_entry!(Trace::Offsets(record.off));
    let sizes = adjustment_table_sizes(&record.off);
    ringbuf_entry!(Trace::Sizes(sizes));

    let mut tables = [TableReport::default(); DRAM_TABLE_NUM];

    for (i, adj) in ADJUST_TABLES.iter().enumerate() {
        let report = &mut tables[i];
        report.offset = record.off[i];
        report.rows = sizes[i];
        if report.rows == 0 {
            continue;
        }

        let Some(table) = timing.table_mut(adj.table) else {
            ringbuf_entry!(Trace::NoSuchTable(adj.table));
            continue;
        };

        ringbuf_entry!(Trace::Table {
            table: adj.table,
            offset: report.offset,
            rows: report.rows,
        });

        let mut merge = Merge::new(table);
        for row in 0..report.rows {
            let addr =
                u32::from(report.offset) + u32::from(row) * ROW_SIZE as u32;
            let entry: CfgRow = match eeprom.read(addr) {
                Ok(entry) => entry,
                Err(err) => {
                    ringbuf_entry!(Trace::ReadFailed {
                        table: adj.table,
                        row,
                        err,
                    });
                    report.error = Some(err);
                    match policy {
                        ReadFailurePolicy::Abort => {
                            return Err(AdjustError {
                                table: adj.name,
                                row,
                                error: err,
                            });
                        }
                        ReadFailurePolicy::SkipTable => break,
                    }
                }
            };
            report.read += 1;

            let param = DramCfgParam::from(entry);
            match merge.apply(param) {
                Some(_) => {
                    ringbuf_entry!(Trace::Adjusted {
                        reg: param.reg,
                        val: param.val,
                    });
                    report.matched += 1;
                }
                None => ringbuf_entry!(Trace::Dropped { reg: param.reg }),
            }
        }
    }

    let fsp_drate = u32::from(record.fsp_drate.get());
    ringbuf_entry!(Trace::FspDrate(fsp_drate));
    for msg in timing.fsp_msg.iter_mut().take(2) {
        msg.drate = fsp_drate;
    }
    timing.fsp_table[0] = fsp_drate;

    Ok(Adjustment::Applied(AdjustReport { tables, fsp_drate }))
}
