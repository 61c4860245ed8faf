// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SOM identity record
//!
//! The record sits at the start of the SOM EEPROM and is read in one go.
//! Whether it can be believed at all is decided by a [`RecordValidity`]
//! predicate supplied by the board; every accessor here consults it and
//! degrades to a default (or to nothing) rather than hand out data from a
//! blank or corrupt part.

use core::fmt;

use static_assertions::const_assert_eq;
use zerocopy::byteorder::{LittleEndian, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Number of DDR tables that can carry adjustments.
pub const DRAM_TABLE_NUM: usize = 5;

/// One unit of `dramsize`, in bytes.
pub const DRAM_SIZE_UNIT: u64 = 128 << 20;

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
pub struct SomRecord {
    pub magic: U16<LittleEndian>,
    pub partnum: [u8; 3],
    pub assembly: [u8; 10],
    /// `YYYY` `MMM` `DD`, without separators
    pub date: [u8; 9],
    pub mac: [u8; 6],
    pub somrev: u8,
    pub version: u8,
    pub features: u8,
    /// In units of [`DRAM_SIZE_UNIT`]
    pub dramsize: u8,
    /// EEPROM offset of each adjustment table, plus one trailing entry
    /// marking the end of the last.  A zero ends the list early.
    pub off: [u8; DRAM_TABLE_NUM + 1],
    /// Only valid from version 3 on
    pub partnum2: [u8; 5],
    /// Data rate for all frequency set points, in MT/s
    pub fsp_drate: U16<LittleEndian>,
}

const_assert_eq!(core::mem::size_of::<SomRecord>(), 47);

/// Decides whether a [`SomRecord`] was actually provisioned.
///
/// The structural check is board policy and lives outside this crate.
pub trait RecordValidity {
    fn is_trusted(&self, record: &SomRecord) -> bool;
}

impl<F: Fn(&SomRecord) -> bool + ?Sized> RecordValidity for F {
    fn is_trusted(&self, record: &SomRecord) -> bool {
        self(record)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NotTrusted;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

pub fn mac_address(
    record: &SomRecord,
    validity: &(impl RecordValidity + ?Sized),
) -> Result<MacAddress, NotTrusted> {
    if !validity.is_trusted(record) {
        return Err(NotTrusted);
    }
    Ok(MacAddress(record.mac))
}

/// Returns the DRAM size in bytes, or `default` if the record can't be
/// trusted.
pub fn dram_size(
    record: &SomRecord,
    validity: &(impl RecordValidity + ?Sized),
    default: u64,
) -> u64 {
    if !validity.is_trusted(record) {
        return default;
    }
    u64::from(record.dramsize) * DRAM_SIZE_UNIT
}

/// Everything we report about the module at boot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProductInfo<'a> {
    pub prefix: &'a str,
    pub part_number: heapless::Vec<u8, 8>,
    pub assembly: &'a [u8],
    pub year: &'a [u8],
    pub month: &'a [u8],
    pub day: &'a [u8],
    pub serial: MacAddress,
    pub somrev: u8,
    pub features: u8,
    pub version: u8,
    pub dram_mib: u32,
}

/// Gathers the product information from a trusted record; an untrusted one
/// yields nothing at all.
pub fn product_info<'a>(
    record: &'a SomRecord,
    validity: &(impl RecordValidity + ?Sized),
    prefix: &'a str,
) -> Option<ProductInfo<'a>> {
    if !validity.is_trusted(record) {
        return None;
    }

    let mut part_number = heapless::Vec::new();
    part_number.extend_from_slice(&record.partnum).ok()?;
    if record.version >= 3 {
        part_number.extend_from_slice(&record.partnum2).ok()?;
    }

    let (year, rest) = record.date.split_at(4);
    let (month, day) = rest.split_at(3);

    Some(ProductInfo {
        prefix,
        part_number,
        assembly: &record.assembly,
        year,
        month,
        day,
        serial: MacAddress(record.mac),
        somrev: record.somrev,
        features: record.features,
        version: record.version,
        dram_mib: u32::from(record.dramsize) * 128,
    })
}

/// Trims a fixed-width text field at its first NUL.
pub(crate) fn text(field: &[u8]) -> &[u8] {
    match field.iter().position(|&b| b == 0) {
        Some(n) => &field[..n],
        None => field,
    }
}

impl fmt::Display for ProductInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Part number: {}{}",
            self.prefix,
            text(&self.part_number).escape_ascii()
        )?;
        writeln!(f, "Assembly: AS{}", text(self.assembly).escape_ascii())?;
        writeln!(
            f,
            "Production date: {} {} {}",
            text(self.year).escape_ascii(),
            text(self.month).escape_ascii(),
            text(self.day).escape_ascii(),
        )?;
        writeln!(f, "Serial Number: {}", self.serial)?;
        write!(f, "SOM revision: {:#x}", self.somrev)
    }
}
