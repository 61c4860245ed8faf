// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Carrier board identity record
//!
//! Older carrier boards have no EEPROM, or one with a version 1 structure
//! that carries no checksum.  Version 2 and above append a CRC-32 over the
//! rest of the record.  Anything we can't validate is reported as the
//! `legacy` revision.

use core::fmt;
use core::mem::offset_of;

use drv_i2c_api::I2cBus;
use ringbuf::*;
use static_assertions::const_assert_eq;
use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::reader::{Coherence, Eeprom};
use crate::{EepromError, som};

/// `"VC"`
pub const CARRIER_EEPROM_MAGIC: u16 = 0x5643;

/// Revision reported for boards we can't identify.
pub const LEGACY_REVISION: &[u8] = b"legacy";

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
pub struct CarrierRecord {
    pub magic: U16<BigEndian>,
    pub struct_ver: u8,
    pub carrier_rev: [u8; 16],
    /// CRC-32 over every byte before this field; version 2 and up only
    pub crc: U32<BigEndian>,
}

const_assert_eq!(core::mem::size_of::<CarrierRecord>(), 23);

const CRC_OFFSET: usize = offset_of!(CarrierRecord, crc);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CarrierError {
    BadMagic { found: u16, expected: u16 },
    BadVersion(u8),
    ChecksumMismatch { computed: u32, stored: u32 },
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Invalid(CarrierError),
    ReadFailed(EepromError),
}

ringbuf!(Trace, 4, Trace::None);

impl CarrierRecord {
    /// Computes the checksum the record should carry.
    pub fn expected_checksum(&self) -> u32 {
        static CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
        CRC.checksum(&self.as_bytes()[..CRC_OFFSET])
    }

    pub fn validate(&self) -> Result<(), CarrierError> {
        self.check().inspect_err(|&e| {
            ringbuf_entry!(Trace::Invalid(e));
        })
    }

    fn check(&self) -> Result<(), CarrierError> {
        let found = self.magic.get();
        if found != CARRIER_EEPROM_MAGIC {
            return Err(CarrierError::BadMagic {
                found,
                expected: CARRIER_EEPROM_MAGIC,
            });
        }

        match self.struct_ver {
            0 => Err(CarrierError::BadVersion(0)),
            1 => Ok(()),
            _ => {
                let computed = self.expected_checksum();
                let stored = self.crc.get();
                if computed == stored {
                    Ok(())
                } else {
                    Err(CarrierError::ChecksumMismatch { computed, stored })
                }
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Returns the stored revision if the record checks out, and
    /// [`LEGACY_REVISION`] otherwise.
    pub fn revision(&self) -> CarrierRevision {
        if self.is_valid() {
            CarrierRevision::new(som::text(&self.carrier_rev))
        } else {
            CarrierRevision::legacy()
        }
    }
}

/// A carrier board revision string, e.g. `1.4a`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CarrierRevision(heapless::Vec<u8, 16>);

impl CarrierRevision {
    fn new(bytes: &[u8]) -> Self {
        Self(heapless::Vec::from_slice(bytes).unwrap_or_default())
    }

    pub fn legacy() -> Self {
        Self::new(LEGACY_REVISION)
    }

    pub fn is_legacy(&self) -> bool {
        self.as_bytes() == LEGACY_REVISION
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for CarrierRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.escape_ascii())
    }
}

/// Probes the carrier EEPROM and reads its record.
pub fn read_carrier_record<B: I2cBus, C: Coherence>(
    bus: B,
    bus_name: &str,
    address: u8,
    cache: C,
) -> Result<CarrierRecord, EepromError> {
    let eeprom = Eeprom::probe(bus, bus_name, address, cache)?;
    eeprom.read(0).inspect_err(|&e| {
        ringbuf_entry!(Trace::ReadFailed(e));
    })
}

/// Collapses a failed read into the legacy revision, the same as an invalid
/// record: a board without a carrier EEPROM is a legacy board.
pub fn revision_or_legacy(
    read: Result<CarrierRecord, EepromError>,
) -> CarrierRevision {
    match read {
        Ok(record) => record.revision(),
        Err(_) => CarrierRevision::legacy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drv_i2c_api::ResponseCode;
    use drv_i2c_api::mock::{MockBus, MockDevice};
    use zerocopy::FromZeros;

    fn record(struct_ver: u8, rev: &[u8]) -> CarrierRecord {
        let mut r = CarrierRecord::new_zeroed();
        r.magic = U16::new(CARRIER_EEPROM_MAGIC);
        r.struct_ver = struct_ver;
        r.carrier_rev[..rev.len()].copy_from_slice(rev);
        r.crc = U32::new(r.expected_checksum());
        r
    }

    #[test]
    fn crc_is_standard_crc32() {
        static CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
        assert_eq!(CRC.checksum(b"123456789"), 0xcbf4_3926);
    }

    #[test]
    fn wire_layout() {
        let r = record(2, b"1.4a");
        let bytes = r.as_bytes();
        assert_eq!(&bytes[0..2], b"VC");
        assert_eq!(bytes[2], 2);
        assert_eq!(&bytes[3..7], b"1.4a");
        assert_eq!(CRC_OFFSET, 19);
        assert_eq!(&bytes[19..23], &r.expected_checksum().to_be_bytes());
    }

    #[test]
    fn good_v2_record() {
        let r = record(2, b"2.0");
        assert_eq!(r.validate(), Ok(()));
        assert_eq!(r.revision().as_bytes(), b"2.0");
        assert!(!r.revision().is_legacy());
    }

    #[test]
    fn bad_magic() {
        let mut r = record(2, b"2.0");
        r.magic = U16::new(0x4d58);
        assert_eq!(
            r.validate(),
            Err(CarrierError::BadMagic {
                found: 0x4d58,
                expected: CARRIER_EEPROM_MAGIC,
            })
        );
        assert!(r.revision().is_legacy());
    }

    #[test]
    fn magic_is_big_endian() {
        let mut r = record(1, b"1.4a");
        r.magic = U16::new(CARRIER_EEPROM_MAGIC.swap_bytes());
        assert!(!r.is_valid());
    }

    #[test]
    fn version_zero_is_invalid() {
        let r = record(0, b"2.0");
        assert_eq!(r.validate(), Err(CarrierError::BadVersion(0)));
        assert_eq!(r.revision().as_bytes(), LEGACY_REVISION);
    }

    #[test]
    fn version_one_ignores_checksum() {
        let mut r = record(1, b"1.4a");
        r.crc = U32::new(0xdead_beef);
        assert!(r.is_valid());
        assert_eq!(r.revision().as_bytes(), b"1.4a");
    }

    #[test]
    fn checksum_mismatch() {
        let mut r = record(3, b"2.0");
        let good = r.crc.get();
        r.carrier_rev[0] = b'3';
        assert_eq!(
            r.validate(),
            Err(CarrierError::ChecksumMismatch {
                computed: r.expected_checksum(),
                stored: good,
            })
        );
        assert!(r.revision().is_legacy());
    }

    #[test]
    fn stored_crc_is_network_order() {
        let mut r = record(2, b"2.0");
        r.crc = U32::new(r.crc.get().swap_bytes());
        // A little-endian checksum only passes if it's a palindrome, which
        // this one isn't.
        assert_ne!(r.expected_checksum(), r.expected_checksum().swap_bytes());
        assert!(!r.is_valid());
    }

    #[test]
    fn full_width_revision() {
        let r = record(2, b"0123456789abcdef");
        assert_eq!(r.revision().as_bytes(), b"0123456789abcdef");
        assert_eq!(r.revision().to_string(), "0123456789abcdef");
    }

    #[test]
    fn read_and_fall_back() {
        let good = record(2, b"1.4a");
        let devs = [MockDevice {
            bus: "i2c4",
            address: 0x54,
            image: good.as_bytes(),
        }];
        let bus = MockBus::new(&["i2c3", "i2c4"], &devs);

        let read = read_carrier_record(&bus, "i2c4", 0x54, crate::NoCache);
        assert_eq!(read, Ok(good));
        assert_eq!(revision_or_legacy(read).to_string(), "1.4a");

        let absent = read_carrier_record(&bus, "i2c4", 0x55, crate::NoCache);
        assert_eq!(
            absent,
            Err(EepromError::BusUnavailable(ResponseCode::NoDevice))
        );
        assert!(revision_or_legacy(absent).is_legacy());
    }
}
