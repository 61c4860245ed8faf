// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::sync::atomic::{Ordering, fence};

use drv_i2c_api::{I2cBus, I2cDevice};
use ringbuf::*;
use zerocopy::{FromBytes, IntoBytes};

use crate::EepromError;
use crate::som::SomRecord;

/// Makes freshly read memory visible to the CPU.
///
/// The bus controller may fill our buffers by DMA, behind the data cache's
/// back.  [`Eeprom`] calls this after every successful read and before
/// anything looks at the bytes.
pub trait Coherence {
    fn flush_dcache(&self);
}

/// For platforms where reads are cache-coherent; only orders memory.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoCache;

impl Coherence for NoCache {
    fn flush_dcache(&self) {
        fence(Ordering::SeqCst);
    }
}

impl<F: Fn()> Coherence for F {
    fn flush_dcache(&self) {
        self()
    }
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    ProbeFailed(EepromError),
    ReadFailed { offset: u32, err: EepromError },
}

ringbuf!(Trace, 8, Trace::None);

/// A probed EEPROM.
///
/// This is acquired once at boot and passed to everything that reads from the
/// device.  Each read is exactly one bus transaction; failures are handed
/// back untouched and never retried.
pub struct Eeprom<B, C = NoCache> {
    bus: B,
    device: I2cDevice,
    cache: C,
}

impl<B: I2cBus, C: Coherence> Eeprom<B, C> {
    pub fn probe(
        bus: B,
        bus_name: &str,
        address: u8,
        cache: C,
    ) -> Result<Self, EepromError> {
        match bus.probe(bus_name, address) {
            Ok(device) => Ok(Self { bus, device, cache }),
            Err(code) => {
                let err = EepromError::BusUnavailable(code);
                ringbuf_entry!(Trace::ProbeFailed(err));
                Err(err)
            }
        }
    }

    pub fn device(&self) -> I2cDevice {
        self.device
    }

    /// Fills `buf` from the EEPROM starting at `offset`.
    pub fn read_into(
        &self,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<(), EepromError> {
        self.bus.read(&self.device, offset, buf).map_err(|code| {
            let err = EepromError::TransactionFailed(code);
            ringbuf_entry!(Trace::ReadFailed { offset, err });
            err
        })?;
        self.cache.flush_dcache();
        Ok(())
    }

    /// Reads a single value of type `V` starting at `offset`.
    pub fn read<V: FromBytes + IntoBytes>(
        &self,
        offset: u32,
    ) -> Result<V, EepromError> {
        let mut out = V::new_zeroed();
        self.read_into(offset, out.as_mut_bytes())?;
        Ok(out)
    }

    /// Reads the SOM identity record, which always starts at offset 0.
    pub fn read_som_record(&self) -> Result<SomRecord, EepromError> {
        self.read(0)
    }
}
