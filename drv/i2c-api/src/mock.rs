// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An in-memory [`I2cBus`] for host-side tests
//!
//! Each device is backed by a byte image, and every read is logged so that
//! tests can assert on exactly which transactions a driver issued.

use core::cell::{Cell, RefCell};

use crate::{Controller, I2cBus, I2cDevice, ReservedAddress, ResponseCode};

/// Maximum number of transactions kept in the log; later ones are counted
/// but not recorded.
pub const LOG_DEPTH: usize = 64;

/// A device sitting on one of the mock buses.
#[derive(Copy, Clone, Debug)]
pub struct MockDevice<'a> {
    pub bus: &'a str,
    pub address: u8,
    pub image: &'a [u8],
}

/// One logged read.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Transaction {
    pub device: I2cDevice,
    pub offset: u32,
    pub len: u32,
}

pub struct MockBus<'a> {
    /// Bus names, in controller order
    buses: &'a [&'a str],
    devices: &'a [MockDevice<'a>],
    log: RefCell<heapless::Vec<Transaction, LOG_DEPTH>>,
    reads: Cell<usize>,
    probes: Cell<usize>,
    fail_at: Cell<Option<(u32, ResponseCode)>>,
}

impl<'a> MockBus<'a> {
    pub fn new(buses: &'a [&'a str], devices: &'a [MockDevice<'a>]) -> Self {
        Self {
            buses,
            devices,
            log: RefCell::new(heapless::Vec::new()),
            reads: Cell::new(0),
            probes: Cell::new(0),
            fail_at: Cell::new(None),
        }
    }

    /// Makes any read that covers byte `offset` fail with `code`.
    pub fn fail_reads_at(&self, offset: u32, code: ResponseCode) {
        self.fail_at.set(Some((offset, code)));
    }

    /// Number of read transactions attempted, including failed ones.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    pub fn probes(&self) -> usize {
        self.probes.get()
    }

    pub fn transactions(&self) -> heapless::Vec<Transaction, LOG_DEPTH> {
        self.log.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
        self.reads.set(0);
    }

    fn find(&self, dev: &I2cDevice) -> Option<&MockDevice<'a>> {
        let bus = self.buses.get(dev.controller as usize)?;
        self.devices
            .iter()
            .find(|d| d.bus == *bus && d.address == dev.address)
    }
}

impl I2cBus for MockBus<'_> {
    fn probe(
        &self,
        bus_name: &str,
        address: u8,
    ) -> Result<I2cDevice, ResponseCode> {
        self.probes.set(self.probes.get() + 1);
        ReservedAddress::check(address)?;

        let controller = self
            .buses
            .iter()
            .position(|b| *b == bus_name)
            .and_then(Controller::from_index)
            .ok_or(ResponseCode::BadController)?;

        let dev = I2cDevice {
            controller,
            address,
        };
        match self.find(&dev) {
            Some(_) => Ok(dev),
            None => Err(ResponseCode::NoDevice),
        }
    }

    fn read(
        &self,
        dev: &I2cDevice,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<(), ResponseCode> {
        self.reads.set(self.reads.get() + 1);
        let len = u32::try_from(buf.len()).map_err(|_| ResponseCode::BadArg)?;
        // A full log only loses the record, the read itself still counts.
        let _ = self.log.borrow_mut().push(Transaction {
            device: *dev,
            offset,
            len,
        });

        if let Some((bad, code)) = self.fail_at.get() {
            if (offset..offset.saturating_add(len)).contains(&bad) {
                return Err(code);
            }
        }

        let image = self.find(dev).ok_or(ResponseCode::NoDevice)?.image;
        let start = offset as usize;
        let src = start
            .checked_add(buf.len())
            .and_then(|end| image.get(start..end))
            .ok_or(ResponseCode::BadArg)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}
