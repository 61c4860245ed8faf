// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bus API for boot-time I2C access
//!
//! During early boot there is no I2C server to talk to; whoever brings up the
//! board owns the controllers directly and hands drivers something that
//! implements [`I2cBus`].  Drivers only ever need two things from it: find a
//! device on a named bus, and read bytes out of it.
//!
//! # I2C devices
//!
//! Once probed, an I2C device is identified by a pair:
//!
//! - The I2C controller in the SoC, resolved from the bus name
//! - The 7-bit address of the device itself
//!

#![cfg_attr(not(test), no_std)]

use num_derive::FromPrimitive;

#[cfg(feature = "mock")]
pub mod mock;

/// The response code returned from the bus.  These response codes are pretty
/// specific, not because the caller is expected to necessarily handle them
/// differently, but to give upstack software some modicum of context
/// surrounding the error.
#[derive(Copy, Clone, Debug, FromPrimitive, Eq, PartialEq)]
#[repr(u32)]
pub enum ResponseCode {
    /// Bad response from the controller
    BadResponse = 1,
    /// Bad argument (e.g. a read extending past the end of the device)
    BadArg = 2,
    /// The device address was NACKed, implying that it is missing,
    /// unreachable, or not responding.
    NoDevice = 3,
    /// No bus with the requested name exists
    BadController = 4,
    /// Device address is reserved
    ReservedAddress = 5,
    /// A byte written to the device was NACKed
    NoRegister = 8,
    /// I2C bus was spontaneously reset during operation
    BusReset = 17,
    /// I2C bus locked up and was reset
    BusLocked = 19,
    /// I2C controller appeared to be busy and was reset
    ControllerBusy = 21,
    /// I2C bus error
    BusError = 22,
    /// Requested operation is not supported
    OperationNotSupported = 25,
}

impl ResponseCode {
    /// Converts a raw status word from the controller, mapping anything we
    /// don't recognize to `BadResponse`.
    pub fn from_code(code: u32) -> Self {
        num_traits::FromPrimitive::from_u32(code)
            .unwrap_or(ResponseCode::BadResponse)
    }
}

///
/// The controller for a given I2C device. The numbering here should be
/// assumed to follow the numbering for the peripheral as described by the
/// SoC reference manual.
///
#[derive(Copy, Clone, Debug, FromPrimitive, Eq, PartialEq)]
#[repr(u8)]
pub enum Controller {
    I2C0 = 0,
    I2C1 = 1,
    I2C2 = 2,
    I2C3 = 3,
    I2C4 = 4,
    I2C5 = 5,
    I2C6 = 6,
    I2C7 = 7,
}

impl Controller {
    pub fn from_index(index: usize) -> Option<Self> {
        u8::try_from(index)
            .ok()
            .and_then(num_traits::FromPrimitive::from_u8)
    }
}

#[derive(Copy, Clone, Debug, FromPrimitive, Eq, PartialEq)]
#[allow(clippy::unusual_byte_groupings)]
pub enum ReservedAddress {
    GeneralCall = 0b0000_000,
    CBUSAddress = 0b0000_001,
    FutureBus = 0b0000_010,
    FuturePurposes = 0b0000_011,
    HighSpeedReserved00 = 0b0000_100,
    HighSpeedReserved01 = 0b0000_101,
    HighSpeedReserved10 = 0b0000_110,
    HighSpeedReserved11 = 0b0000_111,
    TenBit00 = 0b1111_100,
    TenBit01 = 0b1111_101,
    TenBit10 = 0b1111_110,
    TenBit11 = 0b1111_111,
}

impl ReservedAddress {
    pub fn check(address: u8) -> Result<(), ResponseCode> {
        let reserved: Option<ReservedAddress> =
            num_traits::FromPrimitive::from_u8(address);
        match reserved {
            Some(_) => Err(ResponseCode::ReservedAddress),
            None if address > 0x7f => Err(ResponseCode::BadArg),
            None => Ok(()),
        }
    }
}

///
/// A probed I2C device.  Handles are only handed out by [`I2cBus::probe`],
/// after the device has acknowledged its address.
///
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct I2cDevice {
    pub controller: Controller,
    pub address: u8,
}

impl core::fmt::Display for I2cDevice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?} {:#x}", self.controller, self.address)
    }
}

/// Access to the I2C buses during boot.
///
/// Every call performs exactly one bus transaction and blocks until it
/// completes or fails.  Implementations must not retry on their own.
pub trait I2cBus {
    /// Resolves `bus_name` to a controller and checks that `address`
    /// acknowledges on it.
    fn probe(
        &self,
        bus_name: &str,
        address: u8,
    ) -> Result<I2cDevice, ResponseCode>;

    /// Writes the word address `offset` and reads `buf.len()` bytes back.
    fn read(
        &self,
        dev: &I2cDevice,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<(), ResponseCode>;
}

impl<B: I2cBus + ?Sized> I2cBus for &B {
    fn probe(
        &self,
        bus_name: &str,
        address: u8,
    ) -> Result<I2cDevice, ResponseCode> {
        (**self).probe(bus_name, address)
    }

    fn read(
        &self,
        dev: &I2cDevice,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<(), ResponseCode> {
        (**self).read(dev, offset, buf)
    }
}
