// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ring buffer for tracing boot-time drivers
//!
//! This is a static ring buffer designed to instrument code that runs before
//! there is anywhere to print to.  Entries are cheap to record and can be
//! pulled out of RAM after the fact with a debugger.
//!
//! ## Constraints
//!
//! The type in the ring buffer must implement both `Copy` and `PartialEq`.
//!
//! If you use the variants of the `ringbuf!` macro that leave the name of the
//! data structure implicit, you can only have one per module. (You can lift
//! this constraint by providing a name.)
//!
//! ## Creating a ring buffer
//!
//! Ring buffers are instantiated with the [`ringbuf!`] macro, to which one
//! must provide the type of per-entry payload, the number of entries, and a
//! static initializer:
//!
//! ```
//! #[derive(Copy, Clone, PartialEq)]
//! enum Trace {
//!     None,
//!     Read { offset: u32 },
//! }
//!
//! ringbuf!(Trace, 16, Trace::None);
//! ```
//!
//! Entries are recorded with [`ringbuf_entry!`]:
//!
//! ```
//! ringbuf_entry!(Trace::Read { offset });
//! ```
//!
//! You can also provide a name for the ring buffer, to distinguish between them
//! if you have more than one:
//!
//! ```
//! ringbuf!(ADJUST_RINGBUF, Trace, 16, Trace::None);
//!
//! // ...
//!
//! ringbuf_entry!(ADJUST_RINGBUF, Trace::Read { offset });
//! ```
//!
//! ## Inspecting a ring buffer via GDB
//!
//! Assuming symbols are loaded, the buffer is a plain static and can be
//! printed directly:
//!
//! ```console
//! (gdb) set print pretty on
//! (gdb) print drv_var_eeprom::adjust::__RINGBUF
//! ```
//!
//! The buffer lives behind a spin lock so that it stays sound if it is ever
//! touched from more than one thread (as happens when the host-side test
//! harness runs tests in parallel).  During boot there is only one thread and
//! the lock is never contended.

#![cfg_attr(not(test), no_std)]

/// Re-exported so that code generated by the macros is guaranteed to be able
/// to find it.
pub use spin::Mutex;

/// Declares a ringbuffer in the current module or context.
///
/// `ringbuf!(NAME, Type, N, expr)` makes a ringbuffer named `NAME`,
/// containing entries of type `Type`, with room for `N` such entries, all of
/// which are initialized to `expr`.
///
/// The resulting ringbuffer will be static, so `NAME` should be uppercase and
/// should end in `RINGBUF`.
///
/// The actual type of `name` will be `Mutex<Ringbuf<T, N>>`.
///
/// To support the common case of having one quickly-installed ringbuffer per
/// module, if you omit the name, it will default to `__RINGBUF`.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[used]
        static $name: $crate::Mutex<$crate::Ringbuf<$t, $n>> =
            $crate::Mutex::new($crate::Ringbuf::new($init));
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: $t = $init;
    };
    ($t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: $t = $init;
    };
}

/// Inserts data into a named ringbuffer (which should have been declared with
/// the `ringbuf!` macro).
///
/// `ringbuf_entry!(NAME, expr)` will insert `expr` into the ringbuffer called
/// `NAME`.
///
/// If you declared your ringbuffer without a name, you can also use this
/// without a name, and it will default to `__RINGBUF`.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate the payload before taking the lock, so that a payload
        // expression which itself records an entry can't deadlock us.
        let (p, buf) = ($payload, &$buf);
        $crate::Ringbuf::entry(
            &mut *$crate::Mutex::lock(buf),
            line!() as u16,
            p,
        );
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        let _ = &$payload;
    }};
    ($payload:expr) => {{
        let _ = &$payload;
    }};
}

///
/// The structure of a single [`Ringbuf`] entry, carrying a payload of arbitrary
/// type.  When a ring buffer entry is generated with an identical payload to
/// the most recent entry (in terms of both `line` and `payload`), `count` will
/// be incremented rather than generating a new entry.
///
#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

///
/// A ring buffer of parametrized type and size.  In practice, instantiating
/// this directly is strange -- see the [`ringbuf!`] macro.
///
#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, N> {
    /// Returns an empty ring buffer with every slot holding `init`.
    pub const fn new(init: T) -> Self {
        Self {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: init,
            }; N],
        }
    }

    pub fn entry(&mut self, line: u16, payload: T) {
        // A fresh buffer has no last entry; treat that as out of range so the
        // first insertion lands in slot 0 and never bumps an existing count.
        let last = self.last.unwrap_or(usize::MAX);

        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                // Only reuse this entry if we don't overflow the count.
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        // Not a remainder: most of our targets have no hardware divide, and
        // this turns the usize::MAX starting point into 0 for free.
        let ndx = {
            let last_plus_1 = last.wrapping_add(1);
            if last_plus_1 >= self.buffer.len() {
                0
            } else {
                last_plus_1
            }
        };

        let ent = &mut self.buffer[ndx];
        *ent = RingbufEntry {
            line,
            payload,
            count: 1,
            generation: ent.generation.wrapping_add(1),
        };

        self.last = Some(ndx);
    }

    /// Iterates over recorded entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RingbufEntry<T>> + '_ {
        let start = self.last.map_or(0, |last| last.saturating_add(1)).min(N);
        let (newer, older) = self.buffer.split_at(start);
        older.iter().chain(newer).filter(|ent| ent.count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq)]
    enum Trace {
        None,
        Read(u32),
    }

    fn payloads<const N: usize>(rb: &Ringbuf<Trace, N>) -> Vec<(Trace, u32)> {
        rb.iter().map(|e| (e.payload, e.count)).collect()
    }

    #[test]
    fn empty_buffer_has_no_entries() {
        let rb = Ringbuf::<Trace, 4>::new(Trace::None);
        assert!(rb.last.is_none());
        assert_eq!(rb.iter().count(), 0);
    }

    #[test]
    fn first_entry_lands_in_slot_zero() {
        let mut rb = Ringbuf::<Trace, 4>::new(Trace::None);
        rb.entry(10, Trace::Read(0));
        assert_eq!(rb.last, Some(0));
        assert_eq!(rb.buffer[0].payload, Trace::Read(0));
        assert_eq!(rb.buffer[0].generation, 1);
    }

    #[test]
    fn repeated_entry_bumps_count() {
        let mut rb = Ringbuf::<Trace, 4>::new(Trace::None);
        rb.entry(10, Trace::Read(8));
        rb.entry(10, Trace::Read(8));
        rb.entry(10, Trace::Read(8));
        assert_eq!(payloads(&rb), vec![(Trace::Read(8), 3)]);
    }

    #[test]
    fn same_payload_from_another_line_is_distinct() {
        let mut rb = Ringbuf::<Trace, 4>::new(Trace::None);
        rb.entry(10, Trace::Read(8));
        rb.entry(11, Trace::Read(8));
        assert_eq!(
            payloads(&rb),
            vec![(Trace::Read(8), 1), (Trace::Read(8), 1)]
        );
    }

    #[test]
    fn wraps_and_keeps_newest() {
        let mut rb = Ringbuf::<Trace, 3>::new(Trace::None);
        for i in 0..5 {
            rb.entry(1, Trace::Read(i));
        }
        assert_eq!(
            payloads(&rb),
            vec![(Trace::Read(2), 1), (Trace::Read(3), 1), (Trace::Read(4), 1)]
        );
        // Slot 0 has been written twice.
        assert_eq!(rb.buffer[0].generation, 2);
    }

    ringbuf!(TEST_RINGBUF, Trace, 8, Trace::None);

    #[test]
    fn macro_records_into_static() {
        ringbuf_entry!(TEST_RINGBUF, Trace::Read(42));
        let rb = TEST_RINGBUF.lock();
        assert!(rb.iter().any(|e| e.payload == Trace::Read(42)));
    }
}
