//! Platform primitives the engine is driven through.

use bytes::Bytes;
use mote_wire::{Channel, ReadingFlag};

/// Source of raw sensor samples.
///
/// The platform maps each reading type to its ADC channel or sensor driver.
pub trait Sampler {
    /// Take one raw sample of `flag`'s sensor
    fn sample(&mut self, flag: ReadingFlag) -> u16;
}

/// Fire-and-forget packet transmit.
///
/// Ownership of `frame` leaves the core; there is no delivery report.
pub trait Radio {
    /// Send an encoded packet to `dest` on `channel`
    fn send(&mut self, dest: u16, channel: Channel, frame: Bytes);
}

impl<T: Sampler + ?Sized> Sampler for &mut T {
    fn sample(&mut self, flag: ReadingFlag) -> u16 {
        (**self).sample(flag)
    }
}

impl<T: Radio + ?Sized> Radio for &mut T {
    fn send(&mut self, dest: u16, channel: Channel, frame: Bytes) {
        (**self).send(dest, channel, frame)
    }
}

impl<T: Sampler + ?Sized> Sampler for Box<T> {
    fn sample(&mut self, flag: ReadingFlag) -> u16 {
        (**self).sample(flag)
    }
}

impl<T: Radio + ?Sized> Radio for Box<T> {
    fn send(&mut self, dest: u16, channel: Channel, frame: Bytes) {
        (**self).send(dest, channel, frame)
    }
}
