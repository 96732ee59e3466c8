//! Reading-type rotation across sampling ticks.

use mote_wire::{ReadingFlag, FLAG_STEP, LOWER_FLAG, UPPER_FLAG};

/// Flag that follows `previous` in the rotation.
///
/// Steps by [`FLAG_STEP`] and wraps from [`UPPER_FLAG`] back to
/// [`LOWER_FLAG`]; step values with no reading type behind them are skipped.
pub fn next_flag(previous: ReadingFlag) -> ReadingFlag {
    let mut value = previous as u8;
    loop {
        value = if value >= UPPER_FLAG {
            LOWER_FLAG
        } else {
            value + FLAG_STEP
        };
        if let Ok(flag) = ReadingFlag::try_from(value) {
            return flag;
        }
    }
}

/// Current position in the rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingCycle {
    current: ReadingFlag,
}

impl ReadingCycle {
    /// Start the rotation at `start`
    pub fn new(start: ReadingFlag) -> Self {
        Self { current: start }
    }

    /// Flag the next tick will use
    pub fn current(&self) -> ReadingFlag {
        self.current
    }

    /// Return the flag for this tick and move one position on
    pub fn tick(&mut self) -> ReadingFlag {
        let flag = self.current;
        self.current = next_flag(flag);
        flag
    }
}

impl Default for ReadingCycle {
    fn default() -> Self {
        Self::new(ReadingFlag::Temperature)
    }
}
