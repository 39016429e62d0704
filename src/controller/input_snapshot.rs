//! Per-tick input model shared by every stage of the control loop.
//!
//! An [`InputSnapshot`] is a plain `Copy` value: the button mask, the dpad
//! mask and six analog channels. The control loop captures one raw snapshot
//! per tick and derives the [`ProcessedState`] from it.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Logical face, shoulder, select and auxiliary buttons.
    ///
    /// Bit order only matters for display. The dpad lives in [`Dpad`] so that
    /// hotkey combinations compare against buttons alone.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    #[repr(transparent)]
    pub struct Buttons: u32 {
        const B1 = 1 << 0;
        const B2 = 1 << 1;
        const B3 = 1 << 2;
        const B4 = 1 << 3;
        const L1 = 1 << 4;
        const R1 = 1 << 5;
        const L2 = 1 << 6;
        const R2 = 1 << 7;
        /// Select / back
        const S1 = 1 << 8;
        /// Start / options
        const S2 = 1 << 9;
        const L3 = 1 << 10;
        const R3 = 1 << 11;
        /// Home / guide
        const A1 = 1 << 12;
        /// Capture / touchpad
        const A2 = 1 << 13;
    }
}

bitflags! {
    /// Directional pad state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    #[repr(transparent)]
    pub struct Dpad: u8 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

/// Named analog channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnalogChannel {
    LeftX,
    LeftY,
    RightX,
    RightY,
    LeftTrigger,
    RightTrigger,
}

impl AnalogChannel {
    pub const ALL: [AnalogChannel; 6] = [
        AnalogChannel::LeftX,
        AnalogChannel::LeftY,
        AnalogChannel::RightX,
        AnalogChannel::RightY,
        AnalogChannel::LeftTrigger,
        AnalogChannel::RightTrigger,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Resting value for the channel: centered for sticks, released for triggers
    pub fn rest_value(self) -> u16 {
        match self {
            AnalogChannel::LeftTrigger | AnalogChannel::RightTrigger => ANALOG_MIN,
            _ => ANALOG_CENTER,
        }
    }
}

pub const ANALOG_MIN: u16 = 0;
pub const ANALOG_CENTER: u16 = 0x7FFF;
pub const ANALOG_MAX: u16 = 0xFFFF;

/// Fixed table of analog magnitudes indexed by [`AnalogChannel`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalogChannels([u16; 6]);

impl AnalogChannels {
    pub fn get(&self, channel: AnalogChannel) -> u16 {
        self.0[channel.index()]
    }

    pub fn set(&mut self, channel: AnalogChannel, value: u16) {
        self.0[channel.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (AnalogChannel, u16)> + '_ {
        AnalogChannel::ALL.iter().map(move |c| (*c, self.get(*c)))
    }
}

impl Default for AnalogChannels {
    fn default() -> Self {
        let mut channels = [0; 6];
        for channel in AnalogChannel::ALL {
            channels[channel.index()] = channel.rest_value();
        }
        Self(channels)
    }
}

impl fmt::Debug for AnalogChannels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Instantaneous state of all logical inputs for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub buttons: Buttons,
    pub dpad: Dpad,
    pub analog: AnalogChannels,
}

impl InputSnapshot {
    pub fn with_buttons(buttons: Buttons) -> Self {
        Self {
            buttons,
            ..Default::default()
        }
    }

    pub fn pressed(&self, buttons: Buttons) -> bool {
        self.buttons.contains(buttons)
    }

    pub fn pressed_dpad(&self, dpad: Dpad) -> bool {
        self.dpad.contains(dpad)
    }

    /// True when neither a button nor a dpad direction is held
    pub fn is_idle(&self) -> bool {
        self.buttons.is_empty() && self.dpad.is_empty()
    }
}

/// Authoritative per-tick output after debounce, core processing and addons.
///
/// `tick` increases by one for every completed tick so a consumer can tell
/// which snapshots it skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ProcessedState {
    pub tick: u64,
    pub input: InputSnapshot,
}

impl ProcessedState {
    pub fn new(tick: u64, input: InputSnapshot) -> Self {
        Self { tick, input }
    }
}

impl fmt::Display for ProcessedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick={} buttons={:#06x} dpad={:#03x} L:({},{}) R:({},{}) LT:{} RT:{}",
            self.tick,
            self.input.buttons.bits(),
            self.input.dpad.bits(),
            self.input.analog.get(AnalogChannel::LeftX),
            self.input.analog.get(AnalogChannel::LeftY),
            self.input.analog.get(AnalogChannel::RightX),
            self.input.analog.get(AnalogChannel::RightY),
            self.input.analog.get(AnalogChannel::LeftTrigger),
            self.input.analog.get(AnalogChannel::RightTrigger),
        )
    }
}
