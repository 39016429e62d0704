//! Host input backend reading a physical gamepad through gilrs.

use super::{InputError, InputReader};
use crate::controller::input_snapshot::{
    AnalogChannel, Buttons, Dpad, InputSnapshot, ANALOG_MAX,
};
use gilrs::{Axis, Button, EventType, GamepadId, Gilrs};
use tracing::{debug, info, warn};

pub struct GilrsInput {
    gilrs: Gilrs,
    active_gamepad: Option<GamepadId>,
}

impl GilrsInput {
    pub fn create() -> Result<Self, InputError> {
        info!("Initializing gilrs controller interface");
        let gilrs = Gilrs::new().map_err(|e| InputError::InitializationError(e.to_string()))?;

        let active_gamepad = gilrs.gamepads().next().map(|(id, gamepad)| {
            info!("Selected gamepad: {} ({})", gamepad.name(), id);
            id
        });
        if active_gamepad.is_none() {
            warn!("No gamepad connected, reporting idle input until one appears");
        }

        Ok(Self {
            gilrs,
            active_gamepad,
        })
    }

    // Keeps gilrs' cached state current and follows (dis)connects
    fn pump_events(&mut self) {
        while let Some(event) = self.gilrs.next_event() {
            match event.event {
                EventType::Connected if self.active_gamepad.is_none() => {
                    info!("Gamepad {} connected, selecting it", event.id);
                    self.active_gamepad = Some(event.id);
                }
                EventType::Disconnected if self.active_gamepad == Some(event.id) => {
                    warn!("Active gamepad {} disconnected", event.id);
                    self.active_gamepad = None;
                }
                _ => {}
            }
        }
    }
}

impl InputReader for GilrsInput {
    fn read_raw_input(&mut self) -> Result<InputSnapshot, InputError> {
        self.pump_events();

        let Some(id) = self.active_gamepad else {
            return Ok(InputSnapshot::default());
        };
        let Some(gamepad) = self.gilrs.connected_gamepad(id) else {
            debug!("Gamepad {} no longer connected", id);
            return Ok(InputSnapshot::default());
        };

        let mut snapshot = InputSnapshot::default();
        for (button, logical) in BUTTON_MAP {
            if gamepad.is_pressed(button) {
                snapshot.buttons |= logical;
            }
        }
        for (button, direction) in DPAD_MAP {
            if gamepad.is_pressed(button) {
                snapshot.dpad |= direction;
            }
        }

        snapshot.analog.set(AnalogChannel::LeftX, stick_to_raw(gamepad.value(Axis::LeftStickX)));
        snapshot.analog.set(AnalogChannel::LeftY, stick_to_raw(-gamepad.value(Axis::LeftStickY)));
        snapshot.analog.set(AnalogChannel::RightX, stick_to_raw(gamepad.value(Axis::RightStickX)));
        snapshot.analog.set(AnalogChannel::RightY, stick_to_raw(-gamepad.value(Axis::RightStickY)));

        let trigger = |button| {
            gamepad
                .button_data(button)
                .map(|data| trigger_to_raw(data.value()))
                .unwrap_or_default()
        };
        snapshot.analog.set(AnalogChannel::LeftTrigger, trigger(Button::LeftTrigger2));
        snapshot.analog.set(AnalogChannel::RightTrigger, trigger(Button::RightTrigger2));

        Ok(snapshot)
    }
}

const BUTTON_MAP: [(Button, Buttons); 13] = [
    (Button::South, Buttons::B1),
    (Button::East, Buttons::B2),
    (Button::West, Buttons::B3),
    (Button::North, Buttons::B4),
    (Button::LeftTrigger, Buttons::L1),
    (Button::RightTrigger, Buttons::R1),
    (Button::LeftTrigger2, Buttons::L2),
    (Button::RightTrigger2, Buttons::R2),
    (Button::Select, Buttons::S1),
    (Button::Start, Buttons::S2),
    (Button::LeftThumb, Buttons::L3),
    (Button::RightThumb, Buttons::R3),
    (Button::Mode, Buttons::A1),
];

const DPAD_MAP: [(Button, Dpad); 4] = [
    (Button::DPadUp, Dpad::UP),
    (Button::DPadDown, Dpad::DOWN),
    (Button::DPadLeft, Dpad::LEFT),
    (Button::DPadRight, Dpad::RIGHT),
];

/// Maps a gilrs stick axis (-1.0..=1.0) onto the full unsigned range
fn stick_to_raw(value: f32) -> u16 {
    let normalized = (value.clamp(-1.0, 1.0) + 1.0) / 2.0;
    (normalized * f32::from(ANALOG_MAX)).round() as u16
}

/// Maps a gilrs trigger value (0.0..=1.0) onto the full unsigned range
fn trigger_to_raw(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * f32::from(ANALOG_MAX)).round() as u16
}
