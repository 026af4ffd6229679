use shared_definitions::controller::{
    ControllerPacket, StickButtons, STICK_AXIS_COUNT, STICK_CENTER,
};

use super::controller::RemoteControl;
use crate::config::store::LinkConfig;

/// Upper bound on packets drained in one poll, keeps a chatty receiver from
/// stalling the tick.
const MAX_PACKETS_PER_POLL: usize = 8;
const STICK_SPAN: f32 = STICK_CENTER as f32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StickAxis {
    Roll = 0,
    Pitch = 1,
    Throttle = 2,
    Yaw = 3,
}

/// Decoded stick state. Axes are signed offsets from center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickInput {
    pub axes: [i16; STICK_AXIS_COUNT],
    /// Trim pot in [0, 1].
    pub trim: f32,
    pub buttons: StickButtons,
}

impl Default for StickInput {
    fn default() -> Self {
        StickInput {
            axes: [0; STICK_AXIS_COUNT],
            trim: 0.0,
            buttons: StickButtons::empty(),
        }
    }
}

impl StickInput {
    pub fn decode(packet: &ControllerPacket, config: &LinkConfig) -> Self {
        let mut axes = [0_i16; STICK_AXIS_COUNT];
        for (axis, raw) in axes.iter_mut().zip(packet.axes) {
            let value = i16::from(raw) - i16::from(STICK_CENTER);
            *axis = if value.abs() < config.deadzone { 0 } else { value };
        }
        if config.invert_pitch {
            axes[StickAxis::Pitch as usize] = -axes[StickAxis::Pitch as usize];
        }

        StickInput {
            axes,
            trim: f32::from(packet.trim) / f32::from(u8::MAX),
            buttons: packet.buttons(),
        }
    }

    pub fn axis(&self, axis: StickAxis) -> i16 {
        self.axes[axis as usize]
    }

    /// Axis scaled to [-1, 1].
    pub fn normalized(&self, axis: StickAxis) -> f32 {
        (f32::from(self.axis(axis)) / STICK_SPAN).clamp(-1.0, 1.0)
    }

    pub fn abort(&self) -> bool {
        self.buttons.contains(StickButtons::ABORT)
    }

    pub fn standby(&self) -> bool {
        self.buttons.contains(StickButtons::STANDBY)
    }

    pub fn light(&self) -> bool {
        self.buttons.contains(StickButtons::LIGHT)
    }
}

/// Receives control packets and keeps the latest stick state.
///
/// The stick state is only replaced by a fresh packet, a silent link leaves
/// it untouched. Link loss itself is judged by the failsafe supervisor.
pub struct LinkChannel<R: RemoteControl> {
    remote: R,
    config: LinkConfig,
    stick: StickInput,
    packet_available: bool,
    received_packets: u64,
}

impl<R: RemoteControl> LinkChannel<R> {
    pub fn new(remote: R, config: LinkConfig) -> Self {
        LinkChannel {
            remote,
            config,
            stick: StickInput::default(),
            packet_available: false,
            received_packets: 0,
        }
    }

    /// Drains the receiver and decodes the newest packet, if any.
    pub fn poll(&mut self) -> bool {
        let mut latest = None;
        for _ in 0..MAX_PACKETS_PER_POLL {
            match self.remote.read_packet() {
                Some(packet) => {
                    latest = Some(packet);
                    self.received_packets += 1;
                }
                None => break,
            }
        }

        self.packet_available = match latest {
            Some(packet) => {
                self.stick = StickInput::decode(&packet, &self.config);
                true
            }
            None => false,
        };
        self.packet_available
    }

    /// Whether the last poll decoded a fresh packet.
    pub fn packet_available(&self) -> bool {
        self.packet_available
    }

    pub fn abort_requested(&self) -> bool {
        self.stick.abort()
    }

    pub fn stick(&self) -> &StickInput {
        &self.stick
    }

    pub fn received_packets(&self) -> u64 {
        self.received_packets
    }
}
