use crate::config::store::FailsafeConfig;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    #[default]
    Linked,
    /// Packets are late, silence is accumulating below the abort threshold.
    Degraded,
    /// Terminal for the flight.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortCause {
    LinkSilence,
    AbortFlag,
    Fatal,
}

/// What the link delivered during the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketEvent {
    pub abort_flag: bool,
}

/// Tracks link silence and latches an abort once it exceeds its budget.
///
/// Every tick adds its duration to the silence timer. An on-time packet takes
/// one max-delay worth of silence back off, floored at zero, so jitter is
/// forgiven but repeated late packets still add up.
pub struct FailsafeSupervisor {
    max_delay_us: u64,
    abort_threshold_us: u64,
    silence_us: u64,
    last_tick_us: Option<u64>,
    last_packet_us: u64,
    state: LinkState,
    abort_cause: Option<AbortCause>,
}

impl FailsafeSupervisor {
    pub fn new(config: &FailsafeConfig) -> Self {
        FailsafeSupervisor {
            max_delay_us: config.max_delay_us,
            abort_threshold_us: config.abort_threshold_us,
            silence_us: 0,
            last_tick_us: None,
            last_packet_us: 0,
            state: LinkState::Linked,
            abort_cause: None,
        }
    }

    pub fn update(&mut self, now_us: u64, packet: Option<PacketEvent>) -> LinkState {
        if self.state == LinkState::Aborted {
            return self.state;
        }

        match self.last_tick_us {
            None => self.last_packet_us = now_us,
            Some(previous_us) => self.silence_us += now_us.saturating_sub(previous_us),
        }
        self.last_tick_us = Some(now_us);

        if let Some(packet) = packet {
            if packet.abort_flag {
                self.abort(AbortCause::AbortFlag);
                return self.state;
            }
            let gap_us = now_us.saturating_sub(self.last_packet_us);
            if gap_us <= self.max_delay_us {
                self.silence_us = self.silence_us.saturating_sub(self.max_delay_us);
            }
            self.last_packet_us = now_us;
        }

        let since_packet_us = now_us.saturating_sub(self.last_packet_us);
        if self.silence_us > self.abort_threshold_us || since_packet_us > self.abort_threshold_us {
            self.abort(AbortCause::LinkSilence);
        } else if since_packet_us > self.max_delay_us {
            self.transition(LinkState::Degraded);
        } else {
            self.transition(LinkState::Linked);
        }
        self.state
    }

    /// Latches the aborted state. Later calls keep the first cause.
    pub fn abort(&mut self, cause: AbortCause) {
        if self.state == LinkState::Aborted {
            return;
        }
        self.abort_cause = Some(cause);
        self.state = LinkState::Aborted;
        log::error!(
            "Flight aborted ({:?}) after {}us of link silence",
            cause,
            self.silence_us
        );
    }

    fn transition(&mut self, next: LinkState) {
        if self.state == next {
            return;
        }
        match next {
            LinkState::Degraded => log::warn!("Control link degraded"),
            LinkState::Linked => log::info!("Control link restored"),
            LinkState::Aborted => {}
        }
        self.state = next;
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_aborted(&self) -> bool {
        self.state == LinkState::Aborted
    }

    pub fn abort_cause(&self) -> Option<AbortCause> {
        self.abort_cause
    }

    pub fn silence_us(&self) -> u64 {
        self.silence_us
    }
}
