use shared_definitions::controller::ControllerPacket;

/// Radio receiver that hands over already framed control packets.
pub trait RemoteControl {
    /// Next packet received since the last call, `None` when nothing is
    /// pending. Must not block.
    fn read_packet(&mut self) -> Option<ControllerPacket>;
}
