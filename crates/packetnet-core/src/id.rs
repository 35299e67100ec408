use slotmap::new_key_type;

new_key_type! {
    /// Identifies a system (source, sink, node, ...) in the topology.
    pub struct SystemId;

    /// Identifies a port on a system.
    pub struct PortId;

    /// Identifies a wire between an output port and an input port.
    pub struct WireId;

    /// Identifies a packet in the world's packet arena.
    pub struct PacketId;
}
