/*!
All serialization and construction routines for the OpenFlow message primitives

Use the trait `OfpPacket` for serialization implementations of messages
that are sent. Other primitives that are part of a message should
implement a serialize function that appends to a given `MessageWriter`.

Messages are built in place: the header is initialized first and every
enclosing length field is patched once its variable content is appended.
*/

use byteorder::{ByteOrder, NetworkEndian};
use crate::openflow::buffer_pool::PoolBuffer;
use crate::openflow::messages::deserialize::pad_len;
use crate::openflow::messages::*;

use std::mem::size_of;

/// Appends one message to a pooled buffer
#[derive(Debug)]
pub struct MessageWriter<'b> {
    buf: &'b mut PoolBuffer,
    /// Offset of the message's header in `buf`
    start: usize,
}

impl<'b> MessageWriter<'b> {
    /// Initializes an empty message of type `typ` at the end of `buf`
    pub fn new(buf: &'b mut PoolBuffer, typ: OfpType, xid: u32) -> MessageWriter<'b> {
        let start = buf.len();
        let mut writer = MessageWriter { buf, start };
        OfpHeader::new(typ, xid).serialize(&mut writer);
        writer
    }

    /// Number of bytes written so far, including the header
    pub fn position(&self) -> usize {
        self.buf.len() - self.start
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.extend_zeroed(1)[0] = value;
    }

    pub fn put_u16(&mut self, value: u16) {
        NetworkEndian::write_u16(self.buf.extend_zeroed(2), value);
    }

    pub fn put_u32(&mut self, value: u32) {
        NetworkEndian::write_u32(self.buf.extend_zeroed(4), value);
    }

    pub fn put_u64(&mut self, value: u64) {
        NetworkEndian::write_u64(self.buf.extend_zeroed(8), value);
    }

    pub fn put_slice(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn put_zeros(&mut self, n: usize) {
        self.buf.extend_zeroed(n);
    }

    /// Overwrites the u16 at `pos` bytes from the start of the message
    fn patch_u16(&mut self, pos: usize, value: u16) {
        let at = self.start + pos;
        NetworkEndian::write_u16(&mut self.buf[at..at + 2], value);
    }

    /// Sets the length of the TLV starting at `pos` to end at the current position.
    /// The length field directly follows the 16 bit type.
    fn patch_tlv_length(&mut self, pos: usize) -> usize {
        let len = self.position() - pos;
        self.patch_u16(pos + 2, len as u16);
        len
    }

    /// Writes the final length into the header and returns it
    pub fn finish(mut self) -> usize {
        let len = self.position();
        debug_assert!(len <= 0xffff, "message of {} bytes", len);
        self.patch_u16(2, len as u16);
        len
    }
}

impl OfpHeader {
    /// Constructs an `OfpHeader`
    pub fn new(typ: OfpType, xid: u32) -> OfpHeader {
        OfpHeader {
            version: OFP_VERSION,
            typ: typ as u8,
            length: OfpHeader::header_length() as u16,
            xid,
        }
    }

    /// Returns the fixed header length of 8 (in byte)
    pub fn header_length() -> usize {
        size_of::<OfpHeader>()
    }

    fn serialize(&self, w: &mut MessageWriter) {
        w.put_u8(self.version);
        w.put_u8(self.typ);
        w.put_u16(self.length);
        w.put_u32(self.xid);
    }
}

impl OfpMatch {
    /// Constructs an empty match.
    pub fn new() -> OfpMatch {
        OfpMatch {
            typ: OfpMatchType::Oxm as u16,
            oxm_fields: vec![],
        }
    }

    /// Adds a single match field to the match.
    pub fn add_tlv(&mut self, oxm_tlv: OfpOxmTlv) -> &mut OfpMatch {
        self.oxm_fields.push(oxm_tlv);
        self
    }

    /// Gets the match fields
    pub fn oxm_fields(&self) -> &[OfpOxmTlv] {
        &self.oxm_fields
    }

    /// Length of OfpMatch (excluding padding)
    pub fn length(&self) -> usize {
        4 + self.oxm_fields.iter().map(OfpOxmTlv::length).sum::<usize>()
    }

    /// Length of OfpMatch including the padding to 8 bytes
    fn padded_length(&self) -> usize {
        let len = self.length();
        len + pad_len(len)
    }

    fn serialize(&self, w: &mut MessageWriter) {
        let pos = w.position();
        w.put_u16(self.typ);
        w.put_u16(0);
        for oxm in &self.oxm_fields {
            oxm.serialize(w);
        }
        let len = w.patch_tlv_length(pos);
        // make its overall size a multiple of 8; fill with zeros
        w.put_zeros(pad_len(len));
    }
}

impl OfpOxmTlv {
    fn length(&self) -> usize {
        4 + self.body.len()
    }

    fn serialize(&self, w: &mut MessageWriter) {
        let class = self.class as u32;
        let hasmask_u32 = if self.hasmask { 1 } else { 0 };
        let header = (class << 16)
            | ((self.field as u32) << 9)
            | (hasmask_u32 << 8)
            | self.body.len() as u32;
        w.put_u32(header);
        w.put_slice(&self.body);
    }
}

impl OfpActionOutput {
    /// Constructs an `OfpActionOutput` that sends no bytes to the controller
    pub fn new(port: u32) -> OfpActionOutput {
        OfpActionOutput {
            typ: OfpActionType::Output as u16,
            len: OfpActionOutput::length() as u16,
            port,
            max_len: 0,
        }
    }

    /// Constructs an `OfpActionOutput` to the controller,
    /// which is sent the complete packet without buffering
    pub fn new_to_controller() -> OfpActionOutput {
        OfpActionOutput {
            max_len: OFPCML_NO_BUFFER,
            ..OfpActionOutput::new(OFPP_CONTROLLER)
        }
    }

    fn length() -> usize {
        16
    }

    fn serialize(&self, w: &mut MessageWriter) {
        w.put_u16(self.typ);
        w.put_u16(self.len);
        w.put_u32(self.port);
        w.put_u16(self.max_len);
        w.put_zeros(6);
    }
}

impl OfpInstructionActions {
    /// Constructs an `OfpInstructionActions`
    pub fn new(actions: Vec<OfpActionOutput>) -> OfpInstructionActions {
        OfpInstructionActions {
            typ: OfpInstructionType::ApplyActions as u16,
            actions,
        }
    }

    fn length(&self) -> usize {
        8 + self.actions.len() * OfpActionOutput::length()
    }

    fn serialize(&self, w: &mut MessageWriter) {
        let pos = w.position();
        w.put_u16(self.typ);
        w.put_u16(0);
        w.put_zeros(4);
        for action in &self.actions {
            action.serialize(w);
        }
        w.patch_tlv_length(pos);
    }
}

impl OfpFlowMod {
    /// Constructs an `OfpFlowMod` with the given fields.
    /// The flow never times out until `timeouts` is set.
    pub fn new(
        command: OfpFlowModCommand,
        cookie: u64,
        table_id: u8,
        priority: u16,
        match_field: OfpMatch,
        instructions: Vec<OfpInstructionActions>,
    ) -> OfpFlowMod {
        OfpFlowMod {
            cookie,
            cookie_mask: 0,
            table_id,
            command: command as u8,
            idle_timeout: OFP_FLOW_PERMANENT,
            hard_timeout: OFP_FLOW_PERMANENT,
            priority,
            buffer_id: OFP_NO_BUFFER,
            out_port: OFPP_ANY,
            out_group: OFPG_ANY,
            flags: 0,
            importance: 0,
            match_field,
            instructions,
        }
    }

    /// Sets the idle and hard timeout in seconds
    pub fn timeouts(mut self, idle_timeout: u16, hard_timeout: u16) -> OfpFlowMod {
        self.idle_timeout = idle_timeout;
        self.hard_timeout = hard_timeout;
        self
    }

    /// Sets the `OfpFlowModFlags` bitmap
    pub fn flags(mut self, flags: u16) -> OfpFlowMod {
        self.flags = flags;
        self
    }
}

/// An OpenFlow packet. Must be implemented for all OpenFlow messsages that are sent.
pub trait OfpPacket {
    /// Returns the packet's type
    fn typ() -> OfpType;

    /// Returns the exact length of the serialized body
    fn body_length(&self) -> usize;

    /// Returns the exact length of the serialized packet
    fn length(&self) -> usize {
        OfpHeader::header_length() + self.body_length()
    }

    /// Appends this packet with network byte order to `buf`.
    /// The xid is used as its header's transaction id.
    /// Returns the number of bytes written.
    fn serialize(&self, buf: &mut PoolBuffer, xid: u32) -> usize {
        let mut writer = MessageWriter::new(buf, Self::typ(), xid);
        self.serialize_body(&mut writer);
        let len = writer.finish();
        debug_assert_eq!(self.length(), len);
        debug!("Outgoing message: {:?}, xid {}, {} bytes", Self::typ(), xid, len);
        len
    }

    /// Serializes this packet's body.
    fn serialize_body(&self, w: &mut MessageWriter);
}

impl OfpHello {
    /// Constructs the Hello this controller sends,
    /// which supports `OFP_VERSION` only
    pub fn new() -> OfpHello {
        OfpHello {
            version: OFP_VERSION,
            bitmap: Some(vec![1 << OFP_VERSION]),
        }
    }
}

impl OfpPacket for OfpHello {
    fn typ() -> OfpType {
        OfpType::Hello
    }

    fn body_length(&self) -> usize {
        match self.bitmap {
            Some(ref words) => {
                let len = 4 + 4 * words.len();
                len + pad_len(len)
            }
            None => 0,
        }
    }

    fn serialize_body(&self, w: &mut MessageWriter) {
        if let Some(ref words) = self.bitmap {
            let pos = w.position();
            w.put_u16(OfpHelloElemType::VersionBitmap as u16);
            w.put_u16(0);
            for &word in words {
                w.put_u32(word);
            }
            let len = w.patch_tlv_length(pos);
            w.put_zeros(pad_len(len));
        }
    }
}

impl OfpPacket for OfpFeaturesRequest {
    fn typ() -> OfpType {
        OfpType::FeaturesRequest
    }

    fn body_length(&self) -> usize {
        0
    }

    fn serialize_body(&self, _: &mut MessageWriter) {}
}

impl OfpPacket for OfpGetAsyncRequest {
    fn typ() -> OfpType {
        OfpType::GetAsyncRequest
    }

    fn body_length(&self) -> usize {
        0
    }

    fn serialize_body(&self, _: &mut MessageWriter) {}
}

impl OfpPacket for OfpBarrierRequest {
    fn typ() -> OfpType {
        OfpType::BarrierRequest
    }

    fn body_length(&self) -> usize {
        0
    }

    fn serialize_body(&self, _: &mut MessageWriter) {}
}

impl<'a> OfpEchoReply<'a> {
    /// Constructs a new `OfpEchoReply` with `arbitrary` content.
    /// This should be the same as in the `OfpEchoRequest` that issued this reply.
    pub fn new(arbitrary: &'a [u8]) -> OfpEchoReply<'a> {
        OfpEchoReply { arbitrary }
    }
}

impl<'a> OfpPacket for OfpEchoReply<'a> {
    fn typ() -> OfpType {
        OfpType::EchoReply
    }

    fn body_length(&self) -> usize {
        self.arbitrary.len()
    }

    fn serialize_body(&self, w: &mut MessageWriter) {
        w.put_slice(self.arbitrary)
    }
}

impl OfpPacket for OfpErrorMsg {
    fn typ() -> OfpType {
        OfpType::Error
    }

    fn body_length(&self) -> usize {
        4 + self.data.len()
    }

    fn serialize_body(&self, w: &mut MessageWriter) {
        w.put_u16(self.typ);
        w.put_u16(self.code);
        w.put_slice(&self.data)
    }
}

impl OfpPacket for OfpFlowMod {
    fn typ() -> OfpType {
        OfpType::FlowMod
    }

    fn body_length(&self) -> usize {
        40 + self.match_field.padded_length()
            + self.instructions.iter().map(OfpInstructionActions::length).sum::<usize>()
    }

    fn serialize_body(&self, w: &mut MessageWriter) {
        w.put_u64(self.cookie);
        w.put_u64(self.cookie_mask);
        w.put_u8(self.table_id);
        w.put_u8(self.command);
        w.put_u16(self.idle_timeout);
        w.put_u16(self.hard_timeout);
        w.put_u16(self.priority);
        w.put_u32(self.buffer_id);
        w.put_u32(self.out_port);
        w.put_u32(self.out_group);
        w.put_u16(self.flags);
        w.put_u16(self.importance);
        self.match_field.serialize(w);
        for instr in &self.instructions {
            instr.serialize(w);
        }
    }
}

impl<'a> OfpPacketOut<'a> {
    /// Constructs an `OfpPacketOut`. `data` is only sent
    /// if `buffer_id` is `OFP_NO_BUFFER`.
    pub fn new(
        buffer_id: u32,
        in_port: u32,
        actions: Vec<OfpActionOutput>,
        data: &'a [u8],
    ) -> OfpPacketOut<'a> {
        OfpPacketOut {
            buffer_id,
            in_port,
            actions,
            data: if buffer_id == OFP_NO_BUFFER { data } else { &[] },
        }
    }
}

impl<'a> OfpPacket for OfpPacketOut<'a> {
    fn typ() -> OfpType {
        OfpType::PacketOut
    }

    fn body_length(&self) -> usize {
        16 + self.actions.len() * OfpActionOutput::length() + self.data.len()
    }

    fn serialize_body(&self, w: &mut MessageWriter) {
        w.put_u32(self.buffer_id);
        w.put_u32(self.in_port);
        w.put_u16((self.actions.len() * OfpActionOutput::length()) as u16);
        w.put_zeros(6);
        for action in &self.actions {
            action.serialize(w);
        }
        w.put_slice(self.data);
    }
}

impl OfpAsyncConfig {
    /// Sets the packet-in reasons delivered to a master controller
    pub fn set_packet_in_master(&mut self, mask: u32) -> &mut OfpAsyncConfig {
        self.packet_in_mask[1] = Some(mask);
        self
    }

    /// The masks that are set as (property type, mask)
    fn properties(&self) -> Vec<(u16, u32)> {
        let masks = [
            self.packet_in_mask,
            self.port_status_mask,
            self.flow_removed_mask,
            self.role_status_mask,
            self.table_status_mask,
            self.requestforward_mask,
        ];
        let mut props = vec![];
        for (i, roles) in masks.iter().enumerate() {
            for (role, mask) in roles.iter().enumerate() {
                if let Some(mask) = *mask {
                    props.push(((2 * i + role) as u16, mask));
                }
            }
        }
        props
    }
}

/// Sent as Set-Async, only the masks that are set are changed on the switch
impl OfpPacket for OfpAsyncConfig {
    fn typ() -> OfpType {
        OfpType::SetAsync
    }

    fn body_length(&self) -> usize {
        8 * self.properties().len()
    }

    fn serialize_body(&self, w: &mut MessageWriter) {
        for (typ, mask) in self.properties() {
            w.put_u16(typ);
            w.put_u16(8);
            w.put_u32(mask);
        }
    }
}

impl OfpMultipartRequest {
    /// Constructs a request for the features of all tables
    pub fn new_table_features() -> OfpMultipartRequest {
        OfpMultipartRequest {
            typ: OfpMultipartType::TableFeatures as u16,
            flags: 0,
        }
    }
}

impl OfpPacket for OfpMultipartRequest {
    fn typ() -> OfpType {
        OfpType::MultipartRequest
    }

    fn body_length(&self) -> usize {
        8
    }

    fn serialize_body(&self, w: &mut MessageWriter) {
        w.put_u16(self.typ);
        w.put_u16(self.flags);
        w.put_zeros(4);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openflow::buffer_pool::BufferPool;
    use crate::openflow::messages::deserialize::Deserialize;
    use crate::packet::MacAddr;

    fn write<P: OfpPacket>(packet: &P, xid: u32) -> Vec<u8> {
        let pool = BufferPool::new(1);
        let mut buf = pool.acquire();
        let len = packet.serialize(&mut buf, xid);
        assert_eq!(len, buf.len());
        assert_eq!(packet.length(), buf.len());
        let written = buf.to_vec();
        pool.release(buf);
        written
    }

    fn split(bytes: &[u8]) -> (OfpHeader, &[u8]) {
        let header = OfpHeader::parse(bytes).unwrap();
        assert_eq!(bytes.len(), header.length());
        (header, &bytes[8..])
    }

    #[test]
    fn echo_reply_serialization() {
        let bytes = write(&OfpEchoReply::new(&[1, 2, 3, 4]), 42);
        assert_eq!(vec![5, 3, 0, 12, 0, 0, 0, 42, 1, 2, 3, 4], bytes);
    }

    #[test]
    fn hello_round_trip() {
        let bytes = write(&OfpHello::new(), 1);
        assert_eq!(
            vec![5, 0, 0, 16, 0, 0, 0, 1, 0, 1, 0, 8, 0, 0, 0, 0x20],
            bytes
        );
        let (header, body) = split(&bytes);
        let hello = OfpHello::deserialize(header.version(), body).unwrap();
        assert_eq!(OfpHello::new(), hello);
        assert_eq!(OFP_VERSION, hello.negotiate().unwrap());
    }

    #[test]
    fn features_request_round_trip() {
        let bytes = write(&OfpFeaturesRequest, 0xdead_beef);
        let (header, body) = split(&bytes);
        assert_eq!(OfpHeader::new(OfpType::FeaturesRequest, 0xdead_beef), header);
        assert!(body.is_empty());
    }

    #[test]
    fn match_serialization() {
        let mut mat = OfpMatch::new();
        mat.add_tlv(OfpOxmTlv::new_eth_dst(MacAddr::new([2, 0, 0, 0, 0, 2])));
        assert_eq!(14, mat.length());
        assert_eq!(16, mat.padded_length());

        let pool = BufferPool::new(1);
        let mut buf = pool.acquire();
        let mut w = MessageWriter::new(&mut buf, OfpType::FlowMod, 0);
        mat.serialize(&mut w);
        assert_eq!(24, w.finish());
        assert_eq!(
            &[0, 1, 0, 14, 0x80, 0, 6, 6, 2, 0, 0, 0, 0, 2, 0, 0],
            &buf[8..]
        );
    }

    #[test]
    fn flow_mod_round_trip() {
        let a = MacAddr::new([2, 0, 0, 0, 0, 1]);
        let b = MacAddr::new([2, 0, 0, 0, 0, 2]);
        let mut mat = OfpMatch::new();
        mat.add_tlv(OfpOxmTlv::new_eth_src(a))
            .add_tlv(OfpOxmTlv::new_eth_dst(b));
        let instr = OfpInstructionActions::new(vec![OfpActionOutput::new(7)]);
        let flow_mod = OfpFlowMod::new(OfpFlowModCommand::Add, 0x2, 1, 10, mat, vec![instr])
            .timeouts(10, 0);

        let bytes = write(&flow_mod, 9);
        // header, fixed body, match of 4 + 2 * 10 padded to 24, instruction
        assert_eq!(8 + 40 + 24 + 24, bytes.len());
        let (header, body) = split(&bytes);
        assert_eq!(OfpType::FlowMod as u8, header.typ());
        let decoded = OfpFlowMod::deserialize(body).unwrap();
        assert_eq!(flow_mod, decoded);
        assert_eq!(7, decoded.instructions()[0].actions()[0].port());
    }

    #[test]
    fn table_miss_flow_mod_layout() {
        let instr = OfpInstructionActions::new(vec![OfpActionOutput::new_to_controller()]);
        let flow_mod = OfpFlowMod::new(OfpFlowModCommand::Add, 1, 0, 0, OfpMatch::new(), vec![instr]);
        let bytes = write(&flow_mod, 1);
        assert_eq!(8 + 40 + 8 + 24, bytes.len());
        // empty match padded to 8
        assert_eq!(&[0, 1, 0, 4, 0, 0, 0, 0], &bytes[48..56]);
        // apply actions instruction with the controller output
        assert_eq!(&[0, 4, 0, 24, 0, 0, 0, 0], &bytes[56..64]);
        assert_eq!(
            &[0, 0, 0, 16, 0xff, 0xff, 0xff, 0xfd, 0xff, 0xff, 0, 0, 0, 0, 0, 0],
            &bytes[64..]
        );
    }

    #[test]
    fn packet_out_round_trip() {
        let frame = [0xab; 60];
        let out = OfpPacketOut::new(OFP_NO_BUFFER, 3, vec![OfpActionOutput::new(OFPP_ALL)], &frame);
        let bytes = write(&out, 5);
        let (_, body) = split(&bytes);
        assert_eq!(out, OfpPacketOut::deserialize(body).unwrap());

        let buffered = OfpPacketOut::new(17, 3, vec![OfpActionOutput::new(4)], &frame);
        assert_eq!(8 + 16 + 16, buffered.length());
    }

    #[test]
    fn set_async_serialization() {
        let mut conf = OfpAsyncConfig::default();
        conf.set_packet_in_master(0x3);
        let bytes = write(&conf, 2);
        let (header, body) = split(&bytes);
        assert_eq!(OfpType::SetAsync as u8, header.typ());
        assert_eq!(&[0, 1, 0, 8, 0, 0, 0, 3], body);
        assert_eq!(conf, OfpAsyncConfig::deserialize(body).unwrap());
    }

    #[test]
    fn multipart_request_serialization() {
        let bytes = write(&OfpMultipartRequest::new_table_features(), 3);
        assert_eq!(&[0, 12, 0, 0, 0, 0, 0, 0], &bytes[8..]);
    }

    #[test]
    fn messages_append_to_a_buffer() {
        let pool = BufferPool::new(1);
        let mut buf = pool.acquire();
        OfpHello::new().serialize(&mut buf, 1);
        OfpFeaturesRequest.serialize(&mut buf, 2);
        assert_eq!(24, buf.len());
        assert_eq!(&[5, 5, 0, 8, 0, 0, 0, 2], &buf[16..]);
    }
}
