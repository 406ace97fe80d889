/*!
All deserialization routines for the OpenFlow message primitives

The header uses a special deserialization because its size is known.
Use the trait `Deserialize` for any other message body.
Every read goes through a `WireReader`, which checks each declared
length against the bytes that are actually left before touching them.
Views borrow from the receive buffer and never copy the variable parts.
*/

use byteorder::{ByteOrder, NetworkEndian};
use crate::openflow::error::{Error, Result};
use crate::openflow::messages::*;

use std::borrow::Cow;

/// Header length of every property, OXM-less TLV and hello element
const TLV_HEADER_LENGTH: usize = 4;

/// Bytes needed to pad `len` to the next multiple of 8
pub fn pad_len(len: usize) -> usize {
    (len + 7) / 8 * 8 - len
}

/// A bounds-checked cursor over a byte slice.
/// Running out of bytes is reported as `Error::MalformedMessage`
/// naming the structure that was being read.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> WireReader<'a> {
    /// Creates a reader at the start of `bytes`
    pub fn new(bytes: &'a [u8], context: &'static str) -> WireReader<'a> {
        WireReader { bytes, pos: 0, context }
    }

    /// Bytes that were not read yet
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Checks if everything was read
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn malformed(&self) -> Error {
        Error::MalformedMessage(self.context)
    }

    /// Reads exactly `n` bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(self.malformed());
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Skips exactly `n` bytes
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Skips up to `n` bytes. Used for trailing alignment padding
    /// that a peer may leave out at the very end of a structure.
    pub fn skip_padding(&mut self, n: usize) {
        let n = n.min(self.remaining());
        self.pos += n;
    }

    /// Reads all remaining bytes
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        slice
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(NetworkEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(NetworkEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(NetworkEndian::read_u64(self.read_bytes(8)?))
    }

    /// Reads a sub-structure of `n` bytes as its own reader,
    /// so that it can never read into its successor
    pub fn sub_reader(&mut self, n: usize, context: &'static str) -> Result<WireReader<'a>> {
        Ok(WireReader::new(self.read_bytes(n)?, context))
    }
}

impl OfpHeader {
    /// Deserializes an OpenFlow header
    pub fn deserialize(bytes: &[u8; 8]) -> OfpHeader {
        OfpHeader {
            version: bytes[0],
            typ: bytes[1],
            length: NetworkEndian::read_u16(&bytes[2..4]),
            xid: NetworkEndian::read_u32(&bytes[4..]),
        }
    }

    /// Deserializes the header at the start of `bytes`.
    /// Fails if fewer than 8 bytes are given or if the
    /// declared message length cannot even hold the header.
    pub fn parse(bytes: &[u8]) -> Result<OfpHeader> {
        let header_length = OfpHeader::header_length();
        if bytes.len() < header_length {
            return Err(Error::MalformedMessage("truncated header"));
        }
        let mut fixed = [0; 8];
        fixed.copy_from_slice(&bytes[..header_length]);
        let header = OfpHeader::deserialize(&fixed);
        if header.length() < header_length {
            return Err(Error::MalformedMessage("header length below minimum"));
        }
        Ok(header)
    }
}

/// To be implemented by all OpenFlow message bodies that are received.
pub trait Deserialize<'a>: Sized {
    /// Deserialize the body bytes (everything after the header)
    /// Fails on providing a too small or too large buffer
    fn deserialize(bytes: &'a [u8]) -> Result<Self> {
        if Self::min_length() > bytes.len() || Self::max_length() < bytes.len() {
            return Err(Error::MalformedMessage(Self::context()));
        }
        Self::deserialize_len_ok(WireReader::new(bytes, Self::context()))
    }

    /// Deserializes the body (network byte order)
    /// Implementers can rely on the body's size to be within
    /// `Self::min_length()` and `Self::max_length()`
    fn deserialize_len_ok(reader: WireReader<'a>) -> Result<Self>;

    /// The minimum length of the body in bytes
    fn min_length() -> usize;

    /// The maximum length of the body in bytes
    /// May not return a value greater than 0xFFF7
    fn max_length() -> usize {
        0xffff - OfpHeader::header_length()
    }

    /// Names the structure in `MalformedMessage` errors
    fn context() -> &'static str;
}

impl OfpHello {
    /// Deserializes a Hello body. Hello elements other
    /// than the version bitmap are skipped.
    pub fn deserialize(version: u8, body: &[u8]) -> Result<OfpHello> {
        let mut bitmap = None;
        for elem in PropertyIter::new(body, "hello element") {
            let elem = elem?;
            if elem.typ() == OfpHelloElemType::VersionBitmap as u16 {
                let words = elem
                    .body()
                    .chunks(4)
                    .filter(|w| w.len() == 4)
                    .map(NetworkEndian::read_u32)
                    .collect();
                bitmap = Some(words);
            }
            else {
                trace!("Skipping hello element of type {}", elem.typ());
            }
        }
        Ok(OfpHello { version, bitmap })
    }

    /// Checks that the peer speaks `OFP_VERSION`.
    ///
    /// With a version bitmap the `OFP_VERSION` bit has to be set,
    /// without one the lower of both header versions is agreed upon.
    pub fn negotiate(&self) -> Result<u8> {
        let supported = match self.bitmap {
            Some(ref words) => {
                let word = (OFP_VERSION / 32) as usize;
                let bit = u32::from(OFP_VERSION % 32);
                words.get(word).map_or(false, |w| w & (1 << bit) != 0)
            }
            None => self.version >= OFP_VERSION,
        };
        if supported {
            Ok(OFP_VERSION)
        }
        else {
            Err(Error::ProtocolMismatch(self.version))
        }
    }

    /// Gets the version from the Hello's header
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Gets the version bitmap words, if any
    pub fn bitmap(&self) -> Option<&[u32]> {
        self.bitmap.as_ref().map(|b| b.as_slice())
    }
}

impl<'a> Deserialize<'a> for OfpEchoRequest<'a> {
    fn deserialize_len_ok(mut reader: WireReader<'a>) -> Result<Self> {
        Ok(OfpEchoRequest { arbitrary: reader.rest() })
    }

    fn min_length() -> usize {
        0
    }

    fn context() -> &'static str {
        "echo request"
    }
}

impl<'a> Deserialize<'a> for OfpSwitchFeatures {
    fn deserialize_len_ok(mut r: WireReader<'a>) -> Result<Self> {
        let datapath_id = r.read_u64()?;
        let n_buffers = r.read_u32()?;
        let n_tables = r.read_u8()?;
        let auxiliary_id = r.read_u8()?;
        r.skip(2)?;
        Ok(OfpSwitchFeatures {
            datapath_id,
            n_buffers,
            n_tables,
            auxiliary_id,
            capabilities: r.read_u32()?,
            reserved: r.read_u32()?,
        })
    }

    fn min_length() -> usize {
        24
    }

    fn max_length() -> usize {
        24
    }

    fn context() -> &'static str {
        "features reply"
    }
}

impl<'a> Deserialize<'a> for OfpErrorMsg {
    fn deserialize_len_ok(mut r: WireReader<'a>) -> Result<Self> {
        let typ = r.read_u16()?;
        let code = r.read_u16()?;
        Ok(OfpErrorMsg {
            typ,
            code,
            data: r.rest().to_vec(),
        })
    }

    fn min_length() -> usize {
        4
    }

    fn context() -> &'static str {
        "error message"
    }
}

impl OfpErrorMsg {
    /// Gets the header of the request that caused this error,
    /// if the switch attached enough of it
    pub fn failed_header(&self) -> Option<OfpHeader> {
        OfpHeader::parse(&self.data).ok()
    }
}

/* ## ----------------------------- ## */
/* ## Properties (generic TLV walk). ## */
/* ## ----------------------------- ## */

/// A `(type, length)` prefixed property. `length` covers the
/// header and the body but not the alignment padding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Property<'a> {
    typ: u16,
    body: &'a [u8],
}

impl<'a> Property<'a> {
    pub fn typ(&self) -> u16 {
        self.typ
    }

    /// The declared length including the property header
    pub fn length(&self) -> usize {
        TLV_HEADER_LENGTH + self.body.len()
    }

    pub fn body(&self) -> &'a [u8] {
        self.body
    }

    /// Reads the body as a single 32 bit value, like the
    /// reason masks of the async config properties
    pub fn body_u32(&self) -> Result<u32> {
        WireReader::new(self.body, "32 bit property").read_u32()
    }
}

/// Iterates over a list of properties padded to 8 bytes each.
/// Unknown property types are yielded as well,
/// it is up to the caller to skip them.
/// After the first error the iterator is exhausted.
#[derive(Debug, Clone)]
pub struct PropertyIter<'a> {
    reader: WireReader<'a>,
    failed: bool,
}

impl<'a> PropertyIter<'a> {
    pub fn new(bytes: &'a [u8], context: &'static str) -> PropertyIter<'a> {
        PropertyIter {
            reader: WireReader::new(bytes, context),
            failed: false,
        }
    }

    fn next_property(&mut self) -> Result<Property<'a>> {
        let typ = self.reader.read_u16()?;
        let length = self.reader.read_u16()? as usize;
        if length < TLV_HEADER_LENGTH {
            return Err(self.reader.malformed());
        }
        let body = self.reader.read_bytes(length - TLV_HEADER_LENGTH)?;
        self.reader.skip_padding(pad_len(length));
        Ok(Property { typ, body })
    }
}

impl<'a> Iterator for PropertyIter<'a> {
    type Item = Result<Property<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let property = self.next_property();
        self.failed = property.is_err();
        Some(property)
    }
}

/* ## -------------------------- ## */
/* ## OpenFlow Extensible Match. ## */
/* ## -------------------------- ## */

/// A single OXM TLV within a match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OxmField<'a> {
    class: u16,
    field: u8,
    has_mask: bool,
    value: &'a [u8],
}

impl<'a> OxmField<'a> {
    pub fn class(&self) -> u16 {
        self.class
    }

    /// The raw field number within the class
    pub fn field(&self) -> u8 {
        self.field
    }

    pub fn has_mask(&self) -> bool {
        self.has_mask
    }

    /// The payload length from the OXM header
    pub fn length(&self) -> usize {
        self.value.len()
    }

    /// The value, followed by the mask if `has_mask()`
    pub fn value(&self) -> &'a [u8] {
        self.value
    }

    /// The known basic field, if this is one
    pub fn basic_field(&self) -> Option<OxmOfbMatchFields> {
        if self.class == OfpOxmClass::OpenflowBasic as u16 {
            OxmOfbMatchFields::from_u8(self.field)
        }
        else {
            None
        }
    }

    /// The value of a 32 bit field without mask
    pub fn value_u32(&self) -> Option<u32> {
        if self.has_mask || self.value.len() != 4 {
            return None;
        }
        Some(NetworkEndian::read_u32(self.value))
    }
}

/// Iterates over the OXM TLVs of a match. OXM TLVs are not padded.
#[derive(Debug, Clone)]
pub struct OxmIter<'a> {
    reader: WireReader<'a>,
    failed: bool,
}

impl<'a> OxmIter<'a> {
    pub fn new(bytes: &'a [u8]) -> OxmIter<'a> {
        OxmIter {
            reader: WireReader::new(bytes, "oxm field"),
            failed: false,
        }
    }

    fn next_field(&mut self) -> Result<OxmField<'a>> {
        let header = self.reader.read_u32()?;
        let length = (header & 0xff) as usize;
        Ok(OxmField {
            class: (header >> 16) as u16,
            field: ((header >> 9) & 0x7f) as u8,
            has_mask: (header >> 8) & 1 == 1,
            value: self.reader.read_bytes(length)?,
        })
    }
}

impl<'a> Iterator for OxmIter<'a> {
    type Item = Result<OxmField<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let field = self.next_field();
        self.failed = field.is_err();
        Some(field)
    }
}

/// A received match. All of its OXM TLVs were
/// validated on construction, iterating cannot fail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchView<'a> {
    oxm: &'a [u8],
}

impl<'a> MatchView<'a> {
    /// Reads a match including its trailing padding
    pub fn parse(r: &mut WireReader<'a>) -> Result<MatchView<'a>> {
        let typ = r.read_u16()?;
        if typ != OfpMatchType::Oxm as u16 {
            return Err(Error::MalformedMessage("unsupported match type"));
        }
        let length = r.read_u16()? as usize;
        if length < TLV_HEADER_LENGTH {
            return Err(Error::MalformedMessage("match length below minimum"));
        }
        let oxm = r.read_bytes(length - TLV_HEADER_LENGTH)?;
        r.skip(pad_len(length))?;

        for field in OxmIter::new(oxm) {
            let field = field?;
            if field.basic_field().is_none() {
                debug!(
                    "Skipping unrecognized OXM field: class {:#x}, field {}, {} bytes",
                    field.class(),
                    field.field(),
                    field.length()
                );
            }
        }
        Ok(MatchView { oxm })
    }

    /// Length of the match excluding padding
    pub fn length(&self) -> usize {
        TLV_HEADER_LENGTH + self.oxm.len()
    }

    /// All OXM fields in wire order
    pub fn fields(&self) -> impl Iterator<Item = OxmField<'a>> {
        OxmIter::new(self.oxm).filter_map(Result::ok)
    }

    /// The first basic field of the given kind
    pub fn find(&self, field: OxmOfbMatchFields) -> Option<OxmField<'a>> {
        self.fields().find(|f| f.basic_field() == Some(field))
    }

    /// The ingress port, which every packet-in has to carry
    pub fn in_port(&self) -> Option<u32> {
        self.find(OxmOfbMatchFields::InPort).and_then(|f| f.value_u32())
    }

    /// Copies the recognized fields into an owned `OfpMatch`
    pub fn to_match(&self) -> OfpMatch {
        let mut mat = OfpMatch::new();
        for field in self.fields() {
            if let Some(basic) = field.basic_field() {
                mat.add_tlv(OfpOxmTlv::new(basic, field.has_mask(), field.value().to_vec()));
            }
        }
        mat
    }
}

/* ## --------------------------- ## */
/* ## Instructions and Actions.    ## */
/* ## --------------------------- ## */

fn parse_actions(mut r: WireReader) -> Result<Vec<OfpActionOutput>> {
    let mut actions = vec![];
    while !r.is_empty() {
        let typ = r.read_u16()?;
        let len = r.read_u16()? as usize;
        if len < 8 || len % 8 != 0 {
            return Err(Error::MalformedMessage("action length"));
        }
        let mut body = r.sub_reader(len - TLV_HEADER_LENGTH, "action")?;
        if typ == OfpActionType::Output as u16 {
            if len != 16 {
                return Err(Error::MalformedMessage("output action length"));
            }
            actions.push(OfpActionOutput {
                typ,
                len: len as u16,
                port: body.read_u32()?,
                max_len: body.read_u16()?,
            });
        }
        else {
            debug!("Skipping action of type {}", typ);
        }
    }
    Ok(actions)
}

fn parse_instructions(mut r: WireReader) -> Result<Vec<OfpInstructionActions>> {
    let mut instructions = vec![];
    while !r.is_empty() {
        let typ = r.read_u16()?;
        let len = r.read_u16()? as usize;
        if len < 8 {
            return Err(Error::MalformedMessage("instruction length"));
        }
        let mut body = r.sub_reader(len - TLV_HEADER_LENGTH, "instruction")?;
        if typ == OfpInstructionType::ApplyActions as u16 {
            body.skip(4)?;
            instructions.push(OfpInstructionActions {
                typ,
                actions: parse_actions(body)?,
            });
        }
        else {
            debug!("Skipping instruction of type {}", typ);
        }
    }
    Ok(instructions)
}

impl<'a> Deserialize<'a> for OfpFlowMod {
    fn deserialize_len_ok(mut r: WireReader<'a>) -> Result<Self> {
        let cookie = r.read_u64()?;
        let cookie_mask = r.read_u64()?;
        let table_id = r.read_u8()?;
        let command = r.read_u8()?;
        let idle_timeout = r.read_u16()?;
        let hard_timeout = r.read_u16()?;
        let priority = r.read_u16()?;
        let buffer_id = r.read_u32()?;
        let out_port = r.read_u32()?;
        let out_group = r.read_u32()?;
        let flags = r.read_u16()?;
        let importance = r.read_u16()?;
        let match_field = MatchView::parse(&mut r)?.to_match();
        let remaining = r.remaining();
        let instructions = parse_instructions(r.sub_reader(remaining, "instruction")?)?;
        Ok(OfpFlowMod {
            cookie,
            cookie_mask,
            table_id,
            command,
            idle_timeout,
            hard_timeout,
            priority,
            buffer_id,
            out_port,
            out_group,
            flags,
            importance,
            match_field,
            instructions,
        })
    }

    fn min_length() -> usize {
        48
    }

    fn context() -> &'static str {
        "flow mod"
    }
}

/* ## ------------------------- ## */
/* ## Packet-In and Packet-Out. ## */
/* ## ------------------------- ## */

impl<'a> Deserialize<'a> for OfpPacketIn<'a> {
    fn deserialize_len_ok(mut r: WireReader<'a>) -> Result<Self> {
        let buffer_id = r.read_u32()?;
        let total_len = r.read_u16()?;
        let reason = r.read_u8()?;
        let table_id = r.read_u8()?;
        let cookie = r.read_u64()?;
        let match_field = MatchView::parse(&mut r)?;
        r.skip(2)?;
        Ok(OfpPacketIn {
            buffer_id,
            total_len,
            reason,
            table_id,
            cookie,
            match_field,
            data: r.rest(),
        })
    }

    fn min_length() -> usize {
        26
    }

    fn context() -> &'static str {
        "packet in"
    }
}

impl<'a> OfpPacketIn<'a> {
    /// The known reason, if any
    pub fn known_reason(&self) -> Option<OfpPacketInReason> {
        use self::OfpPacketInReason::*;
        match self.reason {
            0 => Some(TableMiss),
            1 => Some(ApplyAction),
            2 => Some(InvalidTtl),
            3 => Some(ActionSet),
            4 => Some(Group),
            5 => Some(PacketOut),
            _ => None,
        }
    }
}

impl<'a> Deserialize<'a> for OfpPacketOut<'a> {
    fn deserialize_len_ok(mut r: WireReader<'a>) -> Result<Self> {
        let buffer_id = r.read_u32()?;
        let in_port = r.read_u32()?;
        let actions_len = r.read_u16()? as usize;
        r.skip(6)?;
        let actions = parse_actions(r.sub_reader(actions_len, "packet out actions")?)?;
        Ok(OfpPacketOut {
            buffer_id,
            in_port,
            actions,
            data: r.rest(),
        })
    }

    fn min_length() -> usize {
        16
    }

    fn context() -> &'static str {
        "packet out"
    }
}

#[cfg(test)]
impl<'a> OfpPacketOut<'a> {
    pub fn buffer_id(&self) -> u32 {
        self.buffer_id
    }

    pub fn in_port(&self) -> u32 {
        self.in_port
    }

    pub fn actions(&self) -> &[OfpActionOutput] {
        &self.actions
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

/* ## ------------------------------------ ## */
/* ## Property based message bodies.       ## */
/* ## ------------------------------------ ## */

impl<'a> Deserialize<'a> for OfpAsyncConfig {
    fn deserialize_len_ok(mut r: WireReader<'a>) -> Result<Self> {
        use self::OfpAsyncConfigPropType::*;

        let mut conf = OfpAsyncConfig::default();
        for prop in PropertyIter::new(r.rest(), Self::context()) {
            let prop = prop?;
            let typ = match OfpAsyncConfigPropType::from_u16(prop.typ()) {
                Some(typ) => typ,
                None => {
                    trace!("Skipping async config property of type {:#x}", prop.typ());
                    continue;
                }
            };
            let mask = Some(prop.body_u32()?);
            let role = typ as usize & 1;
            match typ {
                PacketInSlave | PacketInMaster => conf.packet_in_mask[role] = mask,
                PortStatusSlave | PortStatusMaster => conf.port_status_mask[role] = mask,
                FlowRemovedSlave | FlowRemovedMaster => conf.flow_removed_mask[role] = mask,
                RoleStatusSlave | RoleStatusMaster => conf.role_status_mask[role] = mask,
                TableStatusSlave | TableStatusMaster => conf.table_status_mask[role] = mask,
                RequestforwardSlave | RequestforwardMaster => {
                    conf.requestforward_mask[role] = mask
                }
            }
        }
        Ok(conf)
    }

    fn min_length() -> usize {
        0
    }

    fn context() -> &'static str {
        "async config"
    }
}

/// Body of a multipart reply
#[derive(Debug)]
pub struct OfpMultipartReply<'a> {
    typ: u16,
    flags: u16,
    body: &'a [u8],
}

impl<'a> Deserialize<'a> for OfpMultipartReply<'a> {
    fn deserialize_len_ok(mut r: WireReader<'a>) -> Result<Self> {
        let typ = r.read_u16()?;
        let flags = r.read_u16()?;
        r.skip(4)?;
        Ok(OfpMultipartReply {
            typ,
            flags,
            body: r.rest(),
        })
    }

    fn min_length() -> usize {
        8
    }

    fn context() -> &'static str {
        "multipart reply"
    }
}

/// More replies to follow.
pub const OFPMPF_REPLY_MORE: u16 = 1 << 0;

impl<'a> OfpMultipartReply<'a> {
    pub fn typ(&self) -> u16 {
        self.typ
    }

    /// Checks whether more replies belong to the same request
    pub fn has_more(&self) -> bool {
        self.flags & OFPMPF_REPLY_MORE != 0
    }

    /// Iterates over the entries of a table features reply
    pub fn table_features(&self) -> TableFeaturesIter<'a> {
        TableFeaturesIter {
            reader: WireReader::new(self.body, "table features"),
            failed: false,
        }
    }
}

/// Body of one table in a table features reply
#[derive(Debug)]
pub struct OfpTableFeatures<'a> {
    table_id: u8,
    name: &'a [u8],
    max_entries: u32,
    properties: &'a [u8],
}

impl<'a> OfpTableFeatures<'a> {
    const FIXED_LENGTH: usize = 64;

    fn parse(r: &mut WireReader<'a>) -> Result<OfpTableFeatures<'a>> {
        let length = r.read_u16()? as usize;
        if length < Self::FIXED_LENGTH {
            return Err(Error::MalformedMessage("table features length below minimum"));
        }
        let mut t = r.sub_reader(length - 2, "table features")?;
        let table_id = t.read_u8()?;
        t.skip(5)?;
        let name = t.read_bytes(32)?;
        t.skip(16)?; // metadata match and write
        t.skip(4)?; // capabilities
        let max_entries = t.read_u32()?;
        Ok(OfpTableFeatures {
            table_id,
            name,
            max_entries,
            properties: t.rest(),
        })
    }

    pub fn table_id(&self) -> u8 {
        self.table_id
    }

    /// The table's name up to the first NUL
    pub fn name(&self) -> Cow<'a, str> {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end])
    }

    pub fn max_entries(&self) -> u32 {
        self.max_entries
    }

    pub fn properties(&self) -> PropertyIter<'a> {
        PropertyIter::new(self.properties, "table feature property")
    }
}

/// Iterates over the tables of a table features reply
#[derive(Debug)]
pub struct TableFeaturesIter<'a> {
    reader: WireReader<'a>,
    failed: bool,
}

impl<'a> Iterator for TableFeaturesIter<'a> {
    type Item = Result<OfpTableFeatures<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let table = OfpTableFeatures::parse(&mut self.reader);
        self.failed = table.is_err();
        Some(table)
    }
}

/// Role status message (datapath -> controller).
#[derive(Debug)]
pub struct OfpRoleStatus<'a> {
    role: u32,
    reason: u8,
    generation_id: u64,
    properties: &'a [u8],
}

impl<'a> Deserialize<'a> for OfpRoleStatus<'a> {
    fn deserialize_len_ok(mut r: WireReader<'a>) -> Result<Self> {
        let role = r.read_u32()?;
        let reason = r.read_u8()?;
        r.skip(3)?;
        Ok(OfpRoleStatus {
            role,
            reason,
            generation_id: r.read_u64()?,
            properties: r.rest(),
        })
    }

    fn min_length() -> usize {
        16
    }

    fn context() -> &'static str {
        "role status"
    }
}

impl<'a> OfpRoleStatus<'a> {
    pub fn role(&self) -> Option<OfpControllerRole> {
        OfpControllerRole::from_u32(self.role)
    }

    pub fn reason(&self) -> u8 {
        self.reason
    }

    pub fn generation_id(&self) -> u64 {
        self.generation_id
    }

    pub fn properties(&self) -> PropertyIter<'a> {
        PropertyIter::new(self.properties, "role property")
    }
}

/// Message structure for OFPT_BUNDLE_CONTROL.
#[derive(Debug)]
pub struct OfpBundleCtrl<'a> {
    bundle_id: u32,
    typ: u16,
    flags: u16,
    properties: &'a [u8],
}

impl<'a> Deserialize<'a> for OfpBundleCtrl<'a> {
    fn deserialize_len_ok(mut r: WireReader<'a>) -> Result<Self> {
        Ok(OfpBundleCtrl {
            bundle_id: r.read_u32()?,
            typ: r.read_u16()?,
            flags: r.read_u16()?,
            properties: r.rest(),
        })
    }

    fn min_length() -> usize {
        8
    }

    fn context() -> &'static str {
        "bundle control"
    }
}

impl<'a> OfpBundleCtrl<'a> {
    pub fn bundle_id(&self) -> u32 {
        self.bundle_id
    }

    pub fn typ(&self) -> Option<OfpBundleCtrlType> {
        OfpBundleCtrlType::from_u16(self.typ)
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn properties(&self) -> PropertyIter<'a> {
        PropertyIter::new(self.properties, "bundle property")
    }
}

/// Flow removed (datapath -> controller).
#[derive(Debug)]
pub struct OfpFlowRemoved<'a> {
    cookie: u64,
    priority: u16,
    reason: u8,
    table_id: u8,
    duration_sec: u32,
    packet_count: u64,
    byte_count: u64,
    match_field: MatchView<'a>,
}

impl<'a> Deserialize<'a> for OfpFlowRemoved<'a> {
    fn deserialize_len_ok(mut r: WireReader<'a>) -> Result<Self> {
        let cookie = r.read_u64()?;
        let priority = r.read_u16()?;
        let reason = r.read_u8()?;
        let table_id = r.read_u8()?;
        let duration_sec = r.read_u32()?;
        r.skip(8)?; // duration_nsec, idle and hard timeout
        let packet_count = r.read_u64()?;
        let byte_count = r.read_u64()?;
        Ok(OfpFlowRemoved {
            cookie,
            priority,
            reason,
            table_id,
            duration_sec,
            packet_count,
            byte_count,
            match_field: MatchView::parse(&mut r)?,
        })
    }

    fn min_length() -> usize {
        48
    }

    fn context() -> &'static str {
        "flow removed"
    }
}

impl<'a> OfpFlowRemoved<'a> {
    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    pub fn priority(&self) -> u16 {
        self.priority
    }

    pub fn reason(&self) -> Option<OfpFlowRemovedReason> {
        OfpFlowRemovedReason::from_u8(self.reason)
    }

    pub fn table_id(&self) -> u8 {
        self.table_id
    }

    /// Time the flow was alive in seconds
    pub fn duration_sec(&self) -> u32 {
        self.duration_sec
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }

    pub fn match_field(&self) -> &MatchView<'a> {
        &self.match_field
    }
}

/// A physical port has changed in the datapath
#[derive(Debug)]
pub struct OfpPortStatus<'a> {
    reason: u8,
    port_no: u32,
    hw_addr: MacAddr,
    name: &'a [u8],
    config: u32,
    state: u32,
    properties: &'a [u8],
}

impl<'a> Deserialize<'a> for OfpPortStatus<'a> {
    fn deserialize_len_ok(mut r: WireReader<'a>) -> Result<Self> {
        let reason = r.read_u8()?;
        r.skip(7)?;
        let port_no = r.read_u32()?;
        let length = r.read_u16()? as usize;
        if length < 40 {
            return Err(Error::MalformedMessage("port length below minimum"));
        }
        let mut p = r.sub_reader(length - 6, "port")?;
        p.skip(2)?;
        let hw_addr = MacAddr::from_slice(p.read_bytes(6)?)
            .ok_or(Error::MalformedMessage("port hardware address"))?;
        p.skip(2)?;
        let name = p.read_bytes(16)?;
        let config = p.read_u32()?;
        let state = p.read_u32()?;
        Ok(OfpPortStatus {
            reason,
            port_no,
            hw_addr,
            name,
            config,
            state,
            properties: p.rest(),
        })
    }

    fn min_length() -> usize {
        48
    }

    fn context() -> &'static str {
        "port status"
    }
}

impl<'a> OfpPortStatus<'a> {
    pub fn reason(&self) -> Option<OfpPortReason> {
        OfpPortReason::from_u8(self.reason)
    }

    pub fn port_no(&self) -> u32 {
        self.port_no
    }

    pub fn hw_addr(&self) -> MacAddr {
        self.hw_addr
    }

    /// The port's name up to the first NUL
    pub fn name(&self) -> Cow<'a, str> {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end])
    }

    /// The port was disabled by configuration
    pub fn admin_down(&self) -> bool {
        self.config & OFPPC_PORT_DOWN != 0
    }

    pub fn link_down(&self) -> bool {
        self.state & OFPPS_LINK_DOWN != 0
    }

    pub fn properties(&self) -> PropertyIter<'a> {
        PropertyIter::new(self.properties, "port property")
    }
}
