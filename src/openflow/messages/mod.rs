/*!
All the base OpenFlow 1.4 message primitives needed to run a learning bridge

This is based on the openflow.h from OpenFlow Switch Specification 1.4.1.
The type names are changed to align with the Rust conventions.
Received messages are decoded into borrowed views (see `deserialize`),
sent messages are built in place in pooled buffers (see `serialize`).
*/

pub mod deserialize;
pub mod serialize;

use crate::openflow::error::{Error, Result};
use crate::packet::MacAddr;

use std::fmt;

impl OfpErrorMsg {
    fn first_64_bytes(message: &[u8]) -> Vec<u8> {
        let end = if message.len() < 64 { message.len() } else { 64 };
        message[..end].to_vec()
    }

    /// Constructs a Hello Failed error
    pub fn new_hello_failed() -> OfpErrorMsg {
        OfpErrorMsg {
            typ: OfpErrorType::HelloFailed as u16,
            code: OfpHelloFailedCode::Incompatible as u16,
            data: b"OpenFlow 1.4 is required".to_vec(),
        }
    }

    /// Constructs a Bad Request error carrying at most
    /// the first 64 bytes of the offending message
    pub fn new_bad_request(code: OfpBadRequestCode, message: &[u8]) -> OfpErrorMsg {
        OfpErrorMsg {
            typ: OfpErrorType::BadRequest as u16,
            code: code as u16,
            data: Self::first_64_bytes(message),
        }
    }

    /// Checks if this `OfpErrorMsg` describes the target OpenFlow Table being full
    pub fn check_table_full(&self) -> bool {
        self.typ == OfpErrorType::FlowModFailed as u16
            && self.code == OfpFlowModFailedCode::TableFull as u16
    }

    /// Gets the error type
    pub fn typ(&self) -> u16 {
        self.typ
    }

    /// Gets the error code
    pub fn code(&self) -> u16 {
        self.code
    }
}

impl fmt::Display for OfpErrorMsg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match OfpErrorType::from_u16(self.typ) {
            Some(typ) => write!(f, "OpenFlow Error: {:?}, code({})", typ, self.code),
            None => write!(f, "OpenFlow Error: type({}), code({})", self.typ, self.code),
        }
    }
}

/* Some getters */

impl OfpHeader {
    /// Gets the packet's OpenFlow version
    pub fn version(&self) -> u8 {
        self.version
    }
    /// Gets this packet's `OfpType`'s numerical respresentation.
    pub fn typ(&self) -> u8 {
        self.typ
    }
    /// Gets the packet's total length including the header
    pub fn length(&self) -> usize {
        self.length as usize
    }
    /// Gets the packet's transaction id
    pub fn xid(&self) -> u32 {
        self.xid
    }
}

impl OfpSwitchFeatures {
    /// Gets the datapath unique ID
    pub fn datapath_id(&self) -> u64 {
        self.datapath_id
    }
    /// Gets the number of packets the switch can buffer
    pub fn n_buffers(&self) -> u32 {
        self.n_buffers
    }
    /// Gets the number of flow tables
    pub fn n_tables(&self) -> u8 {
        self.n_tables
    }
    /// Gets the bitmap of supported capabilities
    pub fn capabilities(&self) -> u32 {
        self.capabilities
    }
}

impl<'a> OfpEchoRequest<'a> {
    /// Gets the message's content
    pub fn arbitrary(&self) -> &'a [u8] {
        self.arbitrary
    }
}

impl<'a> OfpMessage<'a> {
    /// Wraps a complete message. `bytes` has to start with the
    /// header and must be exactly as long as the header declares.
    pub fn new(header: OfpHeader, bytes: &'a [u8]) -> Result<OfpMessage<'a>> {
        if header.length() != bytes.len() || bytes.len() < OfpHeader::header_length() {
            return Err(Error::MalformedMessage("message length differs from header"));
        }
        Ok(OfpMessage { header, bytes })
    }

    /// The parsed header
    pub fn header(&self) -> &OfpHeader {
        &self.header
    }

    /// The known type of this message, if any
    pub fn typ(&self) -> Option<OfpType> {
        OfpType::from_u8(self.header.typ)
    }

    /// The whole message including its header
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The message without its header
    pub fn body(&self) -> &'a [u8] {
        &self.bytes[OfpHeader::header_length()..]
    }
}

/// One complete OpenFlow message inside a receive buffer.
/// It is only valid for the current read cycle.
#[derive(Debug, Clone, Copy)]
pub struct OfpMessage<'a> {
    header: OfpHeader,
    bytes: &'a [u8],
}

/// An OpenFlow Echo Request
#[derive(Debug)]
pub struct OfpEchoRequest<'a> {
    arbitrary: &'a [u8],
}

/// An OpenFlow Echo Reply
#[derive(Debug)]
pub struct OfpEchoReply<'a> {
    arbitrary: &'a [u8],
}

/// Requests the switch's `OfpSwitchFeatures`. It has no body.
#[derive(Debug)]
pub struct OfpFeaturesRequest;

/// Requests the switch's `OfpAsyncConfig`. It has no body.
#[derive(Debug)]
pub struct OfpGetAsyncRequest;

/// Asks the switch to finish all previously received messages before
/// answering. It has no body.
#[derive(Debug)]
pub struct OfpBarrierRequest;

/// A Hello message. Received Hellos carry the peer's version
/// bitmap, the Hello we send advertises `OFP_VERSION` only.
#[derive(Debug, PartialEq)]
pub struct OfpHello {
    /// Version from the header
    version: u8,
    /// Words of the version bitmap element, if the peer sent one
    bitmap: Option<Vec<u32>>,
}

/// Hello elements types.
pub enum OfpHelloElemType {
    /// Bitmap of version supported.
    VersionBitmap = 1,
}

/// An OpenFlow TLV (Type, Length, Value) for
/// the OpenFlow Extensible Match format
#[derive(Debug, Clone, PartialEq)]
pub struct OfpOxmTlv {
    /// Header class
    class: OfpOxmClass,
    /// Header field
    field: OxmOfbMatchFields,
    /// Header hasmask
    hasmask: bool,
    /// Body
    body: Vec<u8>,
}

/// Construction of an OXM TLV.
impl OfpOxmTlv {
    fn new(field: OxmOfbMatchFields, hasmask: bool, body: Vec<u8>) -> OfpOxmTlv {
        OfpOxmTlv {
            class: OfpOxmClass::OpenflowBasic,
            hasmask,
            field,
            body,
        }
    }

    /// Ethernet source address.
    /// Prereqs: None.
    /// Format: 48-bit Ethernet MAC address.
    pub fn new_eth_src(mac: MacAddr) -> OfpOxmTlv {
        OfpOxmTlv::new(OxmOfbMatchFields::EthSrc, false, mac.octets().to_vec())
    }

    /// Ethernet destination address.
    /// Prereqs: None.
    /// Format: 48-bit Ethernet MAC address.
    pub fn new_eth_dst(mac: MacAddr) -> OfpOxmTlv {
        OfpOxmTlv::new(OxmOfbMatchFields::EthDst, false, mac.octets().to_vec())
    }
}

/* Copyright (c) 2008 The Board of Trustees of The Leland Stanford Junior University
 * Copyright (c) 2011, 2012 Open Networking Foundation
 *
 * We are making the OpenFlow specification and associated documentation
 * (Software) available for public use and benefit with the expectation
 * that others will use, modify and enhance the Software and contribute
 * those enhancements back to the community. However, since we would
 * like to make the Software available for broadest use, with as few
 * restrictions as possible permission is hereby granted, free of
 * charge, to any person obtaining a copy of this Software to deal in
 * the Software under the copyrights without restriction, including
 * without limitation the rights to use, copy, modify, merge, publish,
 * distribute, sublicense, and/or sell copies of the Software, and to
 * permit persons to whom the Software is furnished to do so, subject to
 * the following conditions:
 *
 * The above copyright notice and this permission notice shall be
 * included in all copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
 * EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
 * MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
 * NONINFRINGEMENT.  IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
 * BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
 * ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
 * CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 *
 * The name and trademarks of copyright holder(s) may NOT be used in
 * advertising or publicity pertaining to the Software or any
 * derivatives without specific, written prior permission.
 */

/// Version number:
/// OpenFlow versions released: 0x01 = 1.0 ; 0x02 = 1.1 ; 0x03 = 1.2;
/// 0x04 = 1.3; 0x05 = 1.4.
///
/// The most significant bit in the version field is reserved and must be set to zero.
pub const OFP_VERSION: u8 = 0x05;

/// Official IANA registered port for OpenFlow.
pub const OFP_TCP_PORT: u16 = 6653;

/// All physical ports except input port.
pub const OFPP_ALL: u32 = 0xffff_fffc;
/// Send to controller.
pub const OFPP_CONTROLLER: u32 = 0xffff_fffd;
/// Special value used in some requests when no port is specified (i.e. wildcarded).
pub const OFPP_ANY: u32 = 0xffff_ffff;

/// Wildcard group used only for flow stats requests.
/// Selects all groups regardless of output group.
pub const OFPG_ANY: u32 = 0xffff_ffff;

/// Indicates that no buffering should be applied and the whole packet
/// is to be sent to the controller.
pub const OFPCML_NO_BUFFER: u16 = 0xffff;

/// A message's type, the most fundamental to
/// distinguish information between messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfpType {
    /* Immutable messages. */
    /// Symmetric message
    Hello = 0,
    /// Symmetric message
    Error = 1,
    /// Symmetric message
    EchoRequest = 2,
    /// Symmetric message
    EchoReply = 3,
    /// Symmetric message
    Experimenter = 4,

    /* Switch configuration messages. */
    /// Controller/switch message
    FeaturesRequest = 5,
    /// Controller/switch message
    FeaturesReply = 6,

    /* Asynchronous messages. */
    /// Async message
    PacketIn = 10,
    /// Async message
    FlowRemoved = 11,
    /// Async message
    PortStatus = 12,

    /* Controller command messages. */
    /// Controller/switch message
    PacketOut = 13,
    /// Controller/switch message
    FlowMod = 14,

    /* Multipart messages. */
    /// Controller/switch message
    MultipartRequest = 18,
    /// Controller/switch message
    MultipartReply = 19,

    /* Barrier messages. */
    /// Controller/switch message
    BarrierRequest = 20,
    /// Controller/switch message
    BarrierReply = 21,

    /* Controller role change request messages. */
    /// Controller/switch message
    RoleRequest = 24,
    /// Controller/switch message
    RoleReply = 25,

    /* Asynchronous message configuration. */
    /// Controller/switch message
    GetAsyncRequest = 26,
    /// Controller/switch message
    GetAsyncReply = 27,
    /// Controller/switch message
    SetAsync = 28,

    /// Async message
    RoleStatus = 30,
    /// Async message
    TableStatus = 31,

    /* Bundle operations. */
    /// Controller/switch message
    BundleControl = 33,
    /// Controller/switch message
    BundleAddMessage = 34,
}

impl OfpType {
    /// Maps a wire type code to a known `OfpType`
    pub fn from_u8(typ: u8) -> Option<OfpType> {
        use self::OfpType::*;
        let t = match typ {
            0 => Hello,
            1 => Error,
            2 => EchoRequest,
            3 => EchoReply,
            4 => Experimenter,
            5 => FeaturesRequest,
            6 => FeaturesReply,
            10 => PacketIn,
            11 => FlowRemoved,
            12 => PortStatus,
            13 => PacketOut,
            14 => FlowMod,
            18 => MultipartRequest,
            19 => MultipartReply,
            20 => BarrierRequest,
            21 => BarrierReply,
            24 => RoleRequest,
            25 => RoleReply,
            26 => GetAsyncRequest,
            27 => GetAsyncReply,
            28 => SetAsync,
            30 => RoleStatus,
            31 => TableStatus,
            33 => BundleControl,
            34 => BundleAddMessage,
            _ => return None,
        };
        Some(t)
    }
}

/// Header on all OpenFlow packets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OfpHeader {
    /// OFP_VERSION.
    version: u8,
    /// This packet's OfpType.
    typ: u8,
    /// This packet's length including this OfpHeader.
    length: u16,
    /// Transaction id associated with this packet.
    /// Replies use the same id as was in the request
    /// to facilitate pairing.
    xid: u32,
}

/// Switch features.
#[derive(Debug, PartialEq)]
pub struct OfpSwitchFeatures {
    /// Datapath unique ID. The lower 48-bits are for
    /// a MAC address, while the upper 16-bits are
    /// implementer-defined.
    datapath_id: u64,
    /// Max packets buffered at once.
    n_buffers: u32,
    /// Number of tables supported by datapath.
    n_tables: u8,
    /// Identify auxiliary connections
    auxiliary_id: u8,

    /* Features. */
    /// Bitmap of support OfpCapabilities.
    capabilities: u32,
    reserved: u32,
}

/* ## -------------------------- ## */
/* ## OpenFlow Extensible Match. ## */
/* ## -------------------------- ## */

/// The match type indicates the match structure (set of fields that compose the match) in use.
///
/// The match type is placed in the type field at the beginning
/// of all match structures. The "OpenFlow Extensible Match" type corresponds
/// to OXM TLV format described below and must be supported by all OpenFlow
/// switches. Extensions that define other match types may be published on the
/// ONF wiki. Support for extensions is optional.
pub enum OfpMatchType {
    /// OpenFlow Extensible Match
    Oxm = 1,
}

/// Fields to match against flows
#[derive(Debug, Clone, PartialEq)]
pub struct OfpMatch {
    /// One of OfpMatchType
    typ: u16,
    // length(): Length of OfpMatch (excluding padding)
    /* Followed by:
     *   - Exactly (length - 4) (possibly 0) bytes containing OXM TLVs, then
     *   - Exactly ((length + 7)/8*8 - length) (between 0 and 7) bytes of
     *     all-zero bytes
     * In summary, OfpMatch is padded as needed, to make its overall size
     * a multiple of 8, to preserve alignment in structures using it.
     */
    /// 0 or more OXM match fields
    oxm_fields: Vec<OfpOxmTlv>,
    // Zero bytes - see above for sizing
}

/// OXM Class IDs.
/// The high order bit differentiate reserved classes from member classes.
/// Classes 0x0000 to 0x7FFF are member classes, allocated by ONF.
/// Classes 0x8000 to 0xFFFE are reserved classes, reserved for standardisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpOxmClass {
    /// Basic class for OpenFlow
    OpenflowBasic = 0x8000,
}

/// OXM Flow match field types for OpenFlow basic class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OxmOfbMatchFields {
    /// Switch input port.
    InPort = 0,
    /// Switch physical input port.
    InPhyPort = 1,
    /// Metadata passed between tables.
    Metadata = 2,
    /// Ethernet destination address.
    EthDst = 3,
    /// Ethernet source address.
    EthSrc = 4,
    /// Ethernet frame type.
    EthType = 5,
    /// VLAN id.
    VlanVid = 6,
    /// VLAN priority.
    VlanPcp = 7,
    /// IP DSCP (6 bits in ToS field).
    IpDscp = 8,
    /// IP ECN (2 bits in ToS field).
    IpEcn = 9,
    /// IP protocol.
    IpProto = 10,
    /// IPv4 source address.
    Ipv4Src = 11,
    /// IPv4 destination address.
    Ipv4Dst = 12,
    /// TCP source port.
    TcpSrc = 13,
    /// TCP destination port.
    TcpDst = 14,
    /// UDP source port.
    UdpSrc = 15,
    /// UDP destination port.
    UdpDst = 16,
    /// SCTP source port.
    SctpSrc = 17,
    /// SCTP destination port.
    SctpDst = 18,
    /// ICMP type.
    Icmpv4Type = 19,
    /// ICMP code.
    Icmpv4Code = 20,
    /// ARP opcode.
    ArpOp = 21,
    /// ARP source IPv4 address.
    ArpSpa = 22,
    /// ARP target IPv4 address.
    ArpTpa = 23,
    /// ARP source hardware address.
    ArpSha = 24,
    /// ARP target hardware address.
    ArpTha = 25,
    /// IPv6 source address.
    Ipv6Src = 26,
    /// IPv6 destination address.
    Ipv6Dst = 27,
    /// IPv6 Flow Label
    Ipv6Flabel = 28,
    /// ICMPv6 type.
    Icmpv6Type = 29,
    /// ICMPv6 code.
    Icmpv6Code = 30,
    /// Target address for ND.
    Ipv6NdTarget = 31,
    /// Source link-layer for ND.
    Ipv6NdSll = 32,
    /// Target link-layer for ND.
    Ipv6NdTll = 33,
    /// MPLS label.
    MplsLabel = 34,
    /// MPLS TC.
    MplsTc = 35,
    /// MPLS BoS bit.
    MplsBos = 36,
    /// PBB I-SID.
    PbbIsid = 37,
    /// Logical Port Metadata.
    TunnelId = 38,
    /// IPv6 Extension Header pseudo-field
    Ipv6Exthdr = 39,
    /// PBB UCA header field.
    PbbUca = 41,
}

impl OxmOfbMatchFields {
    /// Maps a wire field code of the basic class to a known field
    pub fn from_u8(field: u8) -> Option<OxmOfbMatchFields> {
        use self::OxmOfbMatchFields::*;
        const FIELDS: [OxmOfbMatchFields; 40] = [
            InPort, InPhyPort, Metadata, EthDst, EthSrc, EthType, VlanVid, VlanPcp,
            IpDscp, IpEcn, IpProto, Ipv4Src, Ipv4Dst, TcpSrc, TcpDst, UdpSrc, UdpDst,
            SctpSrc, SctpDst, Icmpv4Type, Icmpv4Code, ArpOp, ArpSpa, ArpTpa, ArpSha,
            ArpTha, Ipv6Src, Ipv6Dst, Ipv6Flabel, Icmpv6Type, Icmpv6Code, Ipv6NdTarget,
            Ipv6NdSll, Ipv6NdTll, MplsLabel, MplsTc, MplsBos, PbbIsid, TunnelId, Ipv6Exthdr,
        ];
        match field {
            41 => Some(PbbUca),
            f => FIELDS.get(f as usize).cloned(),
        }
    }
}

/// Values for 'type' in `OfpErrorMsg`. These values are immutable: they will
/// not change in future versions of the protocol (although new values may be added).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpErrorType {
    /// Hello protocol failed.
    HelloFailed = 0,
    /// Request was not understood.
    BadRequest = 1,
    /// Error in action description.
    BadAction = 2,
    /// Error in instruction list.
    BadInstruction = 3,
    /// Error in match.
    BadMatch = 4,
    /// Problem modifying flow entry.
    FlowModFailed = 5,
    /// Switch config request failed.
    SwitchConfigFailed = 10,
    /// Controller Role request failed.
    RoleRequestFailed = 11,
    /// Error in table features.
    TableFeaturesFailed = 13,
    /// Some property is invalid.
    BadProperty = 14,
    /// Asynchronous config request failed.
    AsyncConfigFailed = 15,
    /// Bundle operation failed.
    BundleFailed = 17,
    /// Experimenter error messages.
    Experimenter = 0xffff,
}

impl OfpErrorType {
    /// Maps a wire error type to a known `OfpErrorType`
    pub fn from_u16(typ: u16) -> Option<OfpErrorType> {
        use self::OfpErrorType::*;
        let t = match typ {
            0 => HelloFailed,
            1 => BadRequest,
            2 => BadAction,
            3 => BadInstruction,
            4 => BadMatch,
            5 => FlowModFailed,
            10 => SwitchConfigFailed,
            11 => RoleRequestFailed,
            13 => TableFeaturesFailed,
            14 => BadProperty,
            15 => AsyncConfigFailed,
            17 => BundleFailed,
            0xffff => Experimenter,
            _ => return None,
        };
        Some(t)
    }
}

/// `OfpErrorMsg` 'code' values for `OfpErrorType::HelloFailed`.
///
/// 'data' contains an ASCII text string that may give failure details.
pub enum OfpHelloFailedCode {
    /// No compatible version.
    Incompatible = 0,
}

/// `OfpErrorMsg` 'code' values for `OfpErrorType::BadRequest`.
///
/// 'data' contains at least the first 64 bytes of the failed request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpBadRequestCode {
    /// ofp_header.version not supported.
    BadVersion = 0,
    /// ofp_header.type not supported.
    BadType = 1,
    /// Wrong request length for type.
    BadLen = 6,
}

/// `OfpErrorMsg` 'code' values for `OfpErrorType::FlowModFailed`.
///
/// 'data' contains at least the first 64 bytes of the failed request.
#[derive(Debug)]
pub enum OfpFlowModFailedCode {
    /// Flow not added because table was full.
    TableFull = 1,
}

/// Error message (datapath -> controller).
#[derive(Debug, PartialEq)]
pub struct OfpErrorMsg {
    typ: u16,
    code: u16,
    /// Variable-length data. Interpreted based on the type and code. No padding.
    data: Vec<u8>,
}

/* ## ----------------- ## */
/* ## OpenFlow Actions. ## */
/* ## ----------------- ## */

/// The type of an OpenFlow Action
pub enum OfpActionType {
    /// Output to switch port.
    Output = 0,
}

/// Action structure for `OfpActionType::Output`, which sends packets out 'port'.
///
/// A `max_len` of zero means no bytes of the packet should be sent to the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct OfpActionOutput {
    /// One of `OfpActionType::Output`.
    typ: u16,
    /// Length is 16. The length includes the header and
    /// any padding used to make the action 64-bit aligned.
    len: u16,
    /// Output port.
    port: u32,
    /// Max length to send to controller.
    max_len: u16,
}

#[cfg(test)]
impl OfpActionOutput {
    /// Gets the output port
    pub fn port(&self) -> u32 {
        self.port
    }
}

/* ## ---------------------- ## */
/* ## OpenFlow Instructions. ## */
/* ## ---------------------- ## */

/// The type of an OpenFlow Instruction
pub enum OfpInstructionType {
    /// Applies the action(s) immediately
    ApplyActions = 4,
}

/// Instruction structure for `OfpInstructionType::ApplyActions`
#[derive(Debug, Clone, PartialEq)]
pub struct OfpInstructionActions {
    /// One of `OfpInstructionType`
    typ: u16,
    // len: Length of this struct in bytes. The length includes the header
    // and any padding used to make the instruction 64-bit aligned.
    /// 0 or more actions associated with `OfpInstructionType::ApplyActions`
    actions: Vec<OfpActionOutput>,
}

#[cfg(test)]
impl OfpInstructionActions {
    /// Gets the instruction's actions
    pub fn actions(&self) -> &[OfpActionOutput] {
        &self.actions
    }
}

/* ## --------------------------- ## */
/* ## OpenFlow Flow Modification. ## */
/* ## --------------------------- ## */

/// The command that is embedded in a flow mod message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpFlowModCommand {
    /// New flow.
    Add = 0,
}

/// `OfpFlowMod` flag: send a flow removed message when the flow expires or is deleted.
pub const OFPFF_SEND_FLOW_REM: u16 = 1 << 0;

/// Why was this flow removed?
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpFlowRemovedReason {
    /// Flow idle time exceeded idle_timeout.
    IdleTimeout = 0,
    /// Time exceeded hard_timeout.
    HardTimeout = 1,
    /// Evicted by a DELETE flow mod.
    Delete = 2,
    /// Group was removed.
    GroupDelete = 3,
    /// Meter was removed.
    MeterDelete = 4,
    /// Server evicted flow to free space.
    Eviction = 5,
}

impl OfpFlowRemovedReason {
    /// Maps a wire reason to a known reason
    pub fn from_u8(reason: u8) -> Option<OfpFlowRemovedReason> {
        use self::OfpFlowRemovedReason::*;
        const REASONS: [OfpFlowRemovedReason; 6] =
            [IdleTimeout, HardTimeout, Delete, GroupDelete, MeterDelete, Eviction];
        REASONS.get(reason as usize).cloned()
    }
}

/// Value used in `idle_timeout` and `hard_timeout` to indicate that the entry is permanent.
pub const OFP_FLOW_PERMANENT: u16 = 0;

/// Flow setup and teardown (controller -> datapath).
#[derive(Debug, PartialEq)]
pub struct OfpFlowMod {
    /// Opaque controller-issued identifier.
    cookie: u64,
    /// Mask used to restrict the cookie bits
    /// that must match when the command is
    /// OfpFlowModCommand::Modify* or OfpFlowModCommand::Delete*.
    /// A value of 0 indicates no restriction.
    cookie_mask: u64,
    /// ID of the table to put the flow in.
    /// For OfpFlowModCommand::Delete* commands,
    /// OFPTT_ALL can also be used to delete
    /// matching flows from all tables.
    table_id: u8,
    /// One of OfpFlowModCommand.
    command: u8,
    /// Idle time before discarding (seconds).
    idle_timeout: u16,
    /// Max time before discarding (seconds).
    hard_timeout: u16,
    /// Priority level of flow entry.
    priority: u16,
    /// Buffered packet to apply to, or
    /// OFP_NO_BUFFER.
    /// Not meaningful for OfpFlowModCommand::Delete*.
    buffer_id: u32,
    /// For OfpFlowModCommand::Delete* commands, require
    /// matching entries to include this as an
    /// output port.  A value of OFPP_ANY
    /// indicates no restriction.
    out_port: u32,
    /// For OfpFlowModCommand::Delete* commands, require
    /// matching entries to include this as an
    /// output group.  A value of OFPG_ANY
    /// indicates no restriction.
    out_group: u32,
    /// Bitmap of OfpFlowModFlags.
    flags: u16,
    /// Eviction precedence (optional).
    importance: u16,
    /// Fields to match. Variable size.
    match_field: OfpMatch,

    /* The variable size and padded match is always followed by instructions. */
    /// Instruction set - 0 or more.
    /// The length of the instruction
    /// set is inferred from the
    /// length field in the header.
    instructions: Vec<OfpInstructionActions>,
}

#[cfg(test)]
impl OfpFlowMod {
    /// Gets the flow's cookie
    pub fn cookie(&self) -> u64 {
        self.cookie
    }
    /// Gets the flow's priority
    pub fn priority(&self) -> u16 {
        self.priority
    }
    /// Gets the flow's idle timeout in seconds
    pub fn idle_timeout(&self) -> u16 {
        self.idle_timeout
    }
    /// Gets the flow's match
    pub fn match_field(&self) -> &OfpMatch {
        &self.match_field
    }
    /// Gets the flow's instructions
    pub fn instructions(&self) -> &[OfpInstructionActions] {
        &self.instructions
    }
}

/// A reserved buffer ID to express that no buffer is assigned
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/* ## ------------------------- ## */
/* ## Packet-In and Packet-Out. ## */
/* ## ------------------------- ## */

/// Why is this packet being sent to the controller?
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpPacketInReason {
    /// No matching flow (table-miss flow entry).
    TableMiss = 0,
    /// Output to controller in apply-actions.
    ApplyAction = 1,
    /// Packet has invalid TTL
    InvalidTtl = 2,
    /// Output to controller in action set.
    ActionSet = 3,
    /// Output to controller in group bucket.
    Group = 4,
    /// Output to controller in packet-out.
    PacketOut = 5,
}

/// Packet received on port (datapath -> controller).
#[derive(Debug)]
pub struct OfpPacketIn<'a> {
    /// ID assigned by datapath.
    buffer_id: u32,
    /// Full length of frame.
    total_len: u16,
    /// Reason packet is being sent (one of OFPR_*)
    reason: u8,
    /// ID of the table that was looked up
    table_id: u8,
    /// Cookie of the flow entry that was looked up.
    cookie: u64,
    /// Packet metadata. Variable size.
    match_field: deserialize::MatchView<'a>,
    /// Ethernet frame
    data: &'a [u8],
}

impl<'a> OfpPacketIn<'a> {
    /// Gets the switch buffer id or `OFP_NO_BUFFER`
    pub fn buffer_id(&self) -> u32 {
        self.buffer_id
    }
    /// Gets the full length of the frame
    pub fn total_len(&self) -> u16 {
        self.total_len
    }
    /// Gets the numerical reason
    pub fn reason(&self) -> u8 {
        self.reason
    }
    /// Gets the table that was looked up
    pub fn table_id(&self) -> u8 {
        self.table_id
    }
    /// Gets the cookie of the flow entry that sent this packet
    pub fn cookie(&self) -> u64 {
        self.cookie
    }
    /// Gets the packet metadata
    pub fn match_field(&self) -> &deserialize::MatchView<'a> {
        &self.match_field
    }
    /// Gets the (possibly truncated) Ethernet frame
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

/// Send packet (controller -> datapath).
#[derive(Debug, PartialEq)]
pub struct OfpPacketOut<'a> {
    /// ID assigned by datapath (OFP_NO_BUFFER if none).
    buffer_id: u32,
    /// Packet's input port or OFPP_CONTROLLER.
    in_port: u32,
    /// Action list - 0 or more.
    actions: Vec<OfpActionOutput>,
    /// Packet data. Only meaningful if buffer_id == OFP_NO_BUFFER.
    data: &'a [u8],
}

/* ## ------------------------------------ ## */
/* ## Properties and property based bodies. ## */
/* ## ------------------------------------ ## */

/// Async Config property types.
/// Low order bit cleared indicates a property for the slave role.
/// Low order bit set indicates a property for the master/equal role.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpAsyncConfigPropType {
    /// Packet-in mask for slave.
    PacketInSlave = 0,
    /// Packet-in mask for master.
    PacketInMaster = 1,
    /// Port-status mask for slave.
    PortStatusSlave = 2,
    /// Port-status mask for master.
    PortStatusMaster = 3,
    /// Flow removed mask for slave.
    FlowRemovedSlave = 4,
    /// Flow removed mask for master.
    FlowRemovedMaster = 5,
    /// Role status mask for slave.
    RoleStatusSlave = 6,
    /// Role status mask for master.
    RoleStatusMaster = 7,
    /// Table status mask for slave.
    TableStatusSlave = 8,
    /// Table status mask for master.
    TableStatusMaster = 9,
    /// RequestForward mask for slave.
    RequestforwardSlave = 10,
    /// RequestForward mask for master.
    RequestforwardMaster = 11,
}

impl OfpAsyncConfigPropType {
    /// Maps a wire property type to a known reason-mask property
    pub fn from_u16(typ: u16) -> Option<OfpAsyncConfigPropType> {
        use self::OfpAsyncConfigPropType::*;
        const TYPES: [OfpAsyncConfigPropType; 12] = [
            PacketInSlave, PacketInMaster, PortStatusSlave, PortStatusMaster,
            FlowRemovedSlave, FlowRemovedMaster, RoleStatusSlave, RoleStatusMaster,
            TableStatusSlave, TableStatusMaster, RequestforwardSlave, RequestforwardMaster,
        ];
        TYPES.get(typ as usize).cloned()
    }
}

/// Asynchronous message configuration.
///
/// Every mask is indexed by role, `[slave, master]`.
/// A mask that was not announced by the switch stays `None`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OfpAsyncConfig {
    /// Bitmasks of OFPR_* values.
    packet_in_mask: [Option<u32>; 2],
    /// Bitmasks of OFPPR_* values.
    port_status_mask: [Option<u32>; 2],
    /// Bitmasks of OFPRR_* values.
    flow_removed_mask: [Option<u32>; 2],
    /// Bitmasks of OFPCRR_* values.
    role_status_mask: [Option<u32>; 2],
    /// Bitmasks of OFPTR_* values.
    table_status_mask: [Option<u32>; 2],
    /// Bitmasks of OFPRFR_* values.
    requestforward_mask: [Option<u32>; 2],
}

impl OfpAsyncConfig {
    /// The packet-in reasons delivered to a master controller
    pub fn packet_in_master(&self) -> Option<u32> {
        self.packet_in_mask[1]
    }
    /// The flow removed reasons delivered to a master controller
    pub fn flow_removed_master(&self) -> Option<u32> {
        self.flow_removed_mask[1]
    }
}

/// Multipart message types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpMultipartType {
    /// Table features.
    TableFeatures = 12,
}

/// A Multipart request without a body
#[derive(Debug, PartialEq)]
pub struct OfpMultipartRequest {
    /// One of the OFPMP_* constants.
    typ: u16,
    /// OFPMPF_REQ_* flags.
    flags: u16,
}

/// Table Feature property types.
/// Low order bit cleared indicates a property for a regular Flow Entry.
/// Low order bit set indicates a property for the Table-Miss Flow Entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpTableFeaturePropType {
    /// Instructions property.
    Instructions = 0,
    /// Instructions for table-miss.
    InstructionsMiss = 1,
    /// Next Table property.
    NextTables = 2,
    /// Next Table for table-miss.
    NextTablesMiss = 3,
    /// Write Actions property.
    WriteActions = 4,
    /// Write Actions for table-miss.
    WriteActionsMiss = 5,
    /// Apply Actions property.
    ApplyActions = 6,
    /// Apply Actions for table-miss.
    ApplyActionsMiss = 7,
    /// Match property.
    Match = 8,
    /// Wildcards property.
    Wildcards = 10,
    /// Write Set-Field property.
    WriteSetfield = 12,
    /// Write Set-Field for table-miss.
    WriteSetfieldMiss = 13,
    /// Apply Set-Field property.
    ApplySetfield = 14,
    /// Apply Set-Field for table-miss.
    ApplySetfieldMiss = 15,
    /// Experimenter property.
    Experimenter = 0xfffe,
    /// Experimenter for table-miss.
    ExperimenterMiss = 0xffff,
}

impl OfpTableFeaturePropType {
    /// Maps a wire property type to a known table feature property
    pub fn from_u16(typ: u16) -> Option<OfpTableFeaturePropType> {
        use self::OfpTableFeaturePropType::*;
        let t = match typ {
            0 => Instructions,
            1 => InstructionsMiss,
            2 => NextTables,
            3 => NextTablesMiss,
            4 => WriteActions,
            5 => WriteActionsMiss,
            6 => ApplyActions,
            7 => ApplyActionsMiss,
            8 => Match,
            10 => Wildcards,
            12 => WriteSetfield,
            13 => WriteSetfieldMiss,
            14 => ApplySetfield,
            15 => ApplySetfieldMiss,
            0xfffe => Experimenter,
            0xffff => ExperimenterMiss,
            _ => return None,
        };
        Some(t)
    }
}

/// Controller roles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpControllerRole {
    /// Don't change current role.
    NoChange = 0,
    /// Default role, full access.
    Equal = 1,
    /// Full access, at most one master.
    Master = 2,
    /// Read-only access.
    Slave = 3,
}

impl OfpControllerRole {
    /// Maps a wire role to a known role
    pub fn from_u32(role: u32) -> Option<OfpControllerRole> {
        use self::OfpControllerRole::*;
        match role {
            0 => Some(NoChange),
            1 => Some(Equal),
            2 => Some(Master),
            3 => Some(Slave),
            _ => None,
        }
    }
}

/// Bundle control message types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpBundleCtrlType {
    /// Open a bundle.
    OpenRequest = 0,
    /// Bundle opened.
    OpenReply = 1,
    /// Close a bundle.
    CloseRequest = 2,
    /// Bundle closed.
    CloseReply = 3,
    /// Commit a bundle.
    CommitRequest = 4,
    /// Bundle committed.
    CommitReply = 5,
    /// Discard a bundle.
    DiscardRequest = 6,
    /// Bundle discarded.
    DiscardReply = 7,
}

impl OfpBundleCtrlType {
    /// Maps a wire bundle control type to a known type
    pub fn from_u16(typ: u16) -> Option<OfpBundleCtrlType> {
        use self::OfpBundleCtrlType::*;
        const TYPES: [OfpBundleCtrlType; 8] = [
            OpenRequest, OpenReply, CloseRequest, CloseReply,
            CommitRequest, CommitReply, DiscardRequest, DiscardReply,
        ];
        TYPES.get(typ as usize).cloned()
    }
}

/// What changed about the physical port
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpPortReason {
    /// The port was added.
    Add = 0,
    /// The port was removed.
    Delete = 1,
    /// Some attribute of the port has changed.
    Modify = 2,
}

impl OfpPortReason {
    /// Maps a wire port reason to a known reason
    pub fn from_u8(reason: u8) -> Option<OfpPortReason> {
        match reason {
            0 => Some(OfpPortReason::Add),
            1 => Some(OfpPortReason::Delete),
            2 => Some(OfpPortReason::Modify),
            _ => None,
        }
    }
}

/// Port is administratively down.
pub const OFPPC_PORT_DOWN: u32 = 1 << 0;

/// Current state of the physical port. Bit set if no physical link present.
pub const OFPPS_LINK_DOWN: u32 = 1 << 0;

/// Port description property types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpPortDescPropType {
    /// Ethernet property.
    Ethernet = 0,
    /// Optical property.
    Optical = 1,
    /// Experimenter property.
    Experimenter = 0xffff,
}

impl OfpPortDescPropType {
    pub fn from_u16(typ: u16) -> Option<OfpPortDescPropType> {
        match typ {
            0 => Some(OfpPortDescPropType::Ethernet),
            1 => Some(OfpPortDescPropType::Optical),
            0xffff => Some(OfpPortDescPropType::Experimenter),
            _ => None,
        }
    }
}

/// The only property type defined for role status and bundle property lists
pub const OFP_EXPERIMENTER_PROP_TYPE: u16 = 0xffff;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes() {
        assert_eq!(Some(OfpType::PacketIn), OfpType::from_u8(10));
        assert_eq!(Some(OfpType::GetAsyncReply), OfpType::from_u8(27));
        assert_eq!(None, OfpType::from_u8(22));
        assert_eq!(None, OfpType::from_u8(0xff));
    }

    #[test]
    fn oxm_field_codes() {
        assert_eq!(Some(OxmOfbMatchFields::EthSrc), OxmOfbMatchFields::from_u8(4));
        assert_eq!(Some(OxmOfbMatchFields::Ipv6Exthdr), OxmOfbMatchFields::from_u8(39));
        assert_eq!(None, OxmOfbMatchFields::from_u8(40));
        assert_eq!(Some(OxmOfbMatchFields::PbbUca), OxmOfbMatchFields::from_u8(41));
        assert_eq!(None, OxmOfbMatchFields::from_u8(42));
    }

    #[test]
    fn bad_request_data_is_truncated() {
        let msg = vec![7; 100];
        let err = OfpErrorMsg::new_bad_request(OfpBadRequestCode::BadType, &msg);
        assert_eq!(64, err.data.len());
        let short = OfpErrorMsg::new_bad_request(OfpBadRequestCode::BadType, &msg[..10]);
        assert_eq!(10, short.data.len());
    }

    #[test]
    fn error_display() {
        let err = OfpErrorMsg::new_hello_failed();
        assert_eq!("OpenFlow Error: HelloFailed, code(0)", err.to_string());
        let unknown = OfpErrorMsg { typ: 99, code: 3, data: vec![] };
        assert_eq!("OpenFlow Error: type(99), code(3)", unknown.to_string());
    }
}
