/*!
Implements an OpenFlow Controller with protocol version 0x05 (OpenFlow 1.4) compatibility.
Every connected switch gets its own `OfSession` that runs the handshake
and turns the switch into a MAC learning bridge: a table-miss flow sends
unknown traffic to the controller, which learns the source addresses and
installs flows for host pairs whose ports are both known.
*/

pub mod buffer_pool;
pub mod error;
pub mod framing;
pub mod messages;
pub mod write_channel;

use crate::bridge::{LearningBridge, Verdict};
use crate::conf::Config;
use crate::openflow::buffer_pool::BufferPool;
use crate::openflow::error::{Error, Result};
use crate::openflow::framing::Framer;
use crate::openflow::messages::deserialize::*;
use crate::openflow::messages::serialize::OfpPacket;
use crate::openflow::messages::*;
use crate::openflow::write_channel::WriteChannel;
use crate::packet::{EthernetFrame, MacAddr};

use std::io;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Cookie of the table-miss flow that sends unmatched packets to the controller
pub const TABLE_MISS_COOKIE: u64 = 0x1;
/// Cookie of the flows installed between two learned hosts
pub const LEARNED_FLOW_COOKIE: u64 = 0x2;

/// The table-miss flow has to lose against every other flow
const TABLE_MISS_PRIORITY: u16 = 0;

const MAX_MESSAGE_LENGTH: usize = 0xffff;

/// Hands out transaction ids for requests, shared by all sessions
#[derive(Debug)]
pub struct XidGenerator {
    next: AtomicU32,
}

impl XidGenerator {
    /// Creates a generator with a random first xid
    pub fn new() -> XidGenerator {
        XidGenerator::starting_at(rand::random())
    }

    pub fn starting_at(xid: u32) -> XidGenerator {
        XidGenerator {
            next: AtomicU32::new(xid),
        }
    }

    /// Returns the next xid, wrapping around after `u32::MAX`
    pub fn next(&self) -> u32 {
        let xid = self.next.fetch_add(1, Ordering::Relaxed);
        trace!("Using xid {} for the outgoing message", xid);
        xid
    }
}

impl Default for XidGenerator {
    fn default() -> Self {
        XidGenerator::new()
    }
}

/// Progress of the handshake. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum SessionState {
    /// Waiting for the switch's Hello
    Start,
    /// Versions agreed, waiting for the Features Reply
    FeaturesRequested,
    /// Table-miss flow sent, waiting for the Get Async Reply
    AsyncConfigRequested,
    /// Handshake done
    Operating,
}

/// The controller side of one switch connection.
/// Use the run function to serve a TCP connection.
pub struct OfSession<'a, W: Write> {
    conf: &'a Config,
    xids: &'a XidGenerator,
    channel: Arc<WriteChannel<W>>,
    bridge: LearningBridge,
    state: SessionState,
    datapath_id: Option<u64>,
}

impl<'a, W: Write> OfSession<'a, W> {
    pub fn new(
        conf: &'a Config,
        xids: &'a XidGenerator,
        channel: Arc<WriteChannel<W>>,
    ) -> OfSession<'a, W> {
        OfSession {
            conf,
            xids,
            channel,
            bridge: LearningBridge::new(),
            state: SessionState::Start,
            datapath_id: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The datapath id the switch announced in its Features Reply
    pub fn datapath_id(&self) -> Option<u64> {
        self.datapath_id
    }

    pub fn bridge(&self) -> &LearningBridge {
        &self.bridge
    }

    /// Builds `packet` in a pooled buffer and hands it to the write channel
    fn send<P: OfpPacket>(&self, packet: &P, xid: u32) -> Result<()> {
        let mut buf = self.channel.pool().acquire();
        packet.serialize(&mut buf, xid);
        self.channel.enqueue(buf)?;
        Ok(())
    }

    fn send_table_miss_flow_mod(&self) -> Result<()> {
        let output = OfpActionOutput::new_to_controller();
        let instr = vec![OfpInstructionActions::new(vec![output])];
        let flow_mod = OfpFlowMod::new(
            OfpFlowModCommand::Add,
            TABLE_MISS_COOKIE,
            self.conf.table.id,
            TABLE_MISS_PRIORITY,
            OfpMatch::new(),
            instr,
        );
        trace!("Outgoing message: {:?}", flow_mod);
        self.send(&flow_mod, self.xids.next())
    }

    /// Installs the flow for frames from `src` to `dst`
    fn send_learned_flow_mod(&self, src: MacAddr, dst: MacAddr, out_port: u32) -> Result<()> {
        let mut match_field = OfpMatch::new();
        match_field
            .add_tlv(OfpOxmTlv::new_eth_src(src))
            .add_tlv(OfpOxmTlv::new_eth_dst(dst));

        let output = OfpActionOutput::new(out_port);
        let instr = vec![OfpInstructionActions::new(vec![output])];

        let flows = &self.conf.flows;
        let flow_mod = OfpFlowMod::new(
            OfpFlowModCommand::Add,
            LEARNED_FLOW_COOKIE,
            self.conf.table.id,
            flows.priority,
            match_field,
            instr,
        )
        .timeouts(flows.idle_timeout, flows.hard_timeout)
        .flags(OFPFF_SEND_FLOW_REM);

        debug!("Installing flow {} > {} via port {}", src, dst, out_port);
        trace!("Outgoing message: {:?}", flow_mod);
        self.send(&flow_mod, self.xids.next())
    }

    fn send_packet_out(&self, packet_in: &OfpPacketIn, in_port: u32, out_port: u32) -> Result<()> {
        let output = OfpActionOutput::new(out_port);
        let packet_out =
            OfpPacketOut::new(packet_in.buffer_id(), in_port, vec![output], packet_in.data());
        if packet_out.length() > MAX_MESSAGE_LENGTH {
            warn!(
                "Cannot send a {} byte frame back to the switch, the Packet Out would be too large",
                packet_in.data().len()
            );
            return Ok(());
        }
        self.send(&packet_out, self.xids.next())
    }

    fn handle_hello(&mut self, header: &OfpHeader, body: &[u8]) -> Result<()> {
        if self.state != SessionState::Start {
            warn!("Ignoring repeated Hello");
            return Ok(());
        }
        let hello = OfpHello::deserialize(header.version(), body)?;
        let version = hello.negotiate()?;
        debug!("Negotiated OpenFlow wire version {:#x}", version);

        self.send(&OfpHello::new(), self.xids.next())?;
        self.send(&OfpFeaturesRequest, self.xids.next())?;
        self.state = SessionState::FeaturesRequested;
        Ok(())
    }

    fn handle_features_reply(&mut self, body: &[u8]) -> Result<()> {
        let features = OfpSwitchFeatures::deserialize(body)?;
        let datapath_id = features.datapath_id();
        info!(
            "The connected switch identified itself with datapath id {:#018x}",
            datapath_id
        );
        debug!(
            "The switch has {} tables and {} buffers, capabilities {:#x}",
            features.n_tables(),
            features.n_buffers(),
            features.capabilities()
        );
        self.datapath_id = Some(datapath_id);
        if self.state != SessionState::FeaturesRequested {
            debug!("Ignoring unsolicited Features Reply");
            return Ok(());
        }

        self.send(&OfpGetAsyncRequest, self.xids.next())?;
        self.send_table_miss_flow_mod()?;
        self.send(&OfpBarrierRequest, self.xids.next())?;
        self.state = SessionState::AsyncConfigRequested;
        Ok(())
    }

    fn handle_async_reply(&mut self, body: &[u8]) -> Result<()> {
        let async_conf = OfpAsyncConfig::deserialize(body)?;
        debug!("The switch's async config: {:?}", async_conf);
        if async_conf.flow_removed_master().map_or(true, |mask| mask == 0) {
            debug!("The switch will not report removed flows");
        }
        if self.state != SessionState::AsyncConfigRequested {
            return Ok(());
        }

        let table_miss = 1 << OfpPacketInReason::TableMiss as u32;
        let apply_action = 1 << OfpPacketInReason::ApplyAction as u32;
        match async_conf.packet_in_master() {
            Some(mask) if mask & table_miss != 0 => {}
            mask => {
                info!("Subscribing to table-miss Packet Ins");
                let mut set_async = OfpAsyncConfig::default();
                set_async.set_packet_in_master(mask.unwrap_or(0) | table_miss | apply_action);
                self.send(&set_async, self.xids.next())?;
            }
        }

        self.state = SessionState::Operating;
        info!("Handshake done, the switch is operating as a learning bridge");
        if self.conf.session.table_features {
            self.send(&OfpMultipartRequest::new_table_features(), self.xids.next())?;
        }
        Ok(())
    }

    fn handle_packet_in(&mut self, body: &[u8]) -> Result<()> {
        let packet_in = OfpPacketIn::deserialize(body)?;
        if packet_in.cookie() != TABLE_MISS_COOKIE {
            return Err(Error::UnhandledFlowCookie(packet_in.cookie()));
        }
        let in_port = match packet_in.match_field().in_port() {
            Some(port) => port,
            None => return Err(Error::UnhandledFlowCookie(packet_in.cookie())),
        };
        let frame = match EthernetFrame::parse(packet_in.data()) {
            Some(frame) => frame,
            None => {
                debug!("Dropping {} byte frame from port {}", packet_in.data().len(), in_port);
                return Ok(());
            }
        };
        let (src, dst) = (frame.src_mac(), frame.dst_mac());
        trace!(
            "Packet In from table {}, reason {:?}, {} of {} bytes",
            packet_in.table_id(),
            packet_in.known_reason(),
            packet_in.data().len(),
            packet_in.total_len()
        );
        match frame.vlan_id() {
            Some(vlan) => trace!(
                "{} > {} on port {} vlan {}: {}",
                src,
                dst,
                in_port,
                vlan,
                frame.network()
            ),
            None => trace!("{} > {} on port {}: {}", src, dst, in_port, frame.network()),
        }

        match self.bridge.decide(in_port, src, dst) {
            Verdict::Drop => {
                trace!("Dropping frame {} > {}", src, dst);
                Ok(())
            }
            Verdict::Flood => {
                if !dst.is_broadcast() {
                    trace!("{} is unknown, flooding", dst);
                }
                self.send_packet_out(&packet_in, in_port, OFPP_ALL)
            }
            Verdict::Directed { port } => {
                if let Some((hits, last_seen)) = self.bridge.stats(dst) {
                    debug!(
                        "Connecting {} and {}, the latter sent {} frames, the last one {:?} ago",
                        src,
                        dst,
                        hits,
                        last_seen.elapsed()
                    );
                }
                self.send_learned_flow_mod(src, dst, port)?;
                self.send_learned_flow_mod(dst, src, in_port)?;
                self.send_packet_out(&packet_in, in_port, port)
            }
        }
    }

    fn handle_error_msg(&self, body: &[u8]) -> Result<()> {
        let error = OfpErrorMsg::deserialize(body)?;
        if error.check_table_full() {
            error!(
                "Table {} does not have enough free memory for a new Flow. {}",
                self.conf.table.id, error
            );
        }
        else {
            error!("Unexpected {}", error);
        }
        if let Some(header) = error.failed_header() {
            debug!("The failed request: {:?}", header);
        }
        Ok(())
    }

    fn handle_port_status(&self, body: &[u8]) -> Result<()> {
        let status = OfpPortStatus::deserialize(body)?;
        info!(
            "Port {} ({}, {}) {:?}, link {}{}",
            status.port_no(),
            status.name(),
            status.hw_addr(),
            status.reason(),
            if status.link_down() { "down" } else { "up" },
            if status.admin_down() { ", disabled" } else { "" }
        );
        for prop in status.properties() {
            let prop = prop?;
            match OfpPortDescPropType::from_u16(prop.typ()) {
                Some(typ) => trace!("Port {} has a {:?} property", status.port_no(), typ),
                None => trace!("Skipping port property of unknown type {}", prop.typ()),
            }
        }
        Ok(())
    }

    fn handle_flow_removed(&self, body: &[u8]) -> Result<()> {
        let removed = OfpFlowRemoved::deserialize(body)?;
        debug!(
            "Flow with cookie {:#x} removed ({:?}) after {}s, {} packets, {} bytes",
            removed.cookie(),
            removed.reason(),
            removed.duration_sec(),
            removed.packet_count(),
            removed.byte_count()
        );
        Ok(())
    }

    fn handle_multipart_reply(&self, body: &[u8]) -> Result<()> {
        let reply = OfpMultipartReply::deserialize(body)?;
        if reply.typ() != OfpMultipartType::TableFeatures as u16 {
            debug!("Ignoring Multipart Reply of type {}", reply.typ());
            return Ok(());
        }
        for table in reply.table_features() {
            let table = table?;
            info!(
                "Table {} '{}' holds up to {} flows",
                table.table_id(),
                table.name(),
                table.max_entries()
            );
            for prop in table.properties() {
                let prop = prop?;
                match OfpTableFeaturePropType::from_u16(prop.typ()) {
                    Some(typ) => debug!(
                        "Table {} feature {:?}, {} bytes",
                        table.table_id(),
                        typ,
                        prop.length()
                    ),
                    None => trace!("Skipping table feature of unknown type {}", prop.typ()),
                }
            }
        }
        if reply.has_more() {
            debug!("More table features will follow");
        }
        Ok(())
    }

    fn handle_role_status(&self, body: &[u8]) -> Result<()> {
        let status = OfpRoleStatus::deserialize(body)?;
        info!(
            "The controller role changed to {:?} (reason {}, generation {})",
            status.role(),
            status.reason(),
            status.generation_id()
        );
        trace_experimenter_properties(status.properties())
    }

    fn handle_bundle_ctrl(&self, body: &[u8]) -> Result<()> {
        let ctrl = OfpBundleCtrl::deserialize(body)?;
        debug!(
            "Bundle {} control {:?}, flags {:#x}",
            ctrl.bundle_id(),
            ctrl.typ(),
            ctrl.flags()
        );
        trace_experimenter_properties(ctrl.properties())
    }

    /// Dispatches one complete message
    fn handle_ofp_message(&mut self, msg: &OfpMessage) -> Result<()> {
        let header = msg.header();
        debug!("Incoming message: {:?}", header);

        let body = msg.body();
        match msg.typ() {
            Some(OfpType::Hello) => return self.handle_hello(header, body),
            Some(OfpType::EchoRequest) => {
                // The EchoReply takes the same body byte stream as the EchoRequest
                let req = OfpEchoRequest::deserialize(body)?;
                return self.send(&OfpEchoReply::new(req.arbitrary()), header.xid());
            }
            Some(OfpType::Error) => {
                // Never answered, in any state and with any version
                if let Err(e) = self.handle_error_msg(body) {
                    warn!("Unreadable error message from the switch: {}", e);
                }
                return Ok(());
            }
            _ => {}
        }
        if self.state == SessionState::Start || header.version() != OFP_VERSION {
            return Err(Error::BadVersion(header.version()));
        }

        match msg.typ() {
            Some(OfpType::FeaturesReply) => self.handle_features_reply(body),
            Some(OfpType::GetAsyncReply) => self.handle_async_reply(body),
            Some(OfpType::PacketIn) => self.handle_packet_in(body),
            Some(OfpType::PortStatus) => self.handle_port_status(body),
            Some(OfpType::FlowRemoved) => self.handle_flow_removed(body),
            Some(OfpType::MultipartReply) => self.handle_multipart_reply(body),
            Some(OfpType::RoleStatus) => self.handle_role_status(body),
            Some(OfpType::BundleControl) => self.handle_bundle_ctrl(body),
            Some(OfpType::BarrierReply) => {
                debug!("The switch finished all requests up to xid {}", header.xid());
                Ok(())
            }
            Some(OfpType::EchoReply) => Ok(()),
            _ => Err(Error::UnhandledMessageType(header.typ())),
        }
    }

    /// Answers an error raised while handling `msg`.
    /// Returns the error again if the session has to be closed.
    fn handle_of_errors(&self, error: Error, msg: &OfpMessage) -> Result<()> {
        let reply = match error {
            Error::Io(_) => None,
            Error::ProtocolMismatch(_) => {
                error!("{}", error);
                Some(OfpErrorMsg::new_hello_failed())
            }
            Error::MalformedMessage(_) => {
                error!("{}", error);
                Some(OfpErrorMsg::new_bad_request(OfpBadRequestCode::BadLen, msg.bytes()))
            }
            Error::UnhandledFlowCookie(_) => {
                warn!("{}", error);
                None
            }
            Error::UnhandledMessageType(_) => {
                debug!("{}. Full message: {:?}", error, msg.bytes());
                Some(OfpErrorMsg::new_bad_request(OfpBadRequestCode::BadType, msg.bytes()))
            }
            Error::BadVersion(_) => {
                warn!("{} in state {:?}", error, self.state);
                Some(OfpErrorMsg::new_bad_request(OfpBadRequestCode::BadVersion, msg.bytes()))
            }
        };
        if let Some(err_msg) = reply {
            debug!("Outgoing error message: {:?}", err_msg);
            self.send(&err_msg, msg.header().xid())?;
        }
        if error.is_fatal() {
            Err(error)
        }
        else {
            Ok(())
        }
    }

    /// Handles one message including its errors
    pub fn process(&mut self, msg: OfpMessage) -> Result<()> {
        match self.handle_ofp_message(&msg) {
            Ok(()) => Ok(()),
            Err(e) => self.handle_of_errors(e, &msg),
        }
    }

    /// Reads and handles messages until the stream ends or a fatal error occurs.
    /// All pooled buffers used for reading are released before returning.
    pub fn serve<R: Read>(&mut self, mut reader: R) -> Result<()> {
        let pool = self.channel.pool().clone();
        let mut framer = Framer::new(&pool);
        let mut buf = pool.acquire();
        let result = loop {
            match buf.read_from(&mut reader) {
                Ok(0) => {
                    debug!("The switch closed the connection");
                    break Ok(());
                }
                Ok(n) => {
                    trace!("Read {} bytes", n);
                    if let Err(e) = framer.process(&buf, |msg| self.process(msg)) {
                        break Err(e);
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break Err(Error::Io(e)),
            }
        };
        framer.close(&pool);
        pool.release(buf);
        result
    }
}

/// Walks a property list that only knows experimenter properties
fn trace_experimenter_properties(properties: PropertyIter<'_>) -> Result<()> {
    for prop in properties {
        let prop = prop?;
        if prop.typ() == OFP_EXPERIMENTER_PROP_TYPE {
            trace!("Skipping experimenter property of {} bytes", prop.length());
        }
        else {
            trace!("Skipping property of unknown type {}", prop.typ());
        }
    }
    Ok(())
}

impl OfSession<'_, TcpStream> {
    /// Serves an accepted switch connection until it is closed.
    /// Is an implicit factory for OfSession instances.
    pub fn run(
        stream: TcpStream,
        conf: &Config,
        pool: &Arc<BufferPool>,
        xids: &XidGenerator,
    ) -> Result<()> {
        let peer = stream.peer_addr()?;
        info!("Connection from {}", peer);

        let channel = Arc::new(WriteChannel::new(stream.try_clone()?, pool.clone()));
        let mut session = OfSession::new(conf, xids, channel.clone());
        let result = session.serve(stream);

        if channel.is_poisoned() {
            warn!("Not all messages could be written to {}", peer);
        }
        if let Err(e) = channel.with_sink(|s| s.shutdown(Shutdown::Both)) {
            debug!("Shutting down the connection to {} failed: {}", peer, e);
        }
        info!(
            "Connection to {} closed, {} hosts were learned",
            peer,
            session.bridge().len()
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openflow::framing::Frames;
    use crate::packet::tests::frame;
    use std::collections::VecDeque;

    const HOST_1: [u8; 6] = [2, 0, 0, 0, 0, 1];
    const HOST_2: [u8; 6] = [2, 0, 0, 0, 0, 2];

    fn message(typ: u8, xid: u32, body: &[u8]) -> Vec<u8> {
        let len = 8 + body.len();
        let mut m = vec![OFP_VERSION, typ, (len >> 8) as u8, len as u8];
        m.extend_from_slice(&xid.to_be_bytes());
        m.extend_from_slice(body);
        m
    }

    fn hello() -> Vec<u8> {
        // version bitmap element with the 1.4 bit
        message(OfpType::Hello as u8, 1, &[0, 1, 0, 8, 0, 0, 0, 0x20])
    }

    fn features_reply() -> Vec<u8> {
        let mut body = vec![0, 0, 0, 0, 0, 0, 0, 0x2a];
        body.extend_from_slice(&[0, 0, 1, 0, 254, 0, 0, 0]);
        body.extend_from_slice(&[0, 0, 0, 0x4f, 0, 0, 0, 0]);
        message(OfpType::FeaturesReply as u8, 2, &body)
    }

    fn async_reply(packet_in_master: u32) -> Vec<u8> {
        let mut body = vec![0, 1, 0, 8];
        body.extend_from_slice(&packet_in_master.to_be_bytes());
        message(OfpType::GetAsyncReply as u8, 3, &body)
    }

    fn packet_in(cookie: u64, in_port: u32, data: &[u8]) -> Vec<u8> {
        let mut body = OFP_NO_BUFFER.to_be_bytes().to_vec();
        body.extend_from_slice(&(data.len() as u16).to_be_bytes());
        body.extend_from_slice(&[0, 0]);
        body.extend_from_slice(&cookie.to_be_bytes());
        body.extend_from_slice(&[0, 1, 0, 12, 0x80, 0, 0, 4]);
        body.extend_from_slice(&in_port.to_be_bytes());
        body.extend_from_slice(&[0; 4 + 2]);
        body.extend_from_slice(data);
        message(OfpType::PacketIn as u8, 0, &body)
    }

    fn arp(src: [u8; 6], dst: [u8; 6]) -> Vec<u8> {
        frame(dst, src, 0x0806, &[0; 28])
    }

    /// The messages the session wrote as (type, xid, body), clearing the sink
    fn sent(session: &OfSession<Vec<u8>>) -> Vec<(u8, u32, Vec<u8>)> {
        session.channel.with_sink(|out| {
            let msgs = Frames::new(&out[..])
                .map(|m| m.unwrap())
                .map(|m| (m.header().typ(), m.header().xid(), m.body().to_vec()))
                .collect();
            out.clear();
            msgs
        })
    }

    /// Hands out one scripted result per read, then the end of the stream
    struct ScriptedReader {
        reads: VecDeque<io::Result<Vec<u8>>>,
    }

    impl ScriptedReader {
        fn new(reads: Vec<io::Result<Vec<u8>>>) -> ScriptedReader {
            ScriptedReader {
                reads: reads.into_iter().collect(),
            }
        }
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    fn types(msgs: &[(u8, u32, Vec<u8>)]) -> Vec<u8> {
        msgs.iter().map(|m| m.0).collect()
    }

    fn new_session<'a>(conf: &'a Config, xids: &'a XidGenerator) -> OfSession<'a, Vec<u8>> {
        let pool = Arc::new(BufferPool::new(4));
        OfSession::new(conf, xids, Arc::new(WriteChannel::new(vec![], pool)))
    }

    fn operating<'a>(conf: &'a Config, xids: &'a XidGenerator) -> OfSession<'a, Vec<u8>> {
        let mut session = new_session(conf, xids);
        let mut input = hello();
        input.extend(features_reply());
        input.extend(async_reply(0b11));
        session.serve(&input[..]).unwrap();
        assert_eq!(SessionState::Operating, session.state());
        sent(&session);
        session
    }

    #[test]
    fn xids_increase() {
        let xids = XidGenerator::starting_at(u32::max_value());
        assert_eq!(u32::max_value(), xids.next());
        assert_eq!(0, xids.next());
        assert_eq!(1, xids.next());
    }

    #[test]
    fn handshake() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(100);
        let mut session = new_session(&conf, &xids);

        session.serve(&hello()[..]).unwrap();
        assert_eq!(SessionState::FeaturesRequested, session.state());
        let out = sent(&session);
        assert_eq!(
            vec![OfpType::Hello as u8, OfpType::FeaturesRequest as u8],
            types(&out)
        );
        assert_eq!(vec![0, 1, 0, 8, 0, 0, 0, 0x20], out[0].2);
        assert_eq!((100, 101), (out[0].1, out[1].1));

        session.serve(&features_reply()[..]).unwrap();
        assert_eq!(SessionState::AsyncConfigRequested, session.state());
        assert_eq!(Some(0x2a), session.datapath_id());
        let out = sent(&session);
        assert_eq!(
            vec![
                OfpType::GetAsyncRequest as u8,
                OfpType::FlowMod as u8,
                OfpType::BarrierRequest as u8
            ],
            types(&out)
        );
        let table_miss = OfpFlowMod::deserialize(&out[1].2).unwrap();
        assert_eq!(TABLE_MISS_COOKIE, table_miss.cookie());
        assert_eq!(0, table_miss.priority());
        assert!(table_miss.match_field().oxm_fields().is_empty());
        let action = &table_miss.instructions()[0].actions()[0];
        assert_eq!(OfpActionOutput::new_to_controller(), *action);

        session.serve(&async_reply(0b11)[..]).unwrap();
        assert_eq!(SessionState::Operating, session.state());
        assert!(sent(&session).is_empty());
    }

    #[test]
    fn missing_table_miss_subscription_is_requested() {
        let mut conf = Config::default();
        conf.session.table_features = true;
        let xids = XidGenerator::starting_at(0);
        let mut session = new_session(&conf, &xids);
        let mut input = hello();
        input.extend(features_reply());
        session.serve(&input[..]).unwrap();
        sent(&session);

        session.serve(&async_reply(0b100)[..]).unwrap();
        let out = sent(&session);
        assert_eq!(
            vec![OfpType::SetAsync as u8, OfpType::MultipartRequest as u8],
            types(&out)
        );
        let set_async = OfpAsyncConfig::deserialize(&out[0].2).unwrap();
        assert_eq!(Some(0b111), set_async.packet_in_master());
    }

    #[test]
    fn incompatible_hello_closes_the_session() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let mut session = new_session(&conf, &xids);
        let mut old_hello = message(OfpType::Hello as u8, 7, &[]);
        old_hello[0] = 0x04;

        let result = session.serve(&old_hello[..]);
        assert_eq!(Err(Error::ProtocolMismatch(0x04)), result);
        let out = sent(&session);
        assert_eq!(vec![OfpType::Error as u8], types(&out));
        assert_eq!(7, out[0].1);
        let err = OfpErrorMsg::deserialize(&out[0].2).unwrap();
        assert_eq!(OfpErrorType::HelloFailed as u16, err.typ());
        assert_eq!(SessionState::Start, session.state());
    }

    #[test]
    fn echo_in_any_state() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let mut session = new_session(&conf, &xids);
        let echo = message(OfpType::EchoRequest as u8, 0xabcd, b"ping");
        session.serve(&echo[..]).unwrap();
        let out = sent(&session);
        assert_eq!(
            vec![(OfpType::EchoReply as u8, 0xabcd, b"ping".to_vec())],
            out
        );
    }

    #[test]
    fn messages_before_hello_are_rejected() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let mut session = new_session(&conf, &xids);
        let reply = features_reply();
        session.serve(&reply[..]).unwrap();
        let out = sent(&session);
        assert_eq!(vec![OfpType::Error as u8], types(&out));
        let err = OfpErrorMsg::deserialize(&out[0].2).unwrap();
        assert_eq!(OfpErrorType::BadRequest as u16, err.typ());
        assert_eq!(OfpBadRequestCode::BadVersion as u16, err.code());
        assert_eq!(SessionState::Start, session.state());

        // the session goes on
        session.serve(&hello()[..]).unwrap();
        assert_eq!(SessionState::FeaturesRequested, session.state());
    }

    #[test]
    fn unknown_type_is_answered() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let mut session = operating(&conf, &xids);
        let unknown = message(22, 9, &[1, 2, 3]);
        session.serve(&unknown[..]).unwrap();
        let out = sent(&session);
        assert_eq!(vec![OfpType::Error as u8], types(&out));
        assert_eq!(9, out[0].1);
        let err = OfpErrorMsg::deserialize(&out[0].2).unwrap();
        assert_eq!(OfpBadRequestCode::BadType as u16, err.code());
        assert_eq!(&unknown[..], &out[0].2[4..]);
    }

    #[test]
    fn unknown_destination_is_flooded() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let mut session = operating(&conf, &xids);
        let data = arp(HOST_1, HOST_2);

        session.serve(&packet_in(TABLE_MISS_COOKIE, 3, &data)[..]).unwrap();
        let out = sent(&session);
        assert_eq!(vec![OfpType::PacketOut as u8], types(&out));
        let packet_out = OfpPacketOut::deserialize(&out[0].2).unwrap();
        assert_eq!(OFP_NO_BUFFER, packet_out.buffer_id());
        assert_eq!(3, packet_out.in_port());
        assert_eq!(OFPP_ALL, packet_out.actions()[0].port());
        assert_eq!(&data[..], packet_out.data());
        assert_eq!(Some(3), session.bridge().lookup(MacAddr::new(HOST_1)));
    }

    #[test]
    fn known_destination_gets_flows() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let mut session = operating(&conf, &xids);

        let mut input = packet_in(TABLE_MISS_COOKIE, 3, &arp(HOST_1, HOST_2));
        input.extend(packet_in(TABLE_MISS_COOKIE, 5, &arp(HOST_2, HOST_1)));
        session.serve(&input[..]).unwrap();
        let out = sent(&session);
        assert_eq!(
            vec![
                OfpType::PacketOut as u8,
                OfpType::FlowMod as u8,
                OfpType::FlowMod as u8,
                OfpType::PacketOut as u8
            ],
            types(&out)
        );

        let (h1, h2) = (MacAddr::new(HOST_1), MacAddr::new(HOST_2));
        let to_host_1 = OfpFlowMod::deserialize(&out[1].2).unwrap();
        assert_eq!(LEARNED_FLOW_COOKIE, to_host_1.cookie());
        assert_eq!(conf.flows.priority, to_host_1.priority());
        assert_eq!(conf.flows.idle_timeout, to_host_1.idle_timeout());
        assert_eq!(
            &[OfpOxmTlv::new_eth_src(h2), OfpOxmTlv::new_eth_dst(h1)],
            to_host_1.match_field().oxm_fields()
        );
        assert_eq!(3, to_host_1.instructions()[0].actions()[0].port());

        let to_host_2 = OfpFlowMod::deserialize(&out[2].2).unwrap();
        assert_eq!(
            &[OfpOxmTlv::new_eth_src(h1), OfpOxmTlv::new_eth_dst(h2)],
            to_host_2.match_field().oxm_fields()
        );
        assert_eq!(5, to_host_2.instructions()[0].actions()[0].port());

        let packet_out = OfpPacketOut::deserialize(&out[3].2).unwrap();
        assert_eq!(5, packet_out.in_port());
        assert_eq!(3, packet_out.actions()[0].port());
    }

    #[test]
    fn foreign_cookie_is_dropped() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let mut session = operating(&conf, &xids);
        let mut input = packet_in(0x99, 3, &arp(HOST_1, HOST_2));
        input.extend(message(OfpType::EchoRequest as u8, 4, &[]));
        session.serve(&input[..]).unwrap();
        assert_eq!(vec![OfpType::EchoReply as u8], types(&sent(&session)));
        assert!(session.bridge().is_empty());
    }

    #[test]
    fn malformed_packet_in_closes_the_session() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let mut session = operating(&conf, &xids);
        let truncated = message(OfpType::PacketIn as u8, 5, &[0; 20]);
        let result = session.serve(&truncated[..]);
        assert!(result.unwrap_err().is_fatal());
        let out = sent(&session);
        let err = OfpErrorMsg::deserialize(&out[0].2).unwrap();
        assert_eq!(OfpBadRequestCode::BadLen as u16, err.code());
    }

    #[test]
    fn buffers_return_to_the_pool() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let session = operating(&conf, &xids);
        let pool = session.channel.pool();
        assert_eq!(0, pool.in_use());
        assert!(pool.allocated() >= 2);
    }

    #[test]
    fn switch_errors_are_never_answered() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let mut session = new_session(&conf, &xids);

        // HELLO_FAILED from a 1.3 switch before any Hello
        let hello_failed = [4, 1, 0, 12, 0, 0, 0, 9, 0, 0, 0, 0];
        assert_eq!(Ok(()), session.serve(&hello_failed[..]));
        assert!(sent(&session).is_empty());
        assert_eq!(SessionState::Start, session.state());

        // too short for an error body
        let unreadable = [4, 1, 0, 10, 0, 0, 0, 9, 0, 1];
        assert_eq!(Ok(()), session.serve(&unreadable[..]));
        assert!(sent(&session).is_empty());

        let mut session = operating(&conf, &xids);
        let table_full = message(OfpType::Error as u8, 3, &[0, 5, 0, 1]);
        assert_eq!(Ok(()), session.serve(&table_full[..]));
        assert!(sent(&session).is_empty());
        assert_eq!(SessionState::Operating, session.state());
    }

    #[test]
    fn table_features_properties_are_walked() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let mut session = operating(&conf, &xids);

        let mut table = vec![0, 80, 0, 0, 0, 0, 0, 0];
        let mut name = b"classifier".to_vec();
        name.resize(32, 0);
        table.extend_from_slice(&name);
        table.extend_from_slice(&[0; 16 + 4]);
        table.extend_from_slice(&1000u32.to_be_bytes());
        // a match property with one OXM id
        table.extend_from_slice(&[0, 8, 0, 8, 0x80, 0, 0x06, 6]);
        // an unassigned property type, padded to 8 bytes
        table.extend_from_slice(&[0, 9, 0, 4, 0, 0, 0, 0]);
        let mut body = vec![0, OfpMultipartType::TableFeatures as u8, 0, 0, 0, 0, 0, 0];
        body.extend_from_slice(&table);

        let reply = message(OfpType::MultipartReply as u8, 6, &body);
        assert_eq!(Ok(()), session.serve(&reply[..]));
        assert!(sent(&session).is_empty());
    }

    #[test]
    fn role_status_properties_are_walked() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let mut session = operating(&conf, &xids);

        let mut body = vec![0, 0, 0, 2, 1, 0, 0, 0];
        body.extend_from_slice(&7u64.to_be_bytes());
        let mut with_experimenter = body.clone();
        with_experimenter.extend_from_slice(&[0xff, 0xff, 0, 12, 0, 0, 0, 1]);
        with_experimenter.extend_from_slice(&[0, 0, 0, 2, 0, 0, 0, 0]);
        let status = message(OfpType::RoleStatus as u8, 0, &with_experimenter);
        assert_eq!(Ok(()), session.serve(&status[..]));
        assert!(sent(&session).is_empty());

        // a property shorter than its own header
        body.extend_from_slice(&[0xff, 0xff, 0, 2, 0, 0, 0, 0]);
        let status = message(OfpType::RoleStatus as u8, 0, &body);
        assert!(session.serve(&status[..]).unwrap_err().is_fatal());
        let out = sent(&session);
        let err = OfpErrorMsg::deserialize(&out[0].2).unwrap();
        assert_eq!(OfpBadRequestCode::BadLen as u16, err.code());
    }

    #[test]
    fn read_failure_ends_the_session() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let mut session = new_session(&conf, &xids);
        let reader = ScriptedReader::new(vec![
            Ok(hello()),
            Err(io::Error::from(io::ErrorKind::ConnectionReset)),
            Ok(features_reply()),
        ]);

        let result = session.serve(reader);
        assert_eq!(Err(Error::Io(io::ErrorKind::ConnectionReset.into())), result);
        assert!(result.unwrap_err().is_fatal());
        assert_eq!(SessionState::FeaturesRequested, session.state());
        assert_eq!(0, session.channel.pool().in_use());
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let mut session = new_session(&conf, &xids);
        let hello = hello();
        let reader = ScriptedReader::new(vec![
            Ok(hello[..5].to_vec()),
            Err(io::Error::from(io::ErrorKind::Interrupted)),
            Ok(hello[5..].to_vec()),
        ]);

        assert_eq!(Ok(()), session.serve(reader));
        assert_eq!(SessionState::FeaturesRequested, session.state());
        assert_eq!(2, sent(&session).len());
        assert_eq!(0, session.channel.pool().in_use());
    }

    #[test]
    fn header_length_below_minimum_ends_the_session() {
        let conf = Config::default();
        let xids = XidGenerator::starting_at(0);
        let mut session = new_session(&conf, &xids);

        let result = session.serve(&[5, 0, 0, 4, 0, 0, 0, 0][..]);
        let err = result.unwrap_err();
        assert_eq!(Error::MalformedMessage("header length below minimum"), err);
        assert!(err.is_fatal());
        assert_eq!(0, session.channel.pool().in_use());
    }
}
