/*!
Read-only dissectors for the Ethernet frames carried in packet-ins

All views borrow from the packet-in's data and never copy the payload.
A frame that is too short for the header it announces is not dissected:
the parse functions return `None` or fall back to `Network::Unparsable`.
*/

use byteorder::{ByteOrder, NetworkEndian};

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A 48-bit IEEE 802 MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    /// ff:ff:ff:ff:ff:ff
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    pub fn new(octets: [u8; 6]) -> MacAddr {
        MacAddr(octets)
    }

    /// Reads an address from exactly 6 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<MacAddr> {
        if bytes.len() != 6 {
            return None;
        }
        let mut octets = [0; 6];
        octets.copy_from_slice(bytes);
        Some(MacAddr(octets))
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == MacAddr::BROADCAST
    }

    /// Checks the group bit, which broadcast has set as well
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// Ethertypes this controller looks into
pub enum EtherType {
    Ipv4 = 0x0800,
    Arp = 0x0806,
    /// 802.1Q customer VLAN tag
    Vlan = 0x8100,
    /// 802.1ad service VLAN tag
    QinQ = 0x88a8,
    Ipv6 = 0x86dd,
}

const ETH_HEADER_LENGTH: usize = 14;
const VLAN_TAG_LENGTH: usize = 4;

/// An Ethernet II frame
#[derive(Debug, Clone, Copy)]
pub struct EthernetFrame<'a> {
    dst: MacAddr,
    src: MacAddr,
    /// VLAN id of the outermost tag
    vlan: Option<u16>,
    /// Ethertype after all VLAN tags
    ethertype: u16,
    payload: &'a [u8],
}

impl<'a> EthernetFrame<'a> {
    /// Parses the Ethernet header and up to two VLAN tags
    pub fn parse(bytes: &'a [u8]) -> Option<EthernetFrame<'a>> {
        if bytes.len() < ETH_HEADER_LENGTH {
            return None;
        }
        let dst = MacAddr::from_slice(&bytes[0..6])?;
        let src = MacAddr::from_slice(&bytes[6..12])?;
        let mut ethertype = NetworkEndian::read_u16(&bytes[12..14]);
        let mut pos = ETH_HEADER_LENGTH;
        let mut vlan = None;
        for _ in 0..2 {
            if ethertype != EtherType::Vlan as u16 && ethertype != EtherType::QinQ as u16 {
                break;
            }
            if bytes.len() < pos + VLAN_TAG_LENGTH {
                return None;
            }
            let tci = NetworkEndian::read_u16(&bytes[pos..]);
            vlan = vlan.or(Some(tci & 0x0fff));
            ethertype = NetworkEndian::read_u16(&bytes[pos + 2..]);
            pos += VLAN_TAG_LENGTH;
        }
        Some(EthernetFrame {
            dst,
            src,
            vlan,
            ethertype,
            payload: &bytes[pos..],
        })
    }

    pub fn dst_mac(&self) -> MacAddr {
        self.dst
    }

    pub fn src_mac(&self) -> MacAddr {
        self.src
    }

    pub fn ethertype(&self) -> u16 {
        self.ethertype
    }

    pub fn vlan_id(&self) -> Option<u16> {
        self.vlan
    }

    /// The bytes following the Ethernet header and VLAN tags
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Dissects the payload by ethertype
    pub fn network(&self) -> Network<'a> {
        let parsed = match self.ethertype {
            t if t == EtherType::Arp as u16 => Arp::parse(self.payload).map(Network::Arp),
            t if t == EtherType::Ipv4 as u16 => Ipv4::parse(self.payload).map(Network::Ipv4),
            t if t == EtherType::Ipv6 as u16 => Ipv6::parse(self.payload).map(Network::Ipv6),
            _ => None,
        };
        parsed.unwrap_or(Network::Unparsable(self.ethertype, self.payload))
    }
}

/// A packet at the network protocol level
#[derive(Debug)]
pub enum Network<'a> {
    Arp(Arp),
    Ipv4(Ipv4<'a>),
    Ipv6(Ipv6<'a>),
    /// Unknown ethertype or truncated header
    Unparsable(u16, &'a [u8]),
}

impl<'a> fmt::Display for Network<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Network::Arp(ref arp) if arp.is_request() => {
                write!(f, "ARP who-has {} tell {}", arp.target_ip(), arp.sender_ip())
            }
            Network::Arp(ref arp) => write!(
                f,
                "ARP {} is-at {} to {}",
                arp.sender_ip(),
                arp.sender_mac(),
                arp.target_mac()
            ),
            Network::Ipv4(ref ip) => write!(
                f,
                "IPv4 {} > {} proto {} ttl {}, {} bytes",
                ip.src(),
                ip.dst(),
                ip.proto(),
                ip.ttl(),
                ip.payload().len()
            ),
            Network::Ipv6(ref ip) => write!(
                f,
                "IPv6 {} > {} next header {} hop limit {}, {} bytes",
                ip.src(),
                ip.dst(),
                ip.next_header(),
                ip.hop_limit(),
                ip.payload().len()
            ),
            Network::Unparsable(typ, bytes) => {
                write!(f, "ethertype {:#06x}, {} bytes", typ, bytes.len())
            }
        }
    }
}

/// ARP for IPv4 over Ethernet
#[derive(Debug, Clone, PartialEq)]
pub struct Arp {
    oper: u16,
    sha: MacAddr,
    spa: Ipv4Addr,
    tha: MacAddr,
    tpa: Ipv4Addr,
}

impl Arp {
    const LENGTH: usize = 28;

    fn parse(bytes: &[u8]) -> Option<Arp> {
        if bytes.len() < Self::LENGTH {
            return None;
        }
        // hardware type Ethernet, protocol IPv4, address lengths 6 and 4
        if bytes[..6] != [0, 1, 0x08, 0x00, 6, 4] {
            return None;
        }
        Some(Arp {
            oper: NetworkEndian::read_u16(&bytes[6..8]),
            sha: MacAddr::from_slice(&bytes[8..14])?,
            spa: ipv4(&bytes[14..18]),
            tha: MacAddr::from_slice(&bytes[18..24])?,
            tpa: ipv4(&bytes[24..28]),
        })
    }

    pub fn is_request(&self) -> bool {
        self.oper == 1
    }

    pub fn sender_mac(&self) -> MacAddr {
        self.sha
    }

    pub fn sender_ip(&self) -> Ipv4Addr {
        self.spa
    }

    pub fn target_mac(&self) -> MacAddr {
        self.tha
    }

    pub fn target_ip(&self) -> Ipv4Addr {
        self.tpa
    }
}

fn ipv4(bytes: &[u8]) -> Ipv4Addr {
    Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])
}

/// IPv4 header view
#[derive(Debug, Clone, Copy)]
pub struct Ipv4<'a> {
    src: Ipv4Addr,
    dst: Ipv4Addr,
    proto: u8,
    ttl: u8,
    payload: &'a [u8],
}

impl<'a> Ipv4<'a> {
    const MIN_LENGTH: usize = 20;

    fn parse(bytes: &'a [u8]) -> Option<Ipv4<'a>> {
        if bytes.len() < Self::MIN_LENGTH || bytes[0] >> 4 != 4 {
            return None;
        }
        let header_length = (bytes[0] & 0x0f) as usize * 4;
        if header_length < Self::MIN_LENGTH || bytes.len() < header_length {
            return None;
        }
        Some(Ipv4 {
            ttl: bytes[8],
            proto: bytes[9],
            src: ipv4(&bytes[12..16]),
            dst: ipv4(&bytes[16..20]),
            payload: &bytes[header_length..],
        })
    }

    pub fn src(&self) -> Ipv4Addr {
        self.src
    }

    pub fn dst(&self) -> Ipv4Addr {
        self.dst
    }

    pub fn proto(&self) -> u8 {
        self.proto
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}

/// IPv6 fixed header view. Extension headers are part of the payload.
#[derive(Debug, Clone, Copy)]
pub struct Ipv6<'a> {
    src: Ipv6Addr,
    dst: Ipv6Addr,
    next_header: u8,
    hop_limit: u8,
    payload: &'a [u8],
}

impl<'a> Ipv6<'a> {
    const LENGTH: usize = 40;

    fn parse(bytes: &'a [u8]) -> Option<Ipv6<'a>> {
        if bytes.len() < Self::LENGTH || bytes[0] >> 4 != 6 {
            return None;
        }
        let mut src = [0; 16];
        src.copy_from_slice(&bytes[8..24]);
        let mut dst = [0; 16];
        dst.copy_from_slice(&bytes[24..40]);
        Some(Ipv6 {
            next_header: bytes[6],
            hop_limit: bytes[7],
            src: Ipv6Addr::from(src),
            dst: Ipv6Addr::from(dst),
            payload: &bytes[Self::LENGTH..],
        })
    }

    pub fn src(&self) -> Ipv6Addr {
        self.src
    }

    pub fn dst(&self) -> Ipv6Addr {
        self.dst
    }

    pub fn next_header(&self) -> u8 {
        self.next_header
    }

    pub fn hop_limit(&self) -> u8 {
        self.hop_limit
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}
