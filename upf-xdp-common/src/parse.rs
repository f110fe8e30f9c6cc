//! Header-by-header parsing of frames received on the access port.
//!
//! Every stage takes the [`PacketView`] plus the result of the previous
//! stage, and only touches memory through [`PacketView::load`]. Loops are
//! bounded by constants so the same code passes the eBPF verifier.

use core::{mem, ptr};

use crate::classify::{Outcome, PassReason};
use crate::headers::*;
use crate::view::PacketView;

/// VLAN tags unwrapped before giving up. A third tag is left in place and
/// its TPID is reported as the ether_type.
pub const MAX_VLAN_TAGS: usize = 2;

/// GTP-U extension headers walked before the inner packet must start.
pub const MAX_GTP_EXT_HEADERS: usize = 2;

/// A header did not fit in the buffer or failed a validity check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Malformed {
    Ethernet,
    /// An 802.3 length field where an Ethernet II type was expected.
    EtherTypeFloor(u16),
    Vlan,
    Ipv4,
    Udp,
    Gtp,
    GtpVersion(u8),
    GtpType(u8),
    GtpExtension,
    InnerIpv4,
    InnerL4,
}

/// Recognised but not forwarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unsupported {
    Ipv6,
    Arp,
    EtherType(u16),
    InnerIpv6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EthernetEnvelope {
    /// Host byte order.
    pub ether_type: u16,
    /// Offset of the L3 header from the start of the frame.
    pub payload_offset: usize,
    pub vlan_tags: u8,
}

const ETH_TYPE: usize = mem::offset_of!(EthHdr, ether_type);
const IPV4_PROTO: usize = mem::offset_of!(Ipv4Hdr, proto);
const IPV4_FRAG: usize = 6;
const IPV4_FRAG_OFFSET_MASK: u16 = 0x1fff;

/// An IPv4 header copied out of the packet.
pub struct Ipv4Packet {
    /// `hdr.proto` holds a placeholder; the wire value is in `proto`.
    pub hdr: Ipv4Hdr,
    pub proto: u8,
    pub version: u8,
    /// In 8-octet units, flags masked off.
    pub frag_offset: u16,
}

impl Ipv4Packet {
    #[inline(always)]
    pub fn header_len(&self) -> usize {
        self.hdr.ihl() as usize
    }
}

/// Copies the IPv4 header at `offset`.
///
/// `Ipv4Hdr::proto` is an `IpProto`, which has no variant for unassigned
/// protocol numbers, so the byte is lifted out before the copy is typed.
#[inline(always)]
pub fn load_ipv4<V: PacketView>(view: &V, offset: usize) -> Option<Ipv4Packet> {
    let mut raw: [u8; Ipv4Hdr::LEN] = view.load(offset)?;
    let proto = raw[IPV4_PROTO];
    raw[IPV4_PROTO] = IPPROTO_UDP;
    // Every other field is an integer or a byte array.
    let hdr = unsafe { ptr::read_unaligned(raw.as_ptr() as *const Ipv4Hdr) };

    Some(Ipv4Packet {
        hdr,
        proto,
        version: raw[0] >> 4,
        frag_offset: u16::from_be_bytes([raw[IPV4_FRAG], raw[IPV4_FRAG + 1]])
            & IPV4_FRAG_OFFSET_MASK,
    })
}

/// An IPv4 packet carrying UDP.
pub struct UdpSegment {
    pub ip: Ipv4Packet,
    pub udp: UdpHdr,
    pub udp_offset: usize,
}

impl UdpSegment {
    #[inline(always)]
    pub fn payload_offset(&self) -> usize {
        self.udp_offset + UdpHdr::LEN
    }
}

/// A validated GTPv1-U G-PDU header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GtpTunnel {
    pub flags: u8,
    pub msg_type: u8,
    /// Host byte order.
    pub length: u16,
    /// Stored exactly as on the wire: the in-memory bytes are the TEID in
    /// network order.
    pub teid: u32,
    pub header_offset: usize,
}

impl GtpTunnel {
    #[inline(always)]
    pub fn teid_bytes(&self) -> [u8; 4] {
        self.teid.to_ne_bytes()
    }

    pub fn teid_host(&self) -> u32 {
        u32::from_be(self.teid)
    }
}

/// Addresses, ports and protocol of the packet carried inside the tunnel,
/// as raw wire bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InnerFlow {
    pub src_addr: [u8; 4],
    pub dst_addr: [u8; 4],
    pub src_port: [u8; 2],
    pub dst_port: [u8; 2],
    pub proto: u8,
}

/// Strips the Ethernet header and up to [`MAX_VLAN_TAGS`] VLAN tags.
#[inline(always)]
pub fn resolve_envelope<V: PacketView>(view: &V) -> Result<EthernetEnvelope, Malformed> {
    let eth: [u8; EthHdr::LEN] = view.load(0).ok_or(Malformed::Ethernet)?;
    let mut ether_type = u16::from_be_bytes([eth[ETH_TYPE], eth[ETH_TYPE + 1]]);
    let mut offset = EthHdr::LEN;
    let mut vlan_tags = 0u8;

    if ether_type < ETH_P_802_3_MIN {
        return Err(Malformed::EtherTypeFloor(ether_type));
    }

    for _ in 0..MAX_VLAN_TAGS {
        if ether_type != ETH_P_8021Q && ether_type != ETH_P_8021AD {
            break;
        }
        let vlan: VlanHdr = view.load(offset).ok_or(Malformed::Vlan)?;
        offset += VlanHdr::LEN;
        ether_type = vlan.ether_type();
        vlan_tags += 1;
    }

    Ok(EthernetEnvelope {
        ether_type,
        payload_offset: offset,
        vlan_tags,
    })
}

/// Dispatches on the L3 protocol and locates the UDP header of an IPv4
/// packet.
///
/// Non-UDP IPv4 is handed back as [`PassReason::NonUdp`]: it is forwarded,
/// not dropped, whatever its header length says.
#[inline(always)]
pub fn demux_udp<V: PacketView>(
    view: &V,
    envelope: &EthernetEnvelope,
) -> Result<UdpSegment, Outcome> {
    match envelope.ether_type {
        ETH_P_IP => {}
        ETH_P_IPV6 => return Err(Unsupported::Ipv6.into()),
        // TODO: hand ARP to the control plane once it has a punt path.
        ETH_P_ARP => return Err(Unsupported::Arp.into()),
        other => return Err(Unsupported::EtherType(other).into()),
    }

    let ip = load_ipv4(view, envelope.payload_offset).ok_or(Malformed::Ipv4)?;
    if ip.proto != IPPROTO_UDP {
        return Err(PassReason::NonUdp(ip.proto).into());
    }
    // Only needed to find the UDP header.
    if ip.header_len() < Ipv4Hdr::LEN {
        return Err(Malformed::Ipv4.into());
    }

    let udp_offset = envelope.payload_offset + ip.header_len();
    let udp: UdpHdr = view.load(udp_offset).ok_or(Malformed::Udp)?;

    Ok(UdpSegment {
        ip,
        udp,
        udp_offset,
    })
}

/// Decodes the GTPv1 header following `segment`, if its destination port
/// is the GTP-U port. `Ok(None)` means plain UDP.
#[inline(always)]
pub fn decode_gtp<V: PacketView>(
    view: &V,
    segment: &UdpSegment,
) -> Result<Option<GtpTunnel>, Malformed> {
    if segment.udp.dst_port() != GTP_PORT {
        return Ok(None);
    }

    let header_offset = segment.payload_offset();
    let gtp: GtpHdr = view.load(header_offset).ok_or(Malformed::Gtp)?;

    if gtp.version() != 1 || !gtp.is_gtp() {
        return Err(Malformed::GtpVersion(gtp.flags));
    }
    if gtp.msg_type != GTP_TYPE_GPDU {
        return Err(Malformed::GtpType(gtp.msg_type));
    }

    Ok(Some(GtpTunnel {
        flags: gtp.flags,
        msg_type: gtp.msg_type,
        length: gtp.length(),
        teid: u32::from_ne_bytes(gtp.teid),
        header_offset,
    }))
}

/// Offset of the T-PDU: skips the optional fields and at most
/// [`MAX_GTP_EXT_HEADERS`] extension headers.
#[inline(always)]
pub fn gtp_payload_offset<V: PacketView>(view: &V, tunnel: &GtpTunnel) -> Result<usize, Malformed> {
    let gtp: GtpHdr = view.load(tunnel.header_offset).ok_or(Malformed::Gtp)?;
    let mut offset = tunnel.header_offset + GtpHdr::LEN;

    if !gtp.has_optional() {
        return Ok(offset);
    }

    let optional: GtpOptional = view.load(offset).ok_or(Malformed::Gtp)?;
    offset += GtpOptional::LEN;

    // The next-type byte only means something when E is set.
    let mut next_ext = if gtp.has_extension() {
        optional.next_ext
    } else {
        0
    };

    for _ in 0..MAX_GTP_EXT_HEADERS {
        if next_ext == 0 {
            break;
        }
        let ext: GtpExtLen = view.load(offset).ok_or(Malformed::GtpExtension)?;
        let ext_len = 4 * ext.len as usize;
        if ext_len == 0 {
            return Err(Malformed::GtpExtension);
        }
        let tail: GtpExtNext = view
            .load(offset + ext_len - 1)
            .ok_or(Malformed::GtpExtension)?;
        next_ext = tail.next_ext;
        offset += ext_len;
    }

    if next_ext != 0 {
        return Err(Malformed::GtpExtension);
    }

    Ok(offset)
}

/// Parses the IPv4 packet carried in the tunnel.
///
/// Ports are zero for protocols without them and for every fragment but
/// the first, which alone carries the transport header.
#[inline(always)]
pub fn inner_flow<V: PacketView>(view: &V, tunnel: &GtpTunnel) -> Result<InnerFlow, Outcome> {
    let offset = gtp_payload_offset(view, tunnel)?;
    let ip = load_ipv4(view, offset).ok_or(Malformed::InnerIpv4)?;

    match ip.version {
        4 => {}
        6 => return Err(Unsupported::InnerIpv6.into()),
        _ => return Err(Malformed::InnerIpv4.into()),
    }
    if ip.header_len() < Ipv4Hdr::LEN {
        return Err(Malformed::InnerIpv4.into());
    }

    let l4_offset = offset + ip.header_len();
    let (src_port, dst_port) = match ip.proto {
        _ if ip.frag_offset != 0 => ([0; 2], [0; 2]),
        IPPROTO_TCP => {
            let tcp: TcpHdr = view.load(l4_offset).ok_or(Malformed::InnerL4)?;
            (tcp.source, tcp.dest)
        }
        // SCTP's common header opens with the same port pair as UDP and is
        // longer, so the UDP layout reads it.
        IPPROTO_UDP | IPPROTO_SCTP => {
            let udp: UdpHdr = view.load(l4_offset).ok_or(Malformed::InnerL4)?;
            (udp.src, udp.dst)
        }
        _ => ([0; 2], [0; 2]),
    };

    Ok(InnerFlow {
        src_addr: ip.hdr.src_addr,
        dst_addr: ip.hdr.dst_addr,
        src_port,
        dst_port,
        proto: ip.proto,
    })
}
