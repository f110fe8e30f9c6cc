//! Wire layouts of the headers the access pipeline reads.
//!
//! Ethernet, IPv4, UDP and TCP come from `network_types`. VLAN tags and
//! GTP-U are laid out here, with multi-byte fields as byte arrays decoded
//! from network order by the accessors.

use core::mem;

pub use network_types::{
    eth::EthHdr,
    ip::{IpProto, Ipv4Hdr},
    tcp::TcpHdr,
    udp::UdpHdr,
};

use crate::view::Header;

pub const ETH_P_802_3_MIN: u16 = 0x0600;
pub const ETH_P_IP: u16 = 0x0800;
pub const ETH_P_ARP: u16 = 0x0806;
pub const ETH_P_8021Q: u16 = 0x8100;
pub const ETH_P_8021AD: u16 = 0x88A8;
pub const ETH_P_IPV6: u16 = 0x86DD;

pub const IPPROTO_TCP: u8 = IpProto::Tcp as u8;
pub const IPPROTO_UDP: u8 = IpProto::Udp as u8;
pub const IPPROTO_SCTP: u8 = IpProto::Sctp as u8;

/// UDP port of GTP-U (TS 29.281).
pub const GTP_PORT: u16 = 2152;
/// G-PDU: user data plus GTP-U header.
pub const GTP_TYPE_GPDU: u8 = 255;
/// Version 1, protocol type GTP, no optional fields.
pub const GTP_FLAGS: u8 = 0x30;

const GTP_FLAG_PT: u8 = 0x10;
const GTP_FLAG_E: u8 = 0x04;
const GTP_FLAG_S: u8 = 0x02;
const GTP_FLAG_PN: u8 = 0x01;

/// 802.1Q / 802.1ad tag, minus the TPID which lives in the previous header.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct VlanHdr {
    pub tci: [u8; 2],
    pub encapsulated_proto: [u8; 2],
}

impl VlanHdr {
    pub const LEN: usize = mem::size_of::<VlanHdr>();

    #[inline(always)]
    pub fn ether_type(&self) -> u16 {
        u16::from_be_bytes(self.encapsulated_proto)
    }
}

/// GTPv1 mandatory header, TS 29.060 section 6.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct GtpHdr {
    pub flags: u8,
    pub msg_type: u8,
    pub length: [u8; 2],
    pub teid: [u8; 4],
}

impl GtpHdr {
    pub const LEN: usize = mem::size_of::<GtpHdr>();

    #[inline(always)]
    pub fn version(&self) -> u8 {
        self.flags >> 5
    }

    #[inline(always)]
    pub fn is_gtp(&self) -> bool {
        self.flags & GTP_FLAG_PT != 0
    }

    /// Sequence number, N-PDU number and next extension type are present
    /// whenever any of E, S or PN is set.
    #[inline(always)]
    pub fn has_optional(&self) -> bool {
        self.flags & (GTP_FLAG_E | GTP_FLAG_S | GTP_FLAG_PN) != 0
    }

    #[inline(always)]
    pub fn has_extension(&self) -> bool {
        self.flags & GTP_FLAG_E != 0
    }

    #[inline(always)]
    pub fn length(&self) -> u16 {
        u16::from_be_bytes(self.length)
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct GtpOptional {
    pub seq: [u8; 2],
    pub npdu: u8,
    pub next_ext: u8,
}

impl GtpOptional {
    pub const LEN: usize = mem::size_of::<GtpOptional>();
}

/// First byte of an extension header: its length in 4-octet units.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct GtpExtLen {
    pub len: u8,
}

/// Last byte of an extension header: the type of the next one (0 = none).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct GtpExtNext {
    pub next_ext: u8,
}

// `Ipv4Hdr` is left out: its `proto` field is an enum that does not cover
// every protocol number. See `parse::load_ipv4`.
unsafe impl Header for EthHdr {}
unsafe impl Header for UdpHdr {}
unsafe impl Header for TcpHdr {}
unsafe impl Header for VlanHdr {}
unsafe impl Header for GtpHdr {}
unsafe impl Header for GtpOptional {}
unsafe impl Header for GtpExtLen {}
unsafe impl Header for GtpExtNext {}

const _: () = {
    assert!(EthHdr::LEN == 14);
    assert!(VlanHdr::LEN == 4);
    assert!(Ipv4Hdr::LEN == 20);
    assert!(UdpHdr::LEN == 8);
    assert!(TcpHdr::LEN == 20);
    assert!(GtpHdr::LEN == 8);
    assert!(GtpOptional::LEN == 4);
};
