//! Frame construction for host-side tests.

use crate::headers::{
    GtpHdr, Ipv4Hdr, UdpHdr, ETH_P_IP, GTP_FLAGS, GTP_PORT, GTP_TYPE_GPDU, IPPROTO_SCTP,
    IPPROTO_TCP, IPPROTO_UDP,
};

/// Source of every outer IPv4 header.
const GNB_ADDR: [u8; 4] = [11, 1, 1, 129];

/// Builds an Ethernet frame, by default
/// Ethernet / IPv4 / UDP:2152 / GTPv1 G-PDU (TEID 0) / IPv4 / UDP.
#[derive(Clone, Debug)]
pub struct FrameBuilder {
    tags: Vec<u16>,
    ether_type: u16,
    ihl: u8,
    outer_proto: u8,
    outer_dst: [u8; 4],
    udp_dst_port: u16,
    gtp_flags: u8,
    gtp_type: u8,
    teid: u32,
    gtp_ext: Vec<u8>,
    inner: Vec<u8>,
    payload: Vec<u8>,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        FrameBuilder {
            tags: Vec::new(),
            ether_type: ETH_P_IP,
            ihl: 5,
            outer_proto: IPPROTO_UDP,
            outer_dst: [198, 18, 0, 1],
            udp_dst_port: GTP_PORT,
            gtp_flags: GTP_FLAGS,
            gtp_type: GTP_TYPE_GPDU,
            teid: 0,
            gtp_ext: Vec::new(),
            inner: inner_ipv4([16, 0, 0, 1], [8, 8, 8, 8], IPPROTO_UDP, 40000, 53),
            payload: vec![0; 32],
        }
    }
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a VLAN tag with the given TPID, outermost first.
    pub fn vlan(mut self, tpid: u16) -> Self {
        self.tags.push(tpid);
        self
    }

    /// The ether_type after the last tag. Anything but IPv4 is followed by
    /// [`FrameBuilder::payload`].
    pub fn ether_type(mut self, ether_type: u16) -> Self {
        self.ether_type = ether_type;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Outer IPv4 header length in words; anything above 5 adds zeroed
    /// options.
    pub fn ihl(mut self, ihl: u8) -> Self {
        self.ihl = ihl;
        self
    }

    /// Outer IPv4 protocol. Anything but UDP is followed by
    /// [`FrameBuilder::payload`].
    pub fn outer_proto(mut self, proto: u8) -> Self {
        self.outer_proto = proto;
        self
    }

    pub fn outer_dst(mut self, addr: [u8; 4]) -> Self {
        self.outer_dst = addr;
        self
    }

    pub fn udp_dst_port(mut self, port: u16) -> Self {
        self.udp_dst_port = port;
        self
    }

    pub fn gtp_flags(mut self, flags: u8) -> Self {
        self.gtp_flags = flags;
        self
    }

    pub fn gtp_type(mut self, msg_type: u8) -> Self {
        self.gtp_type = msg_type;
        self
    }

    pub fn teid(mut self, teid: u32) -> Self {
        self.teid = teid;
        self
    }

    /// Raw bytes between the mandatory GTP header and the T-PDU (optional
    /// fields and extension headers). The matching flags are up to the
    /// caller.
    pub fn gtp_ext(mut self, ext: Vec<u8>) -> Self {
        self.gtp_ext = ext;
        self
    }

    /// The T-PDU carried in the tunnel.
    pub fn inner(mut self, inner: Vec<u8>) -> Self {
        self.inner = inner;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(128);
        frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01]);
        frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x02]);

        for (i, tpid) in self.tags.iter().enumerate() {
            if i == 0 {
                frame.extend_from_slice(&tpid.to_be_bytes());
            }
            let next = self.tags.get(i + 1).copied().unwrap_or(self.ether_type);
            frame.extend_from_slice(&[0x00, 0x0a]);
            frame.extend_from_slice(&next.to_be_bytes());
        }
        if self.tags.is_empty() {
            frame.extend_from_slice(&self.ether_type.to_be_bytes());
        }

        if self.ether_type != ETH_P_IP {
            frame.extend_from_slice(&self.payload);
            return frame;
        }

        let mut l4 = Vec::new();
        if self.outer_proto == IPPROTO_UDP {
            let gtp_len = (self.gtp_ext.len() + self.inner.len()) as u16;
            let udp_len = (UdpHdr::LEN + GtpHdr::LEN) as u16 + gtp_len;
            l4.extend_from_slice(&GTP_PORT.to_be_bytes());
            l4.extend_from_slice(&self.udp_dst_port.to_be_bytes());
            l4.extend_from_slice(&udp_len.to_be_bytes());
            l4.extend_from_slice(&[0, 0]);
            l4.push(self.gtp_flags);
            l4.push(self.gtp_type);
            l4.extend_from_slice(&gtp_len.to_be_bytes());
            l4.extend_from_slice(&self.teid.to_be_bytes());
            l4.extend_from_slice(&self.gtp_ext);
            l4.extend_from_slice(&self.inner);
        } else {
            l4.extend_from_slice(&self.payload);
        }

        let options = 4 * (self.ihl as usize).saturating_sub(5);
        frame.extend_from_slice(&ipv4_header(
            self.ihl,
            GNB_ADDR,
            self.outer_dst,
            self.outer_proto,
            options + l4.len(),
        ));
        frame.extend(std::iter::repeat(0u8).take(options));
        frame.extend_from_slice(&l4);
        frame
    }
}

fn ipv4_header(ihl: u8, src: [u8; 4], dst: [u8; 4], proto: u8, payload_len: usize) -> [u8; 20] {
    let tot_len = (Ipv4Hdr::LEN + payload_len) as u16;
    let mut hdr = [0u8; 20];
    hdr[0] = 0x40 | (ihl & 0x0f);
    hdr[2..4].copy_from_slice(&tot_len.to_be_bytes());
    hdr[8] = 64;
    hdr[9] = proto;
    hdr[12..16].copy_from_slice(&src);
    hdr[16..20].copy_from_slice(&dst);
    hdr
}

/// An inner IPv4 packet. TCP, UDP and SCTP get a transport header starting
/// with the given ports; other protocols get eight zero bytes.
pub fn inner_ipv4(src: [u8; 4], dst: [u8; 4], proto: u8, sport: u16, dport: u16) -> Vec<u8> {
    let mut l4 = Vec::new();
    match proto {
        IPPROTO_TCP => {
            l4.extend_from_slice(&sport.to_be_bytes());
            l4.extend_from_slice(&dport.to_be_bytes());
            l4.extend_from_slice(&[0; 8]);
            l4.extend_from_slice(&[0x50, 0x02, 0xff, 0xff, 0, 0, 0, 0]);
        }
        IPPROTO_UDP | IPPROTO_SCTP => {
            l4.extend_from_slice(&sport.to_be_bytes());
            l4.extend_from_slice(&dport.to_be_bytes());
            l4.extend_from_slice(&[0x00, 0x08, 0, 0]);
        }
        _ => l4.extend_from_slice(&[0; 8]),
    }

    let mut pkt = ipv4_header(5, src, dst, proto, l4.len()).to_vec();
    pkt.extend_from_slice(&l4);
    pkt
}

/// A minimal inner IPv6 header (no payload).
pub fn inner_ipv6() -> Vec<u8> {
    let mut pkt = vec![0u8; 40];
    pkt[0] = 0x60;
    pkt[6] = IPPROTO_UDP;
    pkt[7] = 64;
    pkt
}

/// GTP optional fields followed by one PDU Session Container extension
/// (TS 38.415, UL PDU session information). Use with the E flag set.
pub fn pdu_session_container(qfi: u8) -> Vec<u8> {
    vec![
        0x00, 0x00, // sequence number
        0x00, // N-PDU number
        0x85, // next extension: PDU session container
        0x01, // length, 4 octets
        0x10, // PDU type 1 (UL)
        qfi & 0x3f,
        0x00, // no further extension
    ]
}
