//! PDR map key and value, shared byte-for-byte with the kernel map.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::mem;
use core::net::Ipv4Addr;

/// Key of the PDR map.
///
/// Packed to 21 bytes. Multi-byte fields hold network byte order: the fast
/// path copies them from the wire, [`PdrKey::new`] converts host-order
/// values. Equality and hashing are over [`PdrKey::to_bytes`].
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct PdrKey {
    tunnel_ip4_dst: u32,
    tunnel_teid: u32,
    ue_ip_src_addr: u32,
    inet_ip_dst_addr: u32,
    ue_src_port: u16,
    /// Inner destination port: on uplink, the port of the internet-side
    /// peer the UE is talking to.
    inet_port: u16,
    proto_id: u8,
}

impl PdrKey {
    pub const LEN: usize = mem::size_of::<PdrKey>();

    /// Builds a key from host-order values, as received from the control
    /// plane.
    pub const fn new(
        tunnel_ip4_dst: u32,
        tunnel_teid: u32,
        ue_ip_src_addr: u32,
        inet_ip_dst_addr: u32,
        ue_src_port: u16,
        inet_port: u16,
        proto_id: u8,
    ) -> Self {
        PdrKey {
            tunnel_ip4_dst: tunnel_ip4_dst.to_be(),
            tunnel_teid: tunnel_teid.to_be(),
            ue_ip_src_addr: ue_ip_src_addr.to_be(),
            inet_ip_dst_addr: inet_ip_dst_addr.to_be(),
            ue_src_port: ue_src_port.to_be(),
            inet_port: inet_port.to_be(),
            proto_id,
        }
    }

    /// Builds a key from raw header bytes, as seen by the fast path.
    #[inline(always)]
    pub fn from_wire(
        tunnel_ip4_dst: [u8; 4],
        tunnel_teid: [u8; 4],
        ue_ip_src_addr: [u8; 4],
        inet_ip_dst_addr: [u8; 4],
        ue_src_port: [u8; 2],
        inet_port: [u8; 2],
        proto_id: u8,
    ) -> Self {
        PdrKey {
            tunnel_ip4_dst: u32::from_ne_bytes(tunnel_ip4_dst),
            tunnel_teid: u32::from_ne_bytes(tunnel_teid),
            ue_ip_src_addr: u32::from_ne_bytes(ue_ip_src_addr),
            inet_ip_dst_addr: u32::from_ne_bytes(inet_ip_dst_addr),
            ue_src_port: u16::from_ne_bytes(ue_src_port),
            inet_port: u16::from_ne_bytes(inet_port),
            proto_id,
        }
    }

    /// The canonical serialization: the exact bytes the kernel hashes.
    pub fn to_bytes(&self) -> [u8; PdrKey::LEN] {
        let mut out = [0u8; PdrKey::LEN];
        out[0..4].copy_from_slice(&{ self.tunnel_ip4_dst }.to_ne_bytes());
        out[4..8].copy_from_slice(&{ self.tunnel_teid }.to_ne_bytes());
        out[8..12].copy_from_slice(&{ self.ue_ip_src_addr }.to_ne_bytes());
        out[12..16].copy_from_slice(&{ self.inet_ip_dst_addr }.to_ne_bytes());
        out[16..18].copy_from_slice(&{ self.ue_src_port }.to_ne_bytes());
        out[18..20].copy_from_slice(&{ self.inet_port }.to_ne_bytes());
        out[20] = self.proto_id;
        out
    }

    pub fn tunnel_dst(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from_be(self.tunnel_ip4_dst))
    }

    pub fn teid(&self) -> u32 {
        u32::from_be(self.tunnel_teid)
    }

    pub fn ue_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from_be(self.ue_ip_src_addr))
    }

    pub fn inet_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from_be(self.inet_ip_dst_addr))
    }

    pub fn ue_port(&self) -> u16 {
        u16::from_be(self.ue_src_port)
    }

    pub fn inet_port(&self) -> u16 {
        u16::from_be(self.inet_port)
    }

    pub fn proto(&self) -> u8 {
        self.proto_id
    }
}

impl PartialEq for PdrKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PdrKey {}

impl Hash for PdrKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.to_bytes());
    }
}

impl fmt::Debug for PdrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdrKey")
            .field("tunnel_ip4_dst", &self.tunnel_dst())
            .field("tunnel_teid", &self.teid())
            .field("ue_ip_src_addr", &self.ue_addr())
            .field("inet_ip_dst_addr", &self.inet_addr())
            .field("ue_src_port", &self.ue_port())
            .field("inet_port", &self.inet_port())
            .field("proto_id", &self.proto())
            .finish()
    }
}

/// Value of the PDR map. Host byte order; the fast path never looks inside.
#[repr(C, packed)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PdrValue {
    pdr_id: u64,
    fse_id: u32,
    ctr_id: u32,
    qer_id: u32,
    far_id: u32,
}

impl PdrValue {
    pub const LEN: usize = mem::size_of::<PdrValue>();

    pub const fn new(pdr_id: u64, fse_id: u32, ctr_id: u32, qer_id: u32, far_id: u32) -> Self {
        PdrValue {
            pdr_id,
            fse_id,
            ctr_id,
            qer_id,
            far_id,
        }
    }

    pub fn pdr_id(&self) -> u64 {
        self.pdr_id
    }

    pub fn fse_id(&self) -> u32 {
        self.fse_id
    }

    pub fn ctr_id(&self) -> u32 {
        self.ctr_id
    }

    pub fn qer_id(&self) -> u32 {
        self.qer_id
    }

    pub fn far_id(&self) -> u32 {
        self.far_id
    }
}

impl fmt::Debug for PdrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdrValue")
            .field("pdr_id", &self.pdr_id())
            .field("fse_id", &self.fse_id())
            .field("ctr_id", &self.ctr_id())
            .field("qer_id", &self.qer_id())
            .field("far_id", &self.far_id())
            .finish()
    }
}

const _: () = {
    assert!(PdrKey::LEN == 21);
    assert!(PdrValue::LEN == 24);
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(key: &PdrKey) -> u64 {
        let mut h = DefaultHasher::new();
        key.hash(&mut h);
        h.finish()
    }

    #[test]
    fn key_layout_is_network_order() {
        let key = PdrKey::new(0xC612_0001, 0x42, 0x1000_0001, 0x0808_0808, 1000, 53, 17);
        assert_eq!(
            key.to_bytes(),
            [
                0xC6, 0x12, 0x00, 0x01, // tunnel dst 198.18.0.1
                0x00, 0x00, 0x00, 0x42, // teid
                0x10, 0x00, 0x00, 0x01, // ue 16.0.0.1
                0x08, 0x08, 0x08, 0x08, // inet 8.8.8.8
                0x03, 0xE8, // ue port 1000
                0x00, 0x35, // inet port 53
                17,
            ]
        );
    }

    #[test]
    fn control_plane_and_wire_keys_agree() {
        let cp = PdrKey::new(0xC612_0001, 0x42, 0x1000_0001, 0x0808_0808, 1000, 53, 17);
        let wire = PdrKey::from_wire(
            [198, 18, 0, 1],
            [0, 0, 0, 0x42],
            [16, 0, 0, 1],
            [8, 8, 8, 8],
            1000u16.to_be_bytes(),
            53u16.to_be_bytes(),
            17,
        );
        assert_eq!(cp, wire);
        assert_eq!(hash_of(&cp), hash_of(&wire));
        assert_eq!(wire.teid(), 0x42);
        assert_eq!(wire.tunnel_dst(), Ipv4Addr::new(198, 18, 0, 1));
        assert_eq!(wire.ue_addr(), Ipv4Addr::new(16, 0, 0, 1));
        assert_eq!(wire.inet_addr(), Ipv4Addr::new(8, 8, 8, 8));
        assert_eq!(wire.ue_port(), 1000);
        assert_eq!(wire.inet_port(), 53);
        assert_eq!(wire.proto(), 17);
    }

    #[test]
    fn keys_differing_in_one_field_are_distinct() {
        let a = PdrKey::new(1, 2, 3, 4, 5, 6, 7);
        let b = PdrKey::new(1, 2, 3, 4, 5, 6, 8);
        assert_ne!(a, b);
    }

    #[test]
    fn value_accessors() {
        let v = PdrValue::new(7, 1, 2, 3, 4);
        assert_eq!(v.pdr_id(), 7);
        assert_eq!(v.fse_id(), 1);
        assert_eq!(v.ctr_id(), 2);
        assert_eq!(v.qer_id(), 3);
        assert_eq!(v.far_id(), 4);
        assert_eq!(v, PdrValue::new(7, 1, 2, 3, 4));
    }
}
