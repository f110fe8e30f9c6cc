//! The access-side pipeline: envelope, IPv4/UDP, GTP-U, inner flow, PDR
//! lookup.

use crate::counters;
use crate::parse::{decode_gtp, demux_udp, inner_flow, resolve_envelope, Malformed, Unsupported};
use crate::pdr::{PdrKey, PdrValue};
use crate::view::PacketView;
use crate::MissAction;

/// Read access to the PDR table.
pub trait PdrLookup {
    fn lookup(&self, key: &PdrKey) -> Option<PdrValue>;
}

/// Why a frame is forwarded without classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassReason {
    /// IPv4 carrying something other than UDP; holds the protocol number.
    NonUdp(u8),
    /// UDP to a port other than GTP-U; holds the destination port.
    NotGtp(u16),
}

/// Terminal classification of one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Matched { key: PdrKey, value: PdrValue },
    Miss { key: PdrKey },
    PassThrough(PassReason),
    Unsupported(Unsupported),
    Malformed(Malformed),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Pass,
    Drop,
}

impl Outcome {
    #[inline(always)]
    pub fn disposition(&self, miss_action: MissAction) -> Disposition {
        match self {
            // Executing the matched rule's FAR/QER is left to later stages.
            Outcome::Matched { .. } | Outcome::PassThrough(_) => Disposition::Pass,
            Outcome::Miss { .. } => match miss_action {
                MissAction::Drop => Disposition::Drop,
                MissAction::Pass => Disposition::Pass,
            },
            Outcome::Unsupported(_) | Outcome::Malformed(_) => Disposition::Drop,
        }
    }

    /// Index of the `STATS` counter this outcome bumps.
    #[inline(always)]
    pub fn counter(&self) -> u32 {
        match self {
            Outcome::Matched { .. } => counters::PDR_HIT,
            Outcome::Miss { .. } => counters::PDR_MISS,
            Outcome::PassThrough(_) => counters::PASS_THROUGH,
            Outcome::Unsupported(_) => counters::UNSUPPORTED,
            Outcome::Malformed(_) => counters::MALFORMED,
        }
    }
}

impl From<Malformed> for Outcome {
    #[inline(always)]
    fn from(m: Malformed) -> Self {
        Outcome::Malformed(m)
    }
}

impl From<Unsupported> for Outcome {
    #[inline(always)]
    fn from(u: Unsupported) -> Self {
        Outcome::Unsupported(u)
    }
}

impl From<PassReason> for Outcome {
    #[inline(always)]
    fn from(p: PassReason) -> Self {
        Outcome::PassThrough(p)
    }
}

/// Classifies one frame received on the access port.
#[inline(always)]
pub fn classify_access<V, T>(view: &V, table: &T) -> Outcome
where
    V: PacketView,
    T: PdrLookup + ?Sized,
{
    match try_classify_access(view, table) {
        Ok(outcome) | Err(outcome) => outcome,
    }
}

#[inline(always)]
fn try_classify_access<V, T>(view: &V, table: &T) -> Result<Outcome, Outcome>
where
    V: PacketView,
    T: PdrLookup + ?Sized,
{
    let envelope = resolve_envelope(view)?;
    let segment = demux_udp(view, &envelope)?;

    let Some(tunnel) = decode_gtp(view, &segment)? else {
        return Err(PassReason::NotGtp(segment.udp.dst_port()).into());
    };

    let flow = inner_flow(view, &tunnel)?;
    let key = PdrKey::from_wire(
        segment.ip.hdr.dst_addr,
        tunnel.teid_bytes(),
        flow.src_addr,
        flow.dst_addr,
        flow.src_port,
        flow.dst_port,
        flow.proto,
    );

    Ok(match table.lookup(&key) {
        Some(value) => Outcome::Matched { key, value },
        None => Outcome::Miss { key },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::{
        EthHdr, GtpHdr, Ipv4Hdr, UdpHdr, ETH_P_ARP, ETH_P_IPV6, GTP_PORT, IPPROTO_UDP,
    };
    use crate::testing::{inner_ipv4, FrameBuilder};
    use crate::view::SliceView;
    use proptest::prelude::*;
    use std::collections::HashMap;

    struct Table(HashMap<PdrKey, PdrValue>);

    impl PdrLookup for Table {
        fn lookup(&self, key: &PdrKey) -> Option<PdrValue> {
            self.0.get(key).copied()
        }
    }

    fn empty() -> Table {
        Table(HashMap::new())
    }

    fn classify(frame: &[u8], table: &Table) -> Outcome {
        classify_access(&SliceView::new(frame), table)
    }

    // 198.18.0.1 is the N3 address, the UE 16.0.0.1 talks UDP to 8.8.8.8:53.
    fn uplink_key(teid: u32) -> PdrKey {
        PdrKey::new(0xC612_0001, teid, 0x1000_0001, 0x0808_0808, 40000, 53, IPPROTO_UDP)
    }

    fn uplink_frame(teid: u32) -> FrameBuilder {
        FrameBuilder::new()
            .outer_dst([198, 18, 0, 1])
            .teid(teid)
            .inner(inner_ipv4([16, 0, 0, 1], [8, 8, 8, 8], IPPROTO_UDP, 40000, 53))
    }

    #[test]
    fn gpdu_hits_installed_rule() {
        let value = PdrValue::new(1, 2, 3, 4, 5);
        let table = Table(HashMap::from([(uplink_key(0x42), value)]));
        let outcome = classify(&uplink_frame(0x42).build(), &table);
        assert_eq!(
            outcome,
            Outcome::Matched {
                key: uplink_key(0x42),
                value
            }
        );
        assert_eq!(outcome.disposition(MissAction::Drop), Disposition::Pass);
        assert_eq!(outcome.counter(), counters::PDR_HIT);
    }

    #[test]
    fn gpdu_without_rule_misses() {
        let outcome = classify(&uplink_frame(0x42).build(), &empty());
        let Outcome::Miss { key } = outcome else {
            panic!("expected a miss, got {outcome:?}");
        };
        assert_eq!(key.teid(), 0x42);
        assert_eq!(key, uplink_key(0x42));
        assert_eq!(outcome.disposition(MissAction::Drop), Disposition::Drop);
        assert_eq!(outcome.disposition(MissAction::Pass), Disposition::Pass);
    }

    #[test]
    fn tagged_frames_build_the_same_key() {
        let frame = uplink_frame(7).vlan(0x8100).vlan(0x8100).build();
        assert_eq!(classify(&frame, &empty()), Outcome::Miss { key: uplink_key(7) });
    }

    #[test]
    fn wrong_gtp_type_is_dropped() {
        let outcome = classify(&uplink_frame(0x42).gtp_type(254).build(), &empty());
        assert_eq!(outcome, Outcome::Malformed(Malformed::GtpType(254)));
        assert_eq!(outcome.disposition(MissAction::Pass), Disposition::Drop);
    }

    #[test]
    fn non_udp_passes_through() {
        let outcome = classify(&FrameBuilder::new().outer_proto(6).build(), &empty());
        assert_eq!(outcome, Outcome::PassThrough(PassReason::NonUdp(6)));
        assert_eq!(outcome.disposition(MissAction::Drop), Disposition::Pass);
    }

    #[test]
    fn non_udp_with_bad_ihl_still_passes() {
        let outcome = classify(&FrameBuilder::new().outer_proto(6).ihl(4).build(), &empty());
        assert_eq!(outcome, Outcome::PassThrough(PassReason::NonUdp(6)));
        assert_eq!(outcome.disposition(MissAction::Drop), Disposition::Pass);
        assert_eq!(outcome.counter(), counters::PASS_THROUGH);
    }

    #[test]
    fn plain_udp_passes_through() {
        let outcome = classify(&FrameBuilder::new().udp_dst_port(53).build(), &empty());
        assert_eq!(outcome, Outcome::PassThrough(PassReason::NotGtp(53)));
        assert_ne!(53, GTP_PORT);
    }

    #[test]
    fn ipv6_and_arp_are_dropped() {
        for (ether_type, expected) in [
            (ETH_P_IPV6, Unsupported::Ipv6),
            (ETH_P_ARP, Unsupported::Arp),
            (0x88CC, Unsupported::EtherType(0x88CC)),
        ] {
            let frame = FrameBuilder::new()
                .ether_type(ether_type)
                .payload(vec![0x60; 60])
                .build();
            let outcome = classify(&frame, &empty());
            assert_eq!(outcome, Outcome::Unsupported(expected));
            assert_eq!(outcome.disposition(MissAction::Pass), Disposition::Drop);
        }
    }

    #[test]
    fn truncated_gtp_is_malformed() {
        let mut frame = uplink_frame(1).build();
        frame.truncate(14 + 20 + 8 + 5);
        assert_eq!(classify(&frame, &empty()), Outcome::Malformed(Malformed::Gtp));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        #[test]
        fn arbitrary_bytes_never_panic(
            data in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let _ = classify(&data, &empty());
        }

        #[test]
        fn every_prefix_of_a_gpdu_is_classified(cut in 0usize..100) {
            let frame = uplink_frame(9).build();
            let len = cut.min(frame.len());
            let outcome = classify(&frame[..len], &empty());
            // Everything up to and including the inner UDP header is needed.
            let needed = EthHdr::LEN + 2 * Ipv4Hdr::LEN + 2 * UdpHdr::LEN + GtpHdr::LEN;
            if len >= needed {
                prop_assert_eq!(outcome, Outcome::Miss { key: uplink_key(9) });
            } else {
                prop_assert!(matches!(outcome, Outcome::Malformed(_)));
            }
        }

        #[test]
        fn teid_round_trips(teid in any::<u32>()) {
            match classify(&uplink_frame(teid).build(), &empty()) {
                Outcome::Miss { key } => prop_assert_eq!(key.teid(), teid),
                other => prop_assert!(false, "unexpected outcome {:?}", other),
            }
        }
    }
}
