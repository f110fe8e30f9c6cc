#![no_std]
#![no_main]

use aya_ebpf::{
    bindings::xdp_action,
    macros::{map, xdp},
    maps::{HashMap, PerCpuArray},
    programs::XdpContext,
};
use aya_log_ebpf::{debug, error, info};
use upf_xdp_common::{
    classify_access, counters, Disposition, Malformed, Outcome, PassReason, PdrKey, PdrLookup,
    PdrValue, UpfConfig, Unsupported, LOG_LEVEL_DEBUG, LOG_LEVEL_ERR, LOG_LEVEL_INFO,
    PDR_LIST_MAX_SIZE,
};
use upf_xdp_ebpf::{gated, XdpView};

// Patched by the loader before the object is loaded.
#[no_mangle]
static UPF_CONFIG: UpfConfig = UpfConfig::DEFAULT;

// Written by the control plane only.
#[map]
static PDR_LIST: HashMap<PdrKey, PdrValue> = HashMap::with_max_entries(PDR_LIST_MAX_SIZE, 0);

#[map]
static STATS: PerCpuArray<u64> = PerCpuArray::with_max_entries(counters::NUM_COUNTERS, 0);

struct PdrList;

impl PdrLookup for PdrList {
    #[inline(always)]
    fn lookup(&self, key: &PdrKey) -> Option<PdrValue> {
        unsafe { PDR_LIST.get(key) }.copied()
    }
}

#[inline(always)]
fn config() -> UpfConfig {
    unsafe { core::ptr::read_volatile(&UPF_CONFIG) }
}

#[inline(always)]
fn count(index: u32) {
    if let Some(counter) = STATS.get_ptr_mut(index) {
        unsafe {
            *counter += 1;
        }
    }
}

#[xdp]
pub fn upf_main_access(ctx: XdpContext) -> u32 {
    let cfg = config();
    count(counters::RX);
    gated!(cfg, LOG_LEVEL_DEBUG, debug!(&ctx, "[Access] Received packet on interface ACCESS"));

    let outcome = classify_access(&XdpView::new(&ctx), &PdrList);
    log_outcome(&ctx, &cfg, &outcome);
    count(outcome.counter());

    match outcome.disposition(cfg.miss_action()) {
        Disposition::Pass => {
            count(counters::PASS);
            xdp_action::XDP_PASS
        }
        Disposition::Drop => {
            count(counters::DROP);
            gated!(cfg, LOG_LEVEL_DEBUG, debug!(&ctx, "[Access] Dropping packet."));
            xdp_action::XDP_DROP
        }
    }
}

#[inline(always)]
fn log_outcome(ctx: &XdpContext, cfg: &UpfConfig, outcome: &Outcome) {
    match *outcome {
        Outcome::Matched { key, value } => gated!(
            cfg,
            LOG_LEVEL_INFO,
            info!(ctx, "[Access] TEID = {} matched PDR {}", key.teid(), value.pdr_id())
        ),
        Outcome::Miss { key } => gated!(
            cfg,
            LOG_LEVEL_INFO,
            info!(ctx, "[Access] No PDR for TEID = {}", key.teid())
        ),
        Outcome::PassThrough(PassReason::NonUdp(proto)) => gated!(
            cfg,
            LOG_LEVEL_INFO,
            info!(ctx, "[Access] Received non-UDP packet, protocol {}", proto)
        ),
        Outcome::PassThrough(PassReason::NotGtp(port)) => gated!(
            cfg,
            LOG_LEVEL_DEBUG,
            debug!(ctx, "[Access] UDP packet to port {} is not GTP-U", port)
        ),
        Outcome::Unsupported(Unsupported::Ipv6) => gated!(
            cfg,
            LOG_LEVEL_DEBUG,
            debug!(ctx, "[Access] Received IPv6 packet. Dropping")
        ),
        Outcome::Unsupported(Unsupported::Arp) => {
            gated!(cfg, LOG_LEVEL_DEBUG, debug!(ctx, "[Access] Received ARP."))
        }
        Outcome::Unsupported(Unsupported::EtherType(ether_type)) => gated!(
            cfg,
            LOG_LEVEL_DEBUG,
            debug!(ctx, "[Access] Unrecognized L3 protocol {:x}", ether_type)
        ),
        Outcome::Unsupported(Unsupported::InnerIpv6) => gated!(
            cfg,
            LOG_LEVEL_DEBUG,
            debug!(ctx, "[Access] IPv6 inside GTP-U is not supported")
        ),
        Outcome::Malformed(malformed) => log_malformed(ctx, cfg, malformed),
    }
}

#[inline(always)]
fn log_malformed(ctx: &XdpContext, cfg: &UpfConfig, malformed: Malformed) {
    if !cfg.log_enabled(LOG_LEVEL_ERR) {
        return;
    }
    match malformed {
        Malformed::Ethernet => error!(ctx, "[Access] Truncated Ethernet header"),
        Malformed::EtherTypeFloor(len) => {
            error!(ctx, "[Access] Non Ethernet II frame, length field {}", len)
        }
        Malformed::Vlan => error!(ctx, "[Access] Invalid VLAN tag"),
        Malformed::Ipv4 => error!(ctx, "[Access] Invalid IPv4 packet"),
        Malformed::Udp => error!(ctx, "[Access] Invalid UDP packet"),
        Malformed::Gtp => error!(ctx, "[Access] Invalid GTP packet"),
        Malformed::GtpVersion(flags) => error!(ctx, "[Access] Unexpected GTP flags {:x}", flags),
        Malformed::GtpType(msg_type) => {
            error!(ctx, "[Access] Message type {} is not G-PDU", msg_type)
        }
        Malformed::GtpExtension => error!(ctx, "[Access] Invalid GTP extension header"),
        Malformed::InnerIpv4 => error!(ctx, "[Access] Invalid inner IPv4 packet"),
        Malformed::InnerL4 => error!(ctx, "[Access] Invalid inner transport header"),
    }
}

#[xdp]
pub fn upf_main_core(ctx: XdpContext) -> u32 {
    count(counters::CORE_RX);
    gated!(config(), LOG_LEVEL_INFO, info!(&ctx, "[Core] Received packet on interface CORE"));

    xdp_action::XDP_PASS
}

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
