#![no_std]

use aya_ebpf::programs::XdpContext;
use upf_xdp_common::PacketView;

/// [`PacketView`] over the frame an XDP program is looking at.
pub struct XdpView<'a> {
    ctx: &'a XdpContext,
}

impl<'a> XdpView<'a> {
    #[inline(always)]
    pub fn new(ctx: &'a XdpContext) -> Self {
        XdpView { ctx }
    }
}

impl PacketView for XdpView<'_> {
    #[inline(always)]
    fn start(&self) -> usize {
        self.ctx.data()
    }

    #[inline(always)]
    fn end(&self) -> usize {
        self.ctx.data_end()
    }
}

/// Emits an `aya_log_ebpf` record only if the configured verbosity allows
/// it.
#[macro_export]
macro_rules! gated {
    ($cfg:expr, $level:expr, $log:ident!($($arg:tt)+)) => {
        if $cfg.log_enabled($level) {
            $log!($($arg)+)
        }
    };
}
