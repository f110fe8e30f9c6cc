use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{debug, info, warn};
use tokio::{signal, time};
use upf_xdp::{load_conf, AyaHost, LogLevel, MissPolicy, StatsLogger, UpfConf, UpfXdp};

#[cfg(debug_assertions)]
const DEFAULT_OBJECT: &str = "target/bpfel-unknown-none/debug/upf-xdp";
#[cfg(not(debug_assertions))]
const DEFAULT_OBJECT: &str = "target/bpfel-unknown-none/release/upf-xdp";

#[derive(Debug, Parser)]
struct Opt {
    /// TOML file with ports, levels and PDRs. Flags override it.
    #[clap(short, long)]
    conf: Option<PathBuf>,
    /// N3 interface, receives GTP-U.
    #[clap(short, long)]
    access_port: Option<String>,
    /// N6 interface.
    #[clap(short = 'n', long)]
    core_port: Option<String>,
    #[clap(short, long, value_enum)]
    log_level: Option<LogLevel>,
    /// What to do with G-PDUs that match no PDR.
    #[clap(short, long, value_enum)]
    miss_action: Option<MissPolicy>,
    #[clap(long, default_value = DEFAULT_OBJECT)]
    bpf_object: PathBuf,
    /// Seconds between counter dumps.
    #[clap(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    stats_interval: u64,
}

impl Opt {
    fn conf(&self) -> anyhow::Result<UpfConf> {
        let mut conf = match &self.conf {
            Some(path) => load_conf(path)?,
            None => UpfConf::default(),
        };
        if let Some(port) = &self.access_port {
            conf.access_port = port.clone();
        }
        if let Some(port) = &self.core_port {
            conf.core_port = port.clone();
        }
        if let Some(level) = self.log_level {
            conf.log_level = level;
        }
        if let Some(action) = self.miss_action {
            conf.miss_action = action;
        }
        conf.validate()?;
        Ok(conf)
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let opt = Opt::parse();
    let conf = opt.conf().context("invalid configuration")?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(conf.log_level.as_level_filter().as_str()),
    )
    .init();

    // Bump the memlock rlimit. This is needed for older kernels that don't use the
    // new memcg based accounting, see https://lwn.net/Articles/837122/
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!("remove limit on locked memory failed, ret is: {}", ret);
    }

    let mut upf = UpfXdp::init(AyaHost::new(&opt.bpf_object), &conf).context(
        "failed to bring up the XDP programs - native mode needs driver support on both ports",
    )?;

    let res = run(&upf, &conf, Duration::from_secs(opt.stats_interval)).await;
    info!("Exiting...");
    upf.clear();
    res
}

async fn run(upf: &UpfXdp<AyaHost>, conf: &UpfConf, interval: Duration) -> anyhow::Result<()> {
    upf.install(&conf.rules).context("failed to install PDRs")?;

    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    let mut stats = StatsLogger::default();

    info!("Waiting for Ctrl-C...");
    loop {
        tokio::select! {
            res = signal::ctrl_c() => return res.context("failed to wait for Ctrl-C"),
            _ = ticker.tick() => match upf.counters() {
                Ok(counters) => {
                    stats.log(&counters);
                }
                Err(e) => warn!("failed to read counters: {}", e),
            },
        }
    }
}
