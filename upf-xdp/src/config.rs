//! Port, logging and rule configuration, read from an optional TOML file.
//!
//! ```toml
//! access_port = "eth1"
//! core_port = "eth2"
//! log_level = "info"
//! miss_action = "drop"
//!
//! [[pdr]]
//! tunnel_dst = "198.18.0.1"
//! teid = 66
//! ue_addr = "16.0.0.1"
//! inet_addr = "8.8.8.8"
//! ue_port = 40000
//! inet_port = 53
//! proto = 17
//! pdr_id = 1
//! far_id = 1
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::LevelFilter;
use serde::Deserialize;
use thiserror::Error;
use upf_xdp_common::{
    MissAction, PdrKey, PdrValue, UpfConfig, LOG_LEVEL_DEBUG, LOG_LEVEL_ERR, LOG_LEVEL_INFO,
    LOG_LEVEL_NOTICE, LOG_LEVEL_WARNING, PDR_LIST_MAX_SIZE,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Verbosity of both the loader and the XDP programs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Err,
    Warning,
    Notice,
    Info,
    Debug,
}

impl LogLevel {
    /// The value patched into `UpfConfig::log_level`.
    pub fn to_ebpf(self) -> u8 {
        match self {
            LogLevel::Err => LOG_LEVEL_ERR,
            LogLevel::Warning => LOG_LEVEL_WARNING,
            LogLevel::Notice => LOG_LEVEL_NOTICE,
            LogLevel::Info => LOG_LEVEL_INFO,
            LogLevel::Debug => LOG_LEVEL_DEBUG,
        }
    }

    // `log` has no notice level.
    pub fn as_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Err => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Notice | LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}

/// What happens to a G-PDU that matches no rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MissPolicy {
    #[default]
    Drop,
    Pass,
}

impl From<MissPolicy> for MissAction {
    fn from(policy: MissPolicy) -> Self {
        match policy {
            MissPolicy::Drop => MissAction::Drop,
            MissPolicy::Pass => MissAction::Pass,
        }
    }
}

/// One PDR as written in the configuration file. Ports default to 0.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdrRule {
    pub tunnel_dst: Ipv4Addr,
    pub teid: u32,
    pub ue_addr: Ipv4Addr,
    pub inet_addr: Ipv4Addr,
    #[serde(default)]
    pub ue_port: u16,
    #[serde(default)]
    pub inet_port: u16,
    pub proto: u8,

    pub pdr_id: u64,
    #[serde(default)]
    pub fse_id: u32,
    #[serde(default)]
    pub ctr_id: u32,
    #[serde(default)]
    pub qer_id: u32,
    #[serde(default)]
    pub far_id: u32,
}

impl PdrRule {
    pub fn key(&self) -> PdrKey {
        PdrKey::new(
            self.tunnel_dst.into(),
            self.teid,
            self.ue_addr.into(),
            self.inet_addr.into(),
            self.ue_port,
            self.inet_port,
            self.proto,
        )
    }

    pub fn value(&self) -> PdrValue {
        PdrValue::new(self.pdr_id, self.fse_id, self.ctr_id, self.qer_id, self.far_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpfConf {
    pub access_port: String,
    pub core_port: String,
    pub log_level: LogLevel,
    pub miss_action: MissPolicy,
    #[serde(rename = "pdr")]
    pub rules: Vec<PdrRule>,
}

impl UpfConf {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_port.is_empty() {
            return Err(ConfigError::Invalid("access port is not set".into()));
        }
        if self.core_port.is_empty() {
            return Err(ConfigError::Invalid("core port is not set".into()));
        }
        if self.access_port == self.core_port {
            return Err(ConfigError::Invalid(format!(
                "access and core ports are both {}",
                self.access_port
            )));
        }

        let distinct: HashSet<PdrKey> = self.rules.iter().map(PdrRule::key).collect();
        if distinct.len() > PDR_LIST_MAX_SIZE as usize {
            return Err(ConfigError::Invalid(format!(
                "{} rules exceed the table capacity of {PDR_LIST_MAX_SIZE}",
                distinct.len()
            )));
        }
        Ok(())
    }

    /// The configuration global handed to the XDP programs.
    pub fn xdp_config(&self) -> UpfConfig {
        UpfConfig::new(self.log_level.to_ebpf(), self.miss_action.into())
    }
}

pub fn parse_conf(s: &str) -> Result<UpfConf, ConfigError> {
    Ok(toml::from_str(s)?)
}

pub fn load_conf(path: impl AsRef<Path>) -> Result<UpfConf, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_conf(&contents)
}
