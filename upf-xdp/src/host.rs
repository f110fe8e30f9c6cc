//! [`XdpHost`] on top of aya.

use std::ffi::CString;
use std::io;
use std::path::{Path, PathBuf};

use aya::maps::{HashMap, MapError, PerCpuArray};
use aya::programs::xdp::XdpLinkId;
use aya::programs::{ProgramError, Xdp, XdpFlags};
use aya::{Bpf, BpfError, BpfLoader};
use aya_log::BpfLogger;
use log::warn;
use thiserror::Error;
use upf_xdp_common::{
    counters::NUM_COUNTERS, UpfConfig, ACCESS_PROGRAM, CORE_PROGRAM, PDR_LIST_MAP, STATS_MAP,
    UPF_CONFIG_GLOBAL,
};

use crate::lifecycle::{PortRole, XdpHost};
use crate::stats::Counters;
use crate::table::BpfPdrTable;

#[derive(Debug, Error)]
pub enum AyaHostError {
    #[error("failed to load {}", path.display())]
    Object {
        path: PathBuf,
        #[source]
        source: BpfError,
    },

    #[error("object is not loaded")]
    NotLoaded,

    #[error("program {0} not found")]
    ProgramNotFound(&'static str),

    #[error("map {0} not found")]
    MapNotFound(&'static str),

    #[error("{role} program is not attached")]
    NotAttached { role: PortRole },

    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error(transparent)]
    Map(#[from] MapError),
}

/// Loads the UPF object from a file and attaches its programs to real
/// interfaces.
pub struct AyaHost {
    path: PathBuf,
    bpf: Option<Bpf>,
    links: [Option<XdpLinkId>; 2],
}

impl AyaHost {
    pub fn new(path: impl AsRef<Path>) -> Self {
        AyaHost {
            path: path.as_ref().to_path_buf(),
            bpf: None,
            links: [None, None],
        }
    }

    fn program(role: PortRole) -> &'static str {
        match role {
            PortRole::Access => ACCESS_PROGRAM,
            PortRole::Core => CORE_PROGRAM,
        }
    }

    fn xdp_mut(&mut self, role: PortRole) -> Result<&mut Xdp, AyaHostError> {
        let name = Self::program(role);
        let bpf = self.bpf.as_mut().ok_or(AyaHostError::NotLoaded)?;
        let program = bpf
            .program_mut(name)
            .ok_or(AyaHostError::ProgramNotFound(name))?;
        Ok(program.try_into()?)
    }

    fn open(&mut self, config: &UpfConfig) -> Result<(), AyaHostError> {
        if self.bpf.is_some() {
            return Ok(());
        }
        let mut bpf = BpfLoader::new()
            .set_global(UPF_CONFIG_GLOBAL, config, true)
            .load_file(&self.path)
            .map_err(|source| AyaHostError::Object {
                path: self.path.clone(),
                source,
            })?;
        if let Err(e) = BpfLogger::init(&mut bpf) {
            // This can happen if you remove all log statements from your eBPF program.
            warn!("failed to initialize eBPF logger: {}", e);
        }
        self.bpf = Some(bpf);
        Ok(())
    }
}

impl XdpHost for AyaHost {
    type Table = BpfPdrTable;
    type Error = AyaHostError;

    fn if_index(&self, name: &str) -> io::Result<u32> {
        let c_name = CString::new(name)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let if_index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
        if if_index == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(if_index)
    }

    fn load(&mut self, role: PortRole, config: &UpfConfig) -> Result<(), AyaHostError> {
        self.open(config)?;
        self.xdp_mut(role)?.load()?;
        Ok(())
    }

    fn attach(&mut self, role: PortRole, if_index: u32) -> Result<(), AyaHostError> {
        let link = self
            .xdp_mut(role)?
            .attach_to_if_index(if_index, XdpFlags::DRV_MODE)?;
        self.links[role.index()] = Some(link);
        Ok(())
    }

    fn detach(&mut self, role: PortRole) -> Result<(), AyaHostError> {
        let link = self.links[role.index()]
            .take()
            .ok_or(AyaHostError::NotAttached { role })?;
        self.xdp_mut(role)?.detach(link)?;
        Ok(())
    }

    fn release(&mut self) {
        self.links = [None, None];
        // Dropping the object detaches anything still linked.
        self.bpf = None;
    }

    fn pdr_table(&mut self) -> Result<BpfPdrTable, AyaHostError> {
        let bpf = self.bpf.as_mut().ok_or(AyaHostError::NotLoaded)?;
        let map = bpf
            .take_map(PDR_LIST_MAP)
            .ok_or(AyaHostError::MapNotFound(PDR_LIST_MAP))?;
        Ok(BpfPdrTable::new(HashMap::try_from(map)?))
    }

    fn counters(&self) -> Result<Counters, AyaHostError> {
        let bpf = self.bpf.as_ref().ok_or(AyaHostError::NotLoaded)?;
        let map = bpf
            .map(STATS_MAP)
            .ok_or(AyaHostError::MapNotFound(STATS_MAP))?;
        let stats: PerCpuArray<_, u64> = PerCpuArray::try_from(map)?;

        let mut counters = Counters::default();
        for idx in 0..NUM_COUNTERS {
            let values = stats.get(&idx, 0)?;
            counters.add(idx, values.iter().copied());
        }
        Ok(counters)
    }
}
