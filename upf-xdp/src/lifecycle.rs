//! Loading, attaching and detaching the access and core programs.

use std::fmt;
use std::io;

use log::{debug, info, warn};
use thiserror::Error;
use upf_xdp_common::UpfConfig;

use crate::stats::Counters;
use crate::table::{BoxError, PdrTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortRole {
    /// N3, faces the RAN. Carries GTP-U.
    Access,
    /// N6, faces the data network.
    Core,
}

impl PortRole {
    pub const ALL: [PortRole; 2] = [PortRole::Access, PortRole::Core];

    pub fn index(self) -> usize {
        match self {
            PortRole::Access => 0,
            PortRole::Core => 1,
        }
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PortRole::Access => "access",
            PortRole::Core => "core",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortBinding {
    pub role: PortRole,
    pub if_name: String,
    pub if_index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachState {
    Unattached,
    Loaded,
    Attached,
    Detached,
}

impl fmt::Display for AttachState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttachState::Unattached => "unattached",
            AttachState::Loaded => "loaded",
            AttachState::Attached => "attached",
            AttachState::Detached => "detached",
        })
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid {role} port {name:?}")]
    InvalidPort {
        role: PortRole,
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to load the {role} program")]
    LoadFailed {
        role: PortRole,
        #[source]
        source: BoxError,
    },

    #[error("failed to attach the {role} program")]
    AttachFailed {
        role: PortRole,
        #[source]
        source: BoxError,
    },

    #[error("map unavailable")]
    MapUnavailable(#[source] BoxError),

    #[error("cannot {op} while {state}")]
    InvalidState {
        op: &'static str,
        state: AttachState,
    },
}

/// What the attachment manager needs from the kernel.
///
/// `AyaHost` drives real interfaces; tests substitute a recording fake.
pub trait XdpHost {
    type Table: PdrTable;
    type Error: std::error::Error + Send + Sync + 'static;

    fn if_index(&self, name: &str) -> io::Result<u32>;

    /// Loads the program for `role`. The first call also loads the object
    /// with `config` patched in.
    fn load(&mut self, role: PortRole, config: &UpfConfig) -> Result<(), Self::Error>;

    /// Attaches in native (driver) mode.
    fn attach(&mut self, role: PortRole, if_index: u32) -> Result<(), Self::Error>;

    fn detach(&mut self, role: PortRole) -> Result<(), Self::Error>;

    /// Drops the object and everything still held from it.
    fn release(&mut self);

    fn pdr_table(&mut self) -> Result<Self::Table, Self::Error>;

    fn counters(&self) -> Result<Counters, Self::Error>;
}

/// Drives a host through `Unattached -> Loaded -> Attached -> Detached`.
pub struct AttachmentManager<H> {
    host: H,
    ports: [PortBinding; 2],
    attached: [bool; 2],
    state: AttachState,
}

impl<H: XdpHost> AttachmentManager<H> {
    /// Resolves both port names. Nothing is loaded yet.
    pub fn init(host: H, access_port: &str, core_port: &str) -> Result<Self, LifecycleError> {
        let resolve = |role, name: &str| {
            host.if_index(name)
                .map(|if_index| PortBinding {
                    role,
                    if_name: name.to_string(),
                    if_index,
                })
                .map_err(|source| LifecycleError::InvalidPort {
                    role,
                    name: name.to_string(),
                    source,
                })
        };
        let access = resolve(PortRole::Access, access_port)?;
        let core = resolve(PortRole::Core, core_port)?;
        debug!(
            "access port {} ({}), core port {} ({})",
            access.if_name, access.if_index, core.if_name, core.if_index
        );

        Ok(AttachmentManager {
            host,
            ports: [access, core],
            attached: [false; 2],
            state: AttachState::Unattached,
        })
    }

    pub fn load(&mut self, config: &UpfConfig) -> Result<(), LifecycleError> {
        self.expect_state("load", AttachState::Unattached)?;
        for role in PortRole::ALL {
            self.host
                .load(role, config)
                .map_err(|e| LifecycleError::LoadFailed {
                    role,
                    source: e.into(),
                })?;
        }
        self.state = AttachState::Loaded;
        Ok(())
    }

    /// Attaches access then core. If core fails, access is detached again
    /// before the error is returned.
    pub fn attach(&mut self) -> Result<(), LifecycleError> {
        self.expect_state("attach", AttachState::Loaded)?;
        for role in PortRole::ALL {
            let port = &self.ports[role.index()];
            if let Err(e) = self.host.attach(role, port.if_index) {
                self.detach_all();
                return Err(LifecycleError::AttachFailed {
                    role,
                    source: e.into(),
                });
            }
            info!("attached {} program to {}", role, port.if_name);
            self.attached[role.index()] = true;
        }
        self.state = AttachState::Attached;
        Ok(())
    }

    /// Takes the PDR table out of the loaded object.
    pub fn pdr_table(&mut self) -> Result<H::Table, LifecycleError> {
        match self.state {
            AttachState::Loaded | AttachState::Attached => self
                .host
                .pdr_table()
                .map_err(|e| LifecycleError::MapUnavailable(e.into())),
            state => Err(LifecycleError::InvalidState {
                op: "open the PDR table",
                state,
            }),
        }
    }

    pub fn counters(&self) -> Result<Counters, LifecycleError> {
        match self.state {
            AttachState::Loaded | AttachState::Attached => self
                .host
                .counters()
                .map_err(|e| LifecycleError::MapUnavailable(e.into())),
            state => Err(LifecycleError::InvalidState {
                op: "read counters",
                state,
            }),
        }
    }

    /// Detaches whatever is attached and releases the object. Safe to call
    /// in any state, any number of times.
    pub fn clear(&mut self) {
        if self.state == AttachState::Detached {
            return;
        }
        self.detach_all();
        self.host.release();
        self.state = AttachState::Detached;
    }

    pub fn state(&self) -> AttachState {
        self.state
    }

    pub fn port(&self, role: PortRole) -> &PortBinding {
        &self.ports[role.index()]
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    fn detach_all(&mut self) {
        for role in PortRole::ALL {
            if !self.attached[role.index()] {
                continue;
            }
            self.attached[role.index()] = false;
            match self.host.detach(role) {
                Ok(()) => info!(
                    "detached {} program from {}",
                    role,
                    self.ports[role.index()].if_name
                ),
                Err(e) => warn!("failed to detach {} program: {}", role, e),
            }
        }
    }

    fn expect_state(&self, op: &'static str, want: AttachState) -> Result<(), LifecycleError> {
        if self.state == want {
            Ok(())
        } else {
            Err(LifecycleError::InvalidState {
                op,
                state: self.state,
            })
        }
    }
}
