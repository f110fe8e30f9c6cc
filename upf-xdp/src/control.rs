//! Control-plane entry points: bring the programs up, manage rules, tear
//! down.

use log::{debug, info};
use upf_xdp_common::{PdrKey, PdrValue};

use crate::config::{PdrRule, UpfConf};
use crate::lifecycle::{AttachState, AttachmentManager, LifecycleError, XdpHost};
use crate::stats::Counters;
use crate::table::{PdrTable, TableError};

/// A running UPF fast path: the attached programs and their PDR table.
pub struct UpfXdp<H: XdpHost> {
    manager: AttachmentManager<H>,
    table: Option<H::Table>,
}

impl<H: XdpHost> UpfXdp<H> {
    /// Resolves the ports, loads and attaches both programs and opens the
    /// PDR table. On failure nothing is left attached.
    pub fn init(host: H, conf: &UpfConf) -> Result<Self, LifecycleError> {
        let mut manager = AttachmentManager::init(host, &conf.access_port, &conf.core_port)?;

        let table = match Self::bring_up(&mut manager, conf) {
            Ok(table) => table,
            Err(e) => {
                manager.clear();
                return Err(e);
            }
        };

        Ok(UpfXdp {
            manager,
            table: Some(table),
        })
    }

    fn bring_up(
        manager: &mut AttachmentManager<H>,
        conf: &UpfConf,
    ) -> Result<H::Table, LifecycleError> {
        manager.load(&conf.xdp_config())?;
        manager.attach()?;
        manager.pdr_table()
    }

    pub fn add_pdr(&self, key: PdrKey, value: PdrValue) -> Result<(), TableError> {
        self.live_table()?.insert(key, value)?;
        debug!("added {:?} -> {:?}", key, value);
        Ok(())
    }

    pub fn delete_pdr(&self, key: &PdrKey) -> Result<(), TableError> {
        self.live_table()?.remove(key)?;
        debug!("deleted {:?}", key);
        Ok(())
    }

    /// Installs configured rules in order, stopping at the first failure.
    pub fn install(&self, rules: &[PdrRule]) -> Result<usize, TableError> {
        for rule in rules {
            self.add_pdr(rule.key(), rule.value())?;
        }
        if !rules.is_empty() {
            info!("installed {} PDRs", rules.len());
        }
        Ok(rules.len())
    }

    /// Detaches both programs and drops the table. Always succeeds.
    pub fn clear(&mut self) {
        self.table = None;
        self.manager.clear();
    }

    pub fn table(&self) -> Option<&H::Table> {
        self.table.as_ref()
    }

    pub fn counters(&self) -> Result<Counters, LifecycleError> {
        self.manager.counters()
    }

    pub fn state(&self) -> AttachState {
        self.manager.state()
    }

    pub fn manager(&self) -> &AttachmentManager<H> {
        &self.manager
    }

    fn live_table(&self) -> Result<&H::Table, TableError> {
        self.table.as_ref().ok_or(TableError::Closed)
    }
}
