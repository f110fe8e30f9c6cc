#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use upf_xdp::{Counters, MemoryPdrTable, PdrTable, PortRole, UpfConf, XdpHost};
use upf_xdp_common::{PdrKey, PdrLookup, PdrValue, UpfConfig};

#[derive(Debug, Error)]
#[error("mock failure: {0}")]
pub struct MockError(pub &'static str);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Load(PortRole, UpfConfig),
    Attach(PortRole, u32),
    Detach(PortRole),
    Release,
    Table,
}

/// Shared handle so a test can keep reading the table after `UpfXdp` owns
/// it.
#[derive(Clone, Default)]
pub struct SharedTable(pub Arc<MemoryPdrTable>);

impl PdrTable for SharedTable {
    fn insert(&self, key: PdrKey, value: PdrValue) -> Result<(), upf_xdp::TableError> {
        self.0.insert(key, value)
    }

    fn remove(&self, key: &PdrKey) -> Result<(), upf_xdp::TableError> {
        self.0.remove(key)
    }

    fn get(&self, key: &PdrKey) -> Option<PdrValue> {
        self.0.get(key)
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

impl PdrLookup for SharedTable {
    fn lookup(&self, key: &PdrKey) -> Option<PdrValue> {
        self.0.get(key)
    }
}

/// Call history that outlives the host it was handed to.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|c| pred(c)).count()
    }
}

/// Records every call and fails the ones it is told to.
#[derive(Default)]
pub struct MockHost {
    pub interfaces: HashMap<String, u32>,
    pub fail_load: HashSet<PortRole>,
    pub fail_attach: HashSet<PortRole>,
    pub log: CallLog,
    pub table: SharedTable,
    pub counters: Counters,
}

impl MockHost {
    pub fn new() -> Self {
        MockHost {
            interfaces: HashMap::from([("eth1".to_string(), 3), ("eth2".to_string(), 4)]),
            ..Default::default()
        }
    }

    pub fn failing_attach(role: PortRole) -> Self {
        let mut host = Self::new();
        host.fail_attach.insert(role);
        host
    }

    pub fn failing_load(role: PortRole) -> Self {
        let mut host = Self::new();
        host.fail_load.insert(role);
        host
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.calls()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.log.count(pred)
    }
}

impl XdpHost for MockHost {
    type Table = SharedTable;
    type Error = MockError;

    fn if_index(&self, name: &str) -> io::Result<u32> {
        self.interfaces
            .get(name)
            .copied()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn load(&mut self, role: PortRole, config: &UpfConfig) -> Result<(), MockError> {
        self.log.push(Call::Load(role, *config));
        if self.fail_load.contains(&role) {
            return Err(MockError("load"));
        }
        Ok(())
    }

    fn attach(&mut self, role: PortRole, if_index: u32) -> Result<(), MockError> {
        self.log.push(Call::Attach(role, if_index));
        if self.fail_attach.contains(&role) {
            return Err(MockError("attach"));
        }
        Ok(())
    }

    fn detach(&mut self, role: PortRole) -> Result<(), MockError> {
        self.log.push(Call::Detach(role));
        Ok(())
    }

    fn release(&mut self) {
        self.log.push(Call::Release);
    }

    fn pdr_table(&mut self) -> Result<SharedTable, MockError> {
        self.log.push(Call::Table);
        Ok(self.table.clone())
    }

    fn counters(&self) -> Result<Counters, MockError> {
        Ok(self.counters)
    }
}

pub fn conf() -> UpfConf {
    UpfConf {
        access_port: "eth1".into(),
        core_port: "eth2".into(),
        ..Default::default()
    }
}
