//! Property-based tests for the in-process PDR table.
//!
//! Random insert/overwrite/remove sequences are replayed against a plain
//! `HashMap` model of the capacity rule:
//! - a new key is refused once the table is full
//! - overwriting an existing key always succeeds
//! - the table never holds more than its capacity

use std::collections::HashMap;

use proptest::prelude::*;
use upf_xdp::{MemoryPdrTable, PdrTable, TableError};
use upf_xdp_common::{PdrKey, PdrValue};

const CAPACITY: u32 = 8;

#[derive(Clone, Debug)]
enum Op {
    Insert(u32, u32),
    Remove(u32),
}

// A key space a little larger than the table, so sequences hit the limit
// and overwrite often.
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u32..12, any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        1 => (0u32..12).prop_map(Op::Remove),
    ]
}

fn key(i: u32) -> PdrKey {
    PdrKey::new(0x0a00_0001, i, 0x6440_0001, 0x0101_0101, 1000, 443, 6)
}

fn value(v: u32) -> PdrValue {
    PdrValue::new(v as u64, v, v, v, v)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn table_follows_the_capacity_model(ops in proptest::collection::vec(op_strategy(), 0..64)) {
        let table = MemoryPdrTable::with_capacity(CAPACITY);
        let mut model: HashMap<u32, u32> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    let result = table.insert(key(k), value(v));
                    if model.contains_key(&k) || model.len() < CAPACITY as usize {
                        prop_assert!(result.is_ok());
                        model.insert(k, v);
                    } else {
                        prop_assert!(matches!(
                            result,
                            Err(TableError::CapacityExceeded { capacity: CAPACITY })
                        ), "expected CapacityExceeded, got {:?}", result);
                    }
                }
                Op::Remove(k) => {
                    let result = table.remove(&key(k));
                    if model.remove(&k).is_some() {
                        prop_assert!(result.is_ok());
                    } else {
                        prop_assert!(matches!(result, Err(TableError::NotFound)));
                    }
                }
            }
            prop_assert!(table.len() <= CAPACITY as usize);
            prop_assert_eq!(table.len(), model.len());
        }

        for k in 0..12 {
            prop_assert_eq!(table.get(&key(k)), model.get(&k).map(|v| value(*v)));
        }
    }
}
