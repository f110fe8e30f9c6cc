use std::io::Write;
use std::net::Ipv4Addr;

use upf_xdp::config::{load_conf, parse_conf, ConfigError};
use upf_xdp::{LogLevel, MissPolicy, PdrRule};
use upf_xdp_common::{MissAction, PdrKey, UpfConfig, LOG_LEVEL_DEBUG};

const FULL: &str = r#"
access_port = "ens1f0"
core_port = "ens1f1"
log_level = "debug"
miss_action = "pass"

[[pdr]]
tunnel_dst = "198.18.0.1"
teid = 66
ue_addr = "16.0.0.1"
inet_addr = "8.8.8.8"
ue_port = 40000
inet_port = 53
proto = 17
pdr_id = 1
fse_id = 2
ctr_id = 3
qer_id = 4
far_id = 5

[[pdr]]
tunnel_dst = "198.18.0.1"
teid = 67
ue_addr = "16.0.0.2"
inet_addr = "8.8.4.4"
proto = 1
pdr_id = 2
"#;

#[test]
fn full_file_parses() {
    let conf = parse_conf(FULL).unwrap();
    conf.validate().unwrap();

    assert_eq!(conf.access_port, "ens1f0");
    assert_eq!(conf.log_level, LogLevel::Debug);
    assert_eq!(conf.miss_action, MissPolicy::Pass);
    assert_eq!(
        conf.xdp_config(),
        UpfConfig::new(LOG_LEVEL_DEBUG, MissAction::Pass)
    );

    assert_eq!(conf.rules.len(), 2);
    assert_eq!(
        conf.rules[0].key(),
        PdrKey::new(0xC612_0001, 66, 0x1000_0001, 0x0808_0808, 40000, 53, 17)
    );
    let v = conf.rules[0].value();
    assert_eq!(
        (v.pdr_id(), v.fse_id(), v.ctr_id(), v.qer_id(), v.far_id()),
        (1, 2, 3, 4, 5)
    );
}

#[test]
fn omitted_ports_and_ids_are_zero() {
    let conf = parse_conf(FULL).unwrap();
    let rule: &PdrRule = &conf.rules[1];
    assert_eq!(rule.inet_addr, Ipv4Addr::new(8, 8, 4, 4));
    let key = rule.key();
    assert_eq!((key.ue_port(), key.inet_port(), key.proto()), (0, 0, 1));
    assert_eq!(rule.value().far_id(), 0);
}

#[test]
fn bad_address_is_a_parse_error() {
    let err = parse_conf(
        r#"
        [[pdr]]
        tunnel_dst = "198.18.0.300"
        teid = 1
        ue_addr = "16.0.0.1"
        inet_addr = "8.8.8.8"
        proto = 17
        pdr_id = 1
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn unknown_level_is_rejected() {
    assert!(parse_conf("log_level = \"trace\"").is_err());
}

#[test]
fn loads_from_disk() {
    let path = std::env::temp_dir().join(format!("upf-xdp-conf-{}.toml", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(FULL.as_bytes()).unwrap();
    drop(file);

    let conf = load_conf(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(conf, parse_conf(FULL).unwrap());
}
