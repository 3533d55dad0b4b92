//! Host priority ordering for failover candidate lists.

use hostguard::core::failover::{hosts_by_priority, reader_hosts_by_priority, FailoverMode};
use hostguard::core::props::{Properties, FAILOVER_MODE};

use crate::common::{down, reader, writer};

#[test]
fn failover_mode_parses_from_properties() {
    let mut props = Properties::new();
    assert_eq!(
        FailoverMode::from_properties(&props),
        FailoverMode::ReaderOrWriter
    );

    props.set(FAILOVER_MODE.name, "strict-reader");
    assert_eq!(
        FailoverMode::from_properties(&props),
        FailoverMode::StrictReader
    );

    props.set(FAILOVER_MODE.name, "something-else");
    assert_eq!(
        FailoverMode::from_properties(&props),
        FailoverMode::ReaderOrWriter
    );
}

#[test]
fn active_readers_come_first_then_writer_then_down_hosts() {
    let hosts = vec![
        writer("w"),
        reader("r1"),
        down(reader("r2")),
        reader("r3"),
        down(reader("r4")),
    ];

    let prioritized = hosts_by_priority(&hosts, false);

    assert_eq!(prioritized.len(), 5);
    let actives: Vec<&str> = prioritized[..2].iter().map(|h| h.host.as_str()).collect();
    assert!(actives.contains(&"r1") && actives.contains(&"r3"));
    assert_eq!(prioritized[2].host, "w");
    let downs: Vec<&str> = prioritized[3..].iter().map(|h| h.host.as_str()).collect();
    assert!(downs.contains(&"r2") && downs.contains(&"r4"));
}

#[test]
fn strict_mode_excludes_the_writer_while_readers_exist() {
    let hosts = vec![writer("w"), down(reader("r1"))];

    let prioritized = hosts_by_priority(&hosts, true);

    assert_eq!(prioritized.len(), 1);
    assert_eq!(prioritized[0].host, "r1");
}

#[test]
fn strict_mode_keeps_the_writer_when_no_readers_remain() {
    let hosts = vec![writer("w")];

    let prioritized = hosts_by_priority(&hosts, true);

    assert_eq!(prioritized.len(), 1);
    assert_eq!(prioritized[0].host, "w");
}

#[test]
fn reader_priority_never_contains_the_writer() {
    let hosts = vec![writer("w"), reader("r1"), down(reader("r2"))];

    let prioritized = reader_hosts_by_priority(&hosts);

    assert_eq!(prioritized.len(), 2);
    assert_eq!(prioritized[0].host, "r1");
    assert_eq!(prioritized[1].host, "r2");
}
