//! Reader failover.
//!
//! Given a topology and a failed host, `ReaderFailoverHandler` races
//! connection attempts against candidate readers in pairs under a per-batch
//! timeout, with the whole run bounded by an overall deadline. A shared
//! cancel signal is handed to every `force_connect` so in-flight opens abort
//! promptly once a deadline expires.

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::core::driver::{CancelSignal, PluginService};
use crate::core::failover::types::{FailoverMode, ReaderFailoverResult};
use crate::core::host::{HostAvailability, HostInfo, HostRole};
use crate::core::props::Properties;

const DEFAULT_MAX_FAILOVER_TIMEOUT_SEC: u64 = 60;
const DEFAULT_BATCH_TIMEOUT_SEC: u64 = 30;
const RETRY_SLEEP: Duration = Duration::from_secs(1);

pub struct ReaderFailoverHandler {
    plugin_service: Arc<dyn PluginService>,
    props: Properties,
    max_failover_timeout: Duration,
    batch_timeout: Duration,
    strict_reader: bool,
    cancel: CancelSignal,
}

impl ReaderFailoverHandler {
    pub fn new(plugin_service: Arc<dyn PluginService>, props: Properties) -> Self {
        Self::with_timeouts(
            plugin_service,
            props,
            DEFAULT_MAX_FAILOVER_TIMEOUT_SEC,
            DEFAULT_BATCH_TIMEOUT_SEC,
        )
    }

    pub fn with_timeouts(
        plugin_service: Arc<dyn PluginService>,
        props: Properties,
        max_failover_timeout_sec: u64,
        timeout_sec: u64,
    ) -> Self {
        let strict_reader = FailoverMode::from_properties(&props) == FailoverMode::StrictReader;
        Self {
            plugin_service,
            props,
            max_failover_timeout: Duration::from_secs(max_failover_timeout_sec),
            batch_timeout: Duration::from_secs(timeout_sec),
            strict_reader,
            cancel: CancelSignal::new(),
        }
    }

    /// Finds a replacement connection after `current_host` was deemed
    /// unavailable. Bounded by the max failover timeout; on expiry the
    /// shared cancel signal is set and the failed sentinel returned.
    pub async fn failover(
        &self,
        current_topology: &[HostInfo],
        current_host: &HostInfo,
    ) -> ReaderFailoverResult {
        if current_topology.is_empty() {
            debug!("failover requested with an empty topology");
            return ReaderFailoverResult::failed();
        }

        match timeout(
            self.max_failover_timeout,
            self.internal_failover_task(current_topology, current_host),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                self.cancel.set();
                debug!("failover timed out");
                ReaderFailoverResult::failed()
            }
        }
    }

    async fn internal_failover_task(
        &self,
        topology: &[HostInfo],
        current_host: &HostInfo,
    ) -> ReaderFailoverResult {
        let mut topology: Vec<HostInfo> = topology.to_vec();

        while !self.cancel.is_set() {
            let result = self.failover_internal(&topology, current_host).await;

            if result.is_connected {
                if !self.strict_reader {
                    return result;
                }

                // Strict mode: the new connection must be to a host that is
                // still a READER in the refreshed topology.
                if self.reader_verified(&result, &mut topology).await {
                    return result;
                }
                if let Some(new_host) = &result.new_host {
                    debug!(host = %new_host.url, "connected host is no longer a reader, retrying");
                }
                if let Some(connection) = &result.connection {
                    if let Err(err) = connection.close().await {
                        debug!(error = %err, "closing the rejected connection failed");
                    }
                }
            } else if result.exception.is_some() {
                // Non-network failure: terminal.
                return result;
            }

            sleep(RETRY_SLEEP).await;
        }

        ReaderFailoverResult::failed()
    }

    /// Refreshes the topology through the new connection and checks that the
    /// connected host is still a READER in it.
    async fn reader_verified(
        &self,
        result: &ReaderFailoverResult,
        topology: &mut Vec<HostInfo>,
    ) -> bool {
        let (Some(connection), Some(new_host)) = (&result.connection, &result.new_host) else {
            return false;
        };
        if self
            .plugin_service
            .force_refresh_host_list(Arc::clone(connection))
            .await
            .is_err()
        {
            return false;
        }
        *topology = self.plugin_service.hosts();
        topology
            .iter()
            .any(|host| host.url == new_host.url && host.role == HostRole::Reader)
    }

    async fn failover_internal(
        &self,
        hosts: &[HostInfo],
        current_host: &HostInfo,
    ) -> ReaderFailoverResult {
        self.plugin_service
            .set_availability(&current_host.all_aliases, HostAvailability::NotAvailable);
        let prioritized = hosts_by_priority(hosts, self.strict_reader);
        self.connect_to_host_group(&prioritized).await
    }

    /// Finds any reader connection without the outer task or strict
    /// verification; returns on the first success.
    pub async fn get_reader_connection(&self, hosts: &[HostInfo]) -> ReaderFailoverResult {
        if hosts.is_empty() {
            debug!("reader connection requested with an empty topology");
            return ReaderFailoverResult::failed();
        }
        let prioritized = reader_hosts_by_priority(hosts);
        self.connect_to_host_group(&prioritized).await
    }

    async fn connect_to_host_group(&self, hosts: &[HostInfo]) -> ReaderFailoverResult {
        let mut index = 0;
        while index < hosts.len() {
            let result = self.next_batch_result(hosts, index).await;
            if result.is_connected || result.exception.is_some() {
                return result;
            }
            sleep(RETRY_SLEEP).await;
            index += 2;
        }
        ReaderFailoverResult::failed()
    }

    /// Races up to two parallel connection attempts. The first attempt to
    /// report a connection or a terminal failure wins; pure network failures
    /// keep the batch waiting for the other attempt. A batch timeout sets
    /// the shared cancel signal.
    async fn next_batch_result(&self, hosts: &[HostInfo], index: usize) -> ReaderFailoverResult {
        let (results_tx, mut results_rx) = mpsc::channel::<ReaderFailoverResult>(2);

        tokio::spawn(attempt_connection(
            Arc::clone(&self.plugin_service),
            self.props.clone(),
            self.cancel.clone(),
            hosts[index].clone(),
            results_tx.clone(),
        ));
        if index + 1 < hosts.len() {
            tokio::spawn(attempt_connection(
                Arc::clone(&self.plugin_service),
                self.props.clone(),
                self.cancel.clone(),
                hosts[index + 1].clone(),
                results_tx.clone(),
            ));
        }
        drop(results_tx);

        let winner = timeout(self.batch_timeout, async {
            while let Some(result) = results_rx.recv().await {
                if result.is_connected || result.exception.is_some() {
                    return Some(result);
                }
            }
            None
        })
        .await;

        // Anything still buffered or in flight lost the race; its
        // connections get closed by the drainer, not re-collected here.
        tokio::spawn(drain_discarded_results(results_rx));

        match winner {
            Ok(Some(result)) => result,
            Ok(None) => ReaderFailoverResult::failed(),
            Err(_) => {
                self.cancel.set();
                ReaderFailoverResult::failed()
            }
        }
    }
}

/// Consumes results that arrive after a batch already resolved, closing any
/// connection they carry. Ends once every attempt in the batch has finished.
async fn drain_discarded_results(mut results: mpsc::Receiver<ReaderFailoverResult>) {
    while let Some(result) = results.recv().await {
        if let Some(connection) = result.connection {
            debug!("closing a connection that lost the batch race");
            if let Err(err) = connection.close().await {
                debug!(error = %err, "closing a discarded connection failed");
            }
        }
    }
}

/// One connection attempt against `host`. Success marks the host AVAILABLE;
/// failure marks it NOT_AVAILABLE, distinguishing iterable network failures
/// from terminal ones. A result the batch no longer wants is closed on the
/// attempt side: by the batch drainer once a winner is picked, or right here
/// when the receiver is already gone and the send fails.
async fn attempt_connection(
    plugin_service: Arc<dyn PluginService>,
    props: Properties,
    cancel: CancelSignal,
    host: HostInfo,
    results: mpsc::Sender<ReaderFailoverResult>,
) {
    debug!(host = %host.url, "attempting reader connection");

    let result = match plugin_service
        .force_connect(&host, &props, Some(cancel))
        .await
    {
        Ok(connection) => {
            plugin_service.set_availability(&host.all_aliases, HostAvailability::Available);
            debug!(host = %host.url, "reader connection succeeded");
            ReaderFailoverResult::connected(connection, host)
        }
        Err(error) => {
            plugin_service.set_availability(&host.all_aliases, HostAvailability::NotAvailable);
            debug!(host = %host.url, error = %error, "reader connection failed");
            if plugin_service.is_network_exception(&error) {
                ReaderFailoverResult::failed()
            } else {
                ReaderFailoverResult::from_error(error)
            }
        }
    };

    if let Err(send_error) = results.send(result).await {
        let discarded = send_error.0;
        if let Some(connection) = discarded.connection {
            if let Err(err) = connection.close().await {
                debug!(error = %err, "closing a discarded connection failed");
            }
        }
    }
}

/// Priority order for failover: active readers shuffled, then the writer
/// (always in reader-or-writer mode, only with zero readers in strict mode),
/// then down hosts shuffled.
pub fn hosts_by_priority(hosts: &[HostInfo], readers_only: bool) -> Vec<HostInfo> {
    let mut active_readers = Vec::new();
    let mut down_hosts = Vec::new();
    let mut writer_host = None;

    for host in hosts {
        if host.role == HostRole::Writer {
            writer_host = Some(host.clone());
            continue;
        }
        if host.availability == HostAvailability::Available {
            active_readers.push(host.clone());
        } else {
            down_hosts.push(host.clone());
        }
    }

    let mut rng = rand::thread_rng();
    active_readers.shuffle(&mut rng);
    down_hosts.shuffle(&mut rng);

    let reader_count = active_readers.len() + down_hosts.len();
    let mut prioritized = active_readers;
    if let Some(writer) = writer_host {
        if !readers_only || reader_count == 0 {
            prioritized.push(writer);
        }
    }
    prioritized.extend(down_hosts);
    prioritized
}

/// Priority order for `get_reader_connection`: readers only, active first,
/// each group shuffled.
pub fn reader_hosts_by_priority(hosts: &[HostInfo]) -> Vec<HostInfo> {
    let mut active_readers = Vec::new();
    let mut down_hosts = Vec::new();

    for host in hosts {
        if host.role == HostRole::Writer {
            continue;
        }
        if host.availability == HostAvailability::Available {
            active_readers.push(host.clone());
        } else {
            down_hosts.push(host.clone());
        }
    }

    let mut rng = rand::thread_rng();
    active_readers.shuffle(&mut rng);
    down_hosts.shuffle(&mut rng);

    active_readers.extend(down_hosts);
    active_readers
}
