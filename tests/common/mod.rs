//! Common mock collaborators and helpers for hostguard integration tests.
//!
//! All external seams (`PluginService`, `Dialect`, `Connection`, `Cursor`)
//! get hand-rolled mocks here; individual tests script their behavior per
//! host and inspect the recorded interactions afterwards.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use hostguard::core::driver::{CancelSignal, Connection, Cursor, Dialect, PluginService};
use hostguard::core::error::{
    DefaultExceptionHandler, ExceptionHandler, WrapperError, WrapperResult,
};
use hostguard::core::host::{HostAvailability, HostInfo, HostRole};
use hostguard::core::props::{
    Properties, FAILURE_DETECTION_COUNT, FAILURE_DETECTION_INTERVAL_MS, FAILURE_DETECTION_TIME_MS,
    MONITOR_DISPOSAL_TIME_MS,
};

/// How a mock connection answers sentinel queries.
#[derive(Debug, Clone, Copy)]
pub enum ExecBehavior {
    Succeed,
    FailNetwork,
    /// Sleep this long before answering; used to trip probe timeouts.
    Hang(Duration),
}

pub struct ConnState {
    pub closed: AtomicBool,
    pub execute_count: AtomicUsize,
    pub execute_behavior: Mutex<ExecBehavior>,
}

pub struct MockConnection {
    pub state: Arc<ConnState>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::with_behavior(ExecBehavior::Succeed)
    }

    pub fn with_behavior(behavior: ExecBehavior) -> Self {
        Self {
            state: Arc::new(ConnState {
                closed: AtomicBool::new(false),
                execute_count: AtomicUsize::new(0),
                execute_behavior: Mutex::new(behavior),
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn execute_count(&self) -> usize {
        self.state.execute_count.load(Ordering::SeqCst)
    }

    pub fn set_execute_behavior(&self, behavior: ExecBehavior) {
        *self.state.execute_behavior.lock().unwrap() = behavior;
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn close(&self) -> WrapperResult<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn cursor(&self) -> WrapperResult<Box<dyn Cursor>> {
        Ok(Box::new(MockCursor {
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct MockCursor {
    state: Arc<ConnState>,
}

#[async_trait]
impl Cursor for MockCursor {
    async fn execute(&mut self, _sql: &str) -> WrapperResult<()> {
        self.state.execute_count.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.state.execute_behavior.lock().unwrap();
        match behavior {
            ExecBehavior::Succeed => Ok(()),
            ExecBehavior::FailNetwork => {
                Err(WrapperError::Network("connection reset".to_string()))
            }
            ExecBehavior::Hang(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

pub struct MockDialect {
    pub abort_count: AtomicUsize,
    pub report_closed: AtomicBool,
    handler: DefaultExceptionHandler,
}

impl MockDialect {
    pub fn new() -> Self {
        Self {
            abort_count: AtomicUsize::new(0),
            report_closed: AtomicBool::new(false),
            handler: DefaultExceptionHandler,
        }
    }

    pub fn abort_count(&self) -> usize {
        self.abort_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialect for MockDialect {
    async fn is_closed(&self, _conn: &dyn Connection) -> bool {
        self.report_closed.load(Ordering::SeqCst)
    }

    async fn abort_connection(&self, _conn: &dyn Connection) -> WrapperResult<()> {
        self.abort_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exception_handler(&self) -> &dyn ExceptionHandler {
        &self.handler
    }
}

/// How a scripted `force_connect` behaves for one attempt.
#[derive(Debug, Clone, Copy)]
pub enum ConnectOutcome {
    Succeed,
    FailNetwork,
    FailTerminal,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectScript {
    pub delay: Duration,
    pub outcome: ConnectOutcome,
}

impl ConnectScript {
    pub fn succeed() -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: ConnectOutcome::Succeed,
        }
    }

    pub fn fail_network() -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: ConnectOutcome::FailNetwork,
        }
    }

    pub fn fail_terminal() -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: ConnectOutcome::FailTerminal,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Scriptable `PluginService` that records every interaction.
pub struct MockPluginService {
    pub current_connection: Mutex<Option<Arc<dyn Connection>>>,
    pub current_host_info: Mutex<Option<HostInfo>>,
    pub hosts: Mutex<Vec<HostInfo>>,
    /// Topology installed by `force_refresh_host_list`, when set.
    pub refreshed_hosts: Mutex<Option<Vec<HostInfo>>>,
    pub dialect: Mutex<Option<Arc<MockDialect>>>,
    /// Dialect installed by `update_dialect`, when set.
    pub dialect_after_update: Mutex<Option<Arc<MockDialect>>>,
    pub identify_result: Mutex<Option<HostInfo>>,
    /// Extra aliases added by `fill_aliases`.
    pub fill_alias_with: Mutex<Vec<String>>,
    /// Recorded `set_availability` calls: sorted aliases plus the value.
    pub availability_log: Mutex<Vec<(Vec<String>, HostAvailability)>>,
    /// Per-url scripts consumed by `force_connect`; default is an immediate
    /// success.
    pub connect_scripts: Mutex<HashMap<String, VecDeque<ConnectScript>>>,
    /// Execute behavior stamped onto connections created by `force_connect`.
    pub default_exec_behavior: Mutex<ExecBehavior>,
    /// Every connection `force_connect` handed out, keyed by url.
    pub connections: Mutex<Vec<(String, Arc<MockConnection>)>>,
    /// Every `force_connect` call: url, props, whether a cancel signal came
    /// along.
    pub connect_log: Mutex<Vec<(String, Properties, bool)>>,
    pub force_connect_count: AtomicUsize,
    pub refresh_count: AtomicUsize,
}

impl MockPluginService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current_connection: Mutex::new(None),
            current_host_info: Mutex::new(None),
            hosts: Mutex::new(Vec::new()),
            refreshed_hosts: Mutex::new(None),
            dialect: Mutex::new(Some(Arc::new(MockDialect::new()))),
            dialect_after_update: Mutex::new(None),
            identify_result: Mutex::new(None),
            fill_alias_with: Mutex::new(Vec::new()),
            availability_log: Mutex::new(Vec::new()),
            connect_scripts: Mutex::new(HashMap::new()),
            default_exec_behavior: Mutex::new(ExecBehavior::Succeed),
            connections: Mutex::new(Vec::new()),
            connect_log: Mutex::new(Vec::new()),
            force_connect_count: AtomicUsize::new(0),
            refresh_count: AtomicUsize::new(0),
        })
    }

    pub fn set_current(&self, connection: Arc<MockConnection>, host: HostInfo) {
        *self.current_connection.lock().unwrap() = Some(connection);
        *self.current_host_info.lock().unwrap() = Some(host);
    }

    pub fn mock_dialect(&self) -> Arc<MockDialect> {
        Arc::clone(self.dialect.lock().unwrap().as_ref().expect("dialect set"))
    }

    pub fn clear_dialect(&self) {
        *self.dialect.lock().unwrap() = None;
    }

    pub fn set_default_exec_behavior(&self, behavior: ExecBehavior) {
        *self.default_exec_behavior.lock().unwrap() = behavior;
    }

    pub fn script_connect(&self, url: &str, script: ConnectScript) {
        self.connect_scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(script);
    }

    pub fn connections_for(&self, url: &str) -> Vec<Arc<MockConnection>> {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .filter(|(conn_url, _)| conn_url == url)
            .map(|(_, conn)| Arc::clone(conn))
            .collect()
    }

    pub fn all_connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .map(|(_, conn)| Arc::clone(conn))
            .collect()
    }

    pub fn availability_events(&self) -> Vec<(Vec<String>, HostAvailability)> {
        self.availability_log.lock().unwrap().clone()
    }

    pub fn attempted_urls(&self) -> Vec<String> {
        self.connect_log
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _, _)| url.clone())
            .collect()
    }

    pub fn force_connect_count(&self) -> usize {
        self.force_connect_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginService for MockPluginService {
    fn current_connection(&self) -> Option<Arc<dyn Connection>> {
        self.current_connection.lock().unwrap().clone()
    }

    fn current_host_info(&self) -> Option<HostInfo> {
        self.current_host_info.lock().unwrap().clone()
    }

    fn hosts(&self) -> Vec<HostInfo> {
        self.hosts.lock().unwrap().clone()
    }

    fn dialect(&self) -> Option<Arc<dyn Dialect>> {
        self.dialect
            .lock()
            .unwrap()
            .clone()
            .map(|dialect| dialect as Arc<dyn Dialect>)
    }

    fn host_list_provider(&self) -> String {
        "mock-topology-provider".to_string()
    }

    async fn update_dialect(&self) -> WrapperResult<()> {
        if let Some(dialect) = self.dialect_after_update.lock().unwrap().take() {
            *self.dialect.lock().unwrap() = Some(dialect);
        }
        Ok(())
    }

    async fn force_connect(
        &self,
        host: &HostInfo,
        props: &Properties,
        cancel: Option<CancelSignal>,
    ) -> WrapperResult<Arc<dyn Connection>> {
        self.force_connect_count.fetch_add(1, Ordering::SeqCst);
        self.connect_log.lock().unwrap().push((
            host.url.clone(),
            props.clone(),
            cancel.is_some(),
        ));

        let script = self
            .connect_scripts
            .lock()
            .unwrap()
            .get_mut(&host.url)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(ConnectScript::succeed);

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        if let Some(cancel) = &cancel {
            if cancel.is_set() {
                return Err(WrapperError::Network(format!(
                    "connect to {} cancelled",
                    host.url
                )));
            }
        }

        match script.outcome {
            ConnectOutcome::Succeed => {
                let behavior = *self.default_exec_behavior.lock().unwrap();
                let connection = Arc::new(MockConnection::with_behavior(behavior));
                self.connections
                    .lock()
                    .unwrap()
                    .push((host.url.clone(), Arc::clone(&connection)));
                Ok(connection as Arc<dyn Connection>)
            }
            ConnectOutcome::FailNetwork => Err(WrapperError::Network(format!(
                "no route to {}",
                host.url
            ))),
            ConnectOutcome::FailTerminal => Err(WrapperError::Login(format!(
                "bad credentials for {}",
                host.url
            ))),
        }
    }

    async fn identify_connection(&self) -> WrapperResult<Option<HostInfo>> {
        Ok(self.identify_result.lock().unwrap().clone())
    }

    async fn fill_aliases(
        &self,
        _conn: Option<Arc<dyn Connection>>,
        host_info: &mut HostInfo,
    ) -> WrapperResult<()> {
        for alias in self.fill_alias_with.lock().unwrap().iter() {
            host_info.add_alias(alias);
        }
        Ok(())
    }

    fn set_availability(&self, aliases: &HashSet<String>, availability: HostAvailability) {
        let mut sorted: Vec<String> = aliases.iter().cloned().collect();
        sorted.sort();
        self.availability_log
            .lock()
            .unwrap()
            .push((sorted, availability));
    }

    async fn force_refresh_host_list(&self, _conn: Arc<dyn Connection>) -> WrapperResult<()> {
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        if let Some(hosts) = self.refreshed_hosts.lock().unwrap().clone() {
            *self.hosts.lock().unwrap() = hosts;
        }
        Ok(())
    }

    fn is_network_exception(&self, error: &WrapperError) -> bool {
        DefaultExceptionHandler.is_network_exception(error)
    }
}

// Host and property helpers

pub fn reader(name: &str) -> HostInfo {
    HostInfo::new(name, 5432, HostRole::Reader)
}

pub fn writer(name: &str) -> HostInfo {
    HostInfo::new(name, 5432, HostRole::Writer)
}

pub fn down(mut host: HostInfo) -> HostInfo {
    host.availability = HostAvailability::NotAvailable;
    host
}

pub fn host_with_aliases(name: &str, aliases: &[&str]) -> HostInfo {
    let mut host = reader(name);
    for alias in aliases {
        host.add_alias(alias);
    }
    host
}

/// Properties with explicit detection parameters and a short disposal time.
pub fn detection_props(
    time_ms: u64,
    interval_ms: u64,
    count: u32,
    disposal_ms: u64,
) -> Properties {
    let mut props = Properties::new();
    props.set(FAILURE_DETECTION_TIME_MS.name, &time_ms.to_string());
    props.set(FAILURE_DETECTION_INTERVAL_MS.name, &interval_ms.to_string());
    props.set(FAILURE_DETECTION_COUNT.name, &count.to_string());
    props.set(MONITOR_DISPOSAL_TIME_MS.name, &disposal_ms.to_string());
    props
}
