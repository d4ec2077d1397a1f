//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use graph_test_server::config::{ResourceLocator, ServerConfig};
use graph_test_server::graph::GraphDatabase;
use graph_test_server::lifecycle::{Interrupted, PollPolicy, Sleeper};
use graph_test_server::server::{
    ContainerAssembly, ContainerError, ContainerFactory, ContainerStatus, ServerContainer,
};

/// Directory holding the test configuration resources.
pub fn resources_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/resources")
}

/// Default config on a free loopback port, resolving resources from the
/// test resources directory.
pub fn loopback_config() -> ServerConfig {
    graph_test_server::observability::init_test_logging();
    ServerConfig::new("127.0.0.1", 0).with_resource_locator(ResourceLocator::new(vec![resources_dir()]))
}

/// Polling fast enough to keep failure tests short.
pub fn fast_policy() -> PollPolicy {
    PollPolicy::new(Duration::from_millis(10), 6)
}

/// Counters shared between a [`ScriptedFactory`] and the test.
#[derive(Debug, Default)]
pub struct Calls {
    pub assembled: AtomicUsize,
    pub started: AtomicUsize,
    pub status_checks: AtomicUsize,
    pub stopped: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// How scripted containers behave.
#[derive(Debug, Clone)]
pub struct Script {
    /// Statuses returned by successive checks; the last one repeats.
    pub statuses: Vec<ContainerStatus>,
    pub fail_start: bool,
    pub fail_stop: bool,
    pub failure_reason: Option<String>,
}

impl Script {
    pub fn statuses(statuses: Vec<ContainerStatus>) -> Self {
        Self {
            statuses,
            fail_start: false,
            fail_stop: false,
            failure_reason: None,
        }
    }
}

/// Builds containers that replay a [`Script`] instead of serving.
#[derive(Clone)]
pub struct ScriptedFactory {
    script: Script,
    calls: Arc<Calls>,
    fail_assembly: bool,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> (Self, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        (
            Self {
                script,
                calls: calls.clone(),
                fail_assembly: false,
            },
            calls,
        )
    }

    pub fn failing_assembly() -> (Self, Arc<Calls>) {
        let (mut factory, calls) = Self::new(Script::statuses(vec![ContainerStatus::Started]));
        factory.fail_assembly = true;
        (factory, calls)
    }
}

impl ContainerFactory for ScriptedFactory {
    fn assemble(&self, assembly: ContainerAssembly) -> Result<Box<dyn ServerContainer>, ContainerError> {
        self.calls.assembled.fetch_add(1, Ordering::SeqCst);
        if self.fail_assembly {
            return Err(ContainerError::Other("no container for you".to_string()));
        }
        Ok(Box::new(ScriptedContainer {
            script: self.script.clone(),
            remaining: Mutex::new(self.script.statuses.iter().copied().collect()),
            calls: self.calls.clone(),
            database: Arc::new(GraphDatabase::impermanent(assembly.properties.database.properties)),
            port: assembly.endpoint.port(),
        }))
    }
}

pub struct ScriptedContainer {
    script: Script,
    remaining: Mutex<VecDeque<ContainerStatus>>,
    calls: Arc<Calls>,
    database: Arc<GraphDatabase>,
    port: u16,
}

impl ServerContainer for ScriptedContainer {
    fn start(&mut self) -> Result<(), ContainerError> {
        self.calls.started.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_start {
            return Err(ContainerError::Other("start refused".to_string()));
        }
        Ok(())
    }

    fn status(&self) -> ContainerStatus {
        self.calls.status_checks.fetch_add(1, Ordering::SeqCst);
        let mut remaining = self.remaining.lock().unwrap();
        if remaining.len() > 1 {
            remaining.pop_front().unwrap()
        } else {
            remaining.front().copied().unwrap_or(ContainerStatus::Starting)
        }
    }

    fn failure_reason(&self) -> Option<String> {
        self.script.failure_reason.clone()
    }

    fn stop(&mut self) -> Result<(), ContainerError> {
        self.calls.stopped.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_stop {
            return Err(ContainerError::Other("stop exploded".to_string()));
        }
        Ok(())
    }

    fn database(&self) -> Option<Arc<GraphDatabase>> {
        Some(self.database.clone())
    }

    fn base_uri(&self) -> Option<Url> {
        Url::parse(&format!("http://127.0.0.1:{}/", self.port)).ok()
    }
}

/// Sleeps for real but reports every `every`-th wait as interrupted.
#[derive(Debug, Default)]
pub struct InterruptingSleeper {
    pub every: usize,
    pub waits: Arc<AtomicUsize>,
}

impl InterruptingSleeper {
    pub fn new(every: usize) -> Self {
        Self {
            every,
            waits: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Sleeper for InterruptingSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let n = self.waits.fetch_add(1, Ordering::SeqCst) + 1;
        if self.every > 0 && n % self.every == 0 {
            return Err(Interrupted {
                reason: format!("wait {n} interrupted"),
            });
        }
        std::thread::sleep(duration);
        Ok(())
    }
}
