//! Shared test doubles: an in-memory runtime, a scripted probe, and a
//! counting installer.
#![allow(dead_code)]

use async_trait::async_trait;
use provision::{
    CloneSpec, CtStatus, ExecOutput, Probe, ProbeOutcome, ProvisionError, RuntimeClient,
    ServiceInstaller,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

pub fn ok_output() -> ExecOutput {
    ExecOutput {
        stdout: String::new(),
        stderr: String::new(),
        exit_code: 0,
    }
}

pub fn failed_output(exit_code: i32) -> ExecOutput {
    ExecOutput {
        stdout: String::new(),
        stderr: "simulated failure".to_string(),
        exit_code,
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeCt {
    pub running: bool,
    pub snapshots: Vec<String>,
}

#[derive(Default)]
pub struct FakeState {
    pub containers: BTreeMap<u32, FakeCt>,
    /// Operation log, e.g. "clone 902->910", "set 910 net0 <value>".
    pub calls: Vec<String>,
    /// Exit code reported by the named operation ("clone", "set", ...).
    pub fail_ops: BTreeMap<String, i32>,
    /// Scripted exec responses matched by substring; first match wins.
    pub exec_responses: Vec<(String, ExecOutput)>,
    /// When true, shutdown/start report success but observed state never
    /// changes (for waiter timeout tests).
    pub wedge_transitions: bool,
}

/// In-memory RuntimeClient recording every call.
#[derive(Default)]
pub struct FakeRuntime {
    pub state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(self, ctid: u32, running: bool, snapshots: &[&str]) -> Self {
        self.state.lock().unwrap().containers.insert(
            ctid,
            FakeCt {
                running,
                snapshots: snapshots.iter().map(|s| s.to_string()).collect(),
            },
        );
        self
    }

    pub fn fail_op(self, op: &str, exit_code: i32) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_ops
            .insert(op.to_string(), exit_code);
        self
    }

    pub fn wedge_transitions(self) -> Self {
        self.state.lock().unwrap().wedge_transitions = true;
        self
    }

    pub fn respond_to_exec(self, needle: &str, output: ExecOutput) -> Self {
        self.state
            .lock()
            .unwrap()
            .exec_responses
            .push((needle.to_string(), output));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn container(&self, ctid: u32) -> Option<FakeCt> {
        self.state.lock().unwrap().containers.get(&ctid).cloned()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn op_exit(&self, op: &str) -> i32 {
        self.state
            .lock()
            .unwrap()
            .fail_ops
            .get(op)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl RuntimeClient for FakeRuntime {
    async fn status(&self, ctid: u32) -> Result<CtStatus, ProvisionError> {
        self.record(format!("status {ctid}"));
        let state = self.state.lock().unwrap();
        Ok(match state.containers.get(&ctid) {
            Some(ct) => CtStatus {
                exists: true,
                running: ct.running,
            },
            None => CtStatus {
                exists: false,
                running: false,
            },
        })
    }

    async fn clone_container(&self, spec: &CloneSpec) -> Result<ExecOutput, ProvisionError> {
        self.record(format!("clone {}->{}", spec.source_ctid, spec.target_ctid));
        let exit = self.op_exit("clone");
        if exit != 0 {
            return Ok(failed_output(exit));
        }
        self.state
            .lock()
            .unwrap()
            .containers
            .insert(spec.target_ctid, FakeCt::default());
        Ok(ok_output())
    }

    async fn set_property(
        &self,
        ctid: u32,
        key: &str,
        value: &str,
    ) -> Result<ExecOutput, ProvisionError> {
        self.record(format!("set {ctid} {key} {value}"));
        let exit = self.op_exit("set");
        if exit != 0 {
            return Ok(failed_output(exit));
        }
        Ok(ok_output())
    }

    async fn snapshot_list(&self, ctid: u32) -> Result<Vec<String>, ProvisionError> {
        self.record(format!("listsnapshot {ctid}"));
        let state = self.state.lock().unwrap();
        state
            .containers
            .get(&ctid)
            .map(|ct| ct.snapshots.clone())
            .ok_or_else(|| ProvisionError::Runtime(format!("no such container {ctid}")))
    }

    async fn snapshot_create(
        &self,
        ctid: u32,
        name: &str,
    ) -> Result<ExecOutput, ProvisionError> {
        self.record(format!("snapshot {ctid} {name}"));
        let exit = self.op_exit("snapshot");
        if exit != 0 {
            return Ok(failed_output(exit));
        }
        let mut state = self.state.lock().unwrap();
        if let Some(ct) = state.containers.get_mut(&ctid) {
            ct.snapshots.push(name.to_string());
        }
        Ok(ok_output())
    }

    async fn shutdown(&self, ctid: u32) -> Result<ExecOutput, ProvisionError> {
        self.record(format!("shutdown {ctid}"));
        let exit = self.op_exit("shutdown");
        if exit != 0 {
            return Ok(failed_output(exit));
        }
        let mut state = self.state.lock().unwrap();
        if !state.wedge_transitions {
            if let Some(ct) = state.containers.get_mut(&ctid) {
                ct.running = false;
            }
        }
        Ok(ok_output())
    }

    async fn start(&self, ctid: u32) -> Result<ExecOutput, ProvisionError> {
        self.record(format!("start {ctid}"));
        let exit = self.op_exit("start");
        if exit != 0 {
            return Ok(failed_output(exit));
        }
        let mut state = self.state.lock().unwrap();
        if !state.wedge_transitions {
            match state.containers.get_mut(&ctid) {
                Some(ct) => ct.running = true,
                None => return Ok(failed_output(2)),
            }
        }
        Ok(ok_output())
    }

    async fn exec(&self, ctid: u32, cmd: &[String]) -> Result<ExecOutput, ProvisionError> {
        let joined = cmd.join(" ");
        self.record(format!("exec {ctid} {joined}"));
        let state = self.state.lock().unwrap();
        for (needle, output) in &state.exec_responses {
            if joined.contains(needle.as_str()) {
                return Ok(output.clone());
            }
        }
        Ok(ok_output())
    }
}

/// Probe replaying a scripted outcome sequence.
pub struct ScriptedProbe {
    outcomes: Mutex<VecDeque<ProbeOutcome>>,
    pub attempts: Mutex<u32>,
}

impl ScriptedProbe {
    pub fn new(outcomes: Vec<ProbeOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            attempts: Mutex::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn get(&self) -> ProbeOutcome {
        *self.attempts.lock().unwrap() += 1;
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ProbeOutcome::ConnectionFailed)
    }

    fn target(&self) -> String {
        "http://scripted.test/health".to_string()
    }
}

/// ServiceInstaller that flips an in-memory marker and counts calls.
pub struct FakeInstaller {
    installed: Mutex<bool>,
    pub install_calls: Mutex<u32>,
    pub configure_calls: Mutex<u32>,
    pub manage_calls: Mutex<u32>,
    fail_install: bool,
}

impl FakeInstaller {
    pub fn new(installed: bool) -> Self {
        Self {
            installed: Mutex::new(installed),
            install_calls: Mutex::new(0),
            configure_calls: Mutex::new(0),
            manage_calls: Mutex::new(0),
            fail_install: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_install: true,
            ..Self::new(false)
        }
    }

    pub fn install_calls(&self) -> u32 {
        *self.install_calls.lock().unwrap()
    }

    pub fn configure_calls(&self) -> u32 {
        *self.configure_calls.lock().unwrap()
    }

    pub fn manage_calls(&self) -> u32 {
        *self.manage_calls.lock().unwrap()
    }
}

#[async_trait]
impl ServiceInstaller for FakeInstaller {
    fn workload(&self) -> &'static str {
        "fake"
    }

    async fn is_installed(
        &self,
        _runtime: &dyn RuntimeClient,
        _ctid: u32,
    ) -> Result<bool, ProvisionError> {
        Ok(*self.installed.lock().unwrap())
    }

    async fn install(
        &self,
        _runtime: &dyn RuntimeClient,
        ctid: u32,
    ) -> Result<(), ProvisionError> {
        *self.install_calls.lock().unwrap() += 1;
        if self.fail_install {
            return Err(ProvisionError::InstallFailed {
                ctid,
                reason: "simulated install failure".to_string(),
            });
        }
        *self.installed.lock().unwrap() = true;
        Ok(())
    }

    async fn configure(
        &self,
        _runtime: &dyn RuntimeClient,
        _ctid: u32,
    ) -> Result<(), ProvisionError> {
        *self.configure_calls.lock().unwrap() += 1;
        Ok(())
    }

    async fn manage_service(
        &self,
        _runtime: &dyn RuntimeClient,
        _ctid: u32,
    ) -> Result<(), ProvisionError> {
        *self.manage_calls.lock().unwrap() += 1;
        Ok(())
    }

    async fn service_logs(&self, _runtime: &dyn RuntimeClient, _ctid: u32) -> String {
        "(no logs)".to_string()
    }
}
