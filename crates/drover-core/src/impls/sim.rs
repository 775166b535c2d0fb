//! Simulated application, vault and notifier.
//!
//! These stand in for the real external collaborators: they record what
//! was asked of them (phase calls, logins, performed items, notifications)
//! and can be scripted to fail, so the whole state machine is exercisable
//! without any external system.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Payload, RunError};
use crate::ports::{AppControl, Credential, Notifier, NotifyError, Session, Vault};

/// A lifecycle phase call recorded by [`SimApp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Cleanup,
    CloseAll,
    KillAll,
    OpenAll,
}

/// Scripted behavior of the simulated operation for one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimOutcome {
    Succeed,
    /// Fail with a transient error.
    Fail,
    /// Fail with a business-rule error.
    Business,
}

/// State shared between the app and all sessions it spawns.
#[derive(Default)]
struct SimShared {
    script: Mutex<HashMap<String, SimOutcome>>,
    performed: Mutex<Vec<String>>,
    gate_current: AtomicU32,
    gate_peak: AtomicU32,
    gate_entries: AtomicU32,
}

/// Simulated external application.
///
/// Every phase is idempotent and journaled; `open_all` hands out sessions
/// sharing one script and one critical-section occupancy probe, which is
/// how tests observe that the gate is never held twice at once.
pub struct SimApp {
    shared: Arc<SimShared>,
    journal: Mutex<Vec<Phase>>,
    logins: Mutex<Vec<String>>,
    fail_cleanups: AtomicU32,
    fail_opens: AtomicU32,
    sessions_opened: AtomicU32,
}

impl SimApp {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SimShared::default()),
            journal: Mutex::new(Vec::new()),
            logins: Mutex::new(Vec::new()),
            fail_cleanups: AtomicU32::new(0),
            fail_opens: AtomicU32::new(0),
            sessions_opened: AtomicU32::new(0),
        }
    }

    /// Script the operation outcome for one reference. Unscripted
    /// references succeed.
    pub fn script(&self, reference: impl Into<String>, outcome: SimOutcome) {
        self.shared
            .script
            .lock()
            .unwrap()
            .insert(reference.into(), outcome);
    }

    /// Make the next `n` cleanup calls fail transiently.
    pub fn fail_next_cleanups(&self, n: u32) {
        self.fail_cleanups.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` open_all calls fail transiently.
    pub fn fail_next_opens(&self, n: u32) {
        self.fail_opens.store(n, Ordering::SeqCst);
    }

    pub fn journal(&self) -> Vec<Phase> {
        self.journal.lock().unwrap().clone()
    }

    /// Usernames seen by `open_all`, in call order.
    pub fn logins(&self) -> Vec<String> {
        self.logins.lock().unwrap().clone()
    }

    /// References whose operation completed, in completion order.
    pub fn performed(&self) -> Vec<String> {
        self.shared.performed.lock().unwrap().clone()
    }

    /// Highest number of workers ever inside the critical section at once.
    pub fn gate_peak(&self) -> u32 {
        self.shared.gate_peak.load(Ordering::SeqCst)
    }

    /// Total critical-section entries.
    pub fn gate_entries(&self) -> u32 {
        self.shared.gate_entries.load(Ordering::SeqCst)
    }

    /// Total sessions handed out across all `open_all` calls.
    pub fn sessions_opened(&self) -> u32 {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    fn record(&self, phase: Phase) {
        self.journal.lock().unwrap().push(phase);
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for SimApp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AppControl for SimApp {
    async fn cleanup(&self) -> Result<(), RunError> {
        self.record(Phase::Cleanup);
        if Self::take_failure(&self.fail_cleanups) {
            return Err(RunError::transient("simulated cleanup failure"));
        }
        Ok(())
    }

    async fn close_all(&self) -> Result<(), RunError> {
        self.record(Phase::CloseAll);
        Ok(())
    }

    async fn kill_all(&self) -> Result<(), RunError> {
        self.record(Phase::KillAll);
        Ok(())
    }

    async fn open_all(
        &self,
        credential: &Credential,
        count: usize,
    ) -> Result<Vec<Box<dyn Session>>, RunError> {
        self.record(Phase::OpenAll);
        if Self::take_failure(&self.fail_opens) {
            return Err(RunError::transient("simulated login failure"));
        }
        self.logins
            .lock()
            .unwrap()
            .push(credential.username.clone());
        self.sessions_opened
            .fetch_add(count as u32, Ordering::SeqCst);

        let sessions = (0..count)
            .map(|_| {
                Box::new(SimSession {
                    shared: Arc::clone(&self.shared),
                }) as Box<dyn Session>
            })
            .collect();
        Ok(sessions)
    }
}

/// One simulated application session.
pub struct SimSession {
    shared: Arc<SimShared>,
}

impl SimSession {
    /// The part of the operation that is not parallel-safe. The probe
    /// counters record occupancy while the gate is held.
    async fn commit(&self, reference: &str, gate: Arc<tokio::sync::Mutex<()>>) {
        let held = gate.lock().await;
        let now = self.shared.gate_current.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.gate_peak.fetch_max(now, Ordering::SeqCst);
        self.shared.gate_entries.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.shared.gate_current.fetch_sub(1, Ordering::SeqCst);
        drop(held);

        self.shared
            .performed
            .lock()
            .unwrap()
            .push(reference.to_string());
    }
}

#[async_trait]
impl Session for SimSession {
    async fn perform(
        &mut self,
        reference: &str,
        _payload: &Payload,
        gate: Arc<tokio::sync::Mutex<()>>,
    ) -> Result<(), RunError> {
        // The parallel-safe part of the operation.
        tokio::time::sleep(Duration::from_millis(1)).await;

        let outcome = self
            .shared
            .script
            .lock()
            .unwrap()
            .get(reference)
            .copied()
            .unwrap_or(SimOutcome::Succeed);

        match outcome {
            SimOutcome::Succeed => {
                self.commit(reference, gate).await;
                Ok(())
            }
            SimOutcome::Fail => Err(RunError::transient(format!(
                "simulated failure for {reference}"
            ))),
            SimOutcome::Business => Err(RunError::business(format!(
                "{reference} violates a business precondition"
            ))),
        }
    }
}

/// Simulated credential/constant store.
pub struct SimVault {
    credentials: Mutex<HashMap<String, Credential>>,
    constants: Mutex<HashMap<String, String>>,
}

impl SimVault {
    pub fn new() -> Self {
        Self {
            credentials: Mutex::new(HashMap::new()),
            constants: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_credential(&self, name: impl Into<String>, credential: Credential) {
        self.credentials
            .lock()
            .unwrap()
            .insert(name.into(), credential);
    }

    pub fn add_constant(&self, name: impl Into<String>, value: impl Into<String>) {
        self.constants
            .lock()
            .unwrap()
            .insert(name.into(), value.into());
    }
}

impl Default for SimVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Vault for SimVault {
    async fn credential(&self, name: &str) -> Result<Credential, RunError> {
        self.credentials
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| RunError::transient(format!("unknown credential: {name}")))
    }

    async fn constant(&self, name: &str) -> Result<String, RunError> {
        self.constants
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| RunError::transient(format!("unknown constant: {name}")))
    }
}

/// One delivered notification, as recorded by [`RecordingNotifier`].
#[derive(Debug, Clone)]
pub struct Notification {
    pub recipient: String,
    pub process: String,
    pub error: String,
    /// When the diagnostic artifact was captured.
    pub captured_at: DateTime<Utc>,
}

/// Notifier that records deliveries instead of sending them.
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    /// Make every delivery fail, for exercising the best-effort contract.
    pub fn fail_deliveries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        recipient: &str,
        process: &str,
        error: &RunError,
    ) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError("simulated delivery failure".into()));
        }
        self.sent.lock().unwrap().push(Notification {
            recipient: recipient.to_string(),
            process: process.to_string(),
            error: error.to_string(),
            captured_at: Utc::now(),
        });
        Ok(())
    }
}
