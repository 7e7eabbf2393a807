//! Arbitration of the single physical input device between sessions.
//!
//! Synthetic input only reaches the focused client window, so at most one
//! session may drive input at any instant. Sessions ask for the device with
//! a priority; the highest priority waiter is granted next, ties go to the
//! earliest request.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::io::{InputDevice, KeyCode, MouseButton};

/// Identifier of a session taking part in arbitration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Arbitration priority of a session. Zero means paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u8);

impl Priority {
    pub const PAUSED: Priority = Priority(0);
    pub const NORMAL: Priority = Priority(50);
    pub const HIGH: Priority = Priority(100);

    pub fn is_paused(self) -> bool {
        self == Self::PAUSED
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

struct Waiter {
    session: SessionId,
    priority: Priority,
    seq: u64,
    tx: oneshot::Sender<()>,
}

#[derive(Default)]
struct ArbiterState {
    holder: Option<SessionId>,
    depth: u32,
    last_holder: Option<SessionId>,
    waiters: Vec<Waiter>,
    next_seq: u64,
}

impl ArbiterState {
    fn best_waiter(&self) -> Option<usize> {
        self.waiters
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.priority.cmp(&b.priority).then(b.seq.cmp(&a.seq)))
            .map(|(idx, _)| idx)
    }

    /// Hand the device to the best live waiter, skipping abandoned ones
    fn grant_next(&mut self) {
        while let Some(idx) = self.best_waiter() {
            let waiter = self.waiters.swap_remove(idx);
            if waiter.tx.send(()).is_ok() {
                self.holder = Some(waiter.session);
                self.depth = 1;
                return;
            }
        }
        self.holder = None;
        self.depth = 0;
    }
}

/// Global input ownership arbiter shared by every session of a manager
pub struct InputArbiter {
    state: Mutex<ArbiterState>,
    warn_after: Duration,
}

impl InputArbiter {
    pub fn new(warn_after: Duration) -> Self {
        Self {
            state: Mutex::new(ArbiterState::default()),
            warn_after,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ArbiterState> {
        // A poisoned lock only means another session panicked mid-update;
        // the state itself stays consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Session currently owning the input device
    pub fn holder(&self) -> Option<SessionId> {
        self.lock().holder
    }

    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Wait until `session` owns the input device.
    ///
    /// Never fails: when the grant takes longer than the warn threshold an
    /// [`EngineError::ArbitrationTimeout`] is logged and waiting continues.
    pub async fn acquire(
        self: &Arc<Self>,
        session: SessionId,
        name: &str,
        priority: Priority,
    ) -> ArbiterGrant {
        let started = Instant::now();

        loop {
            let rx = {
                let mut state = self.lock();
                match state.holder {
                    None => {
                        state.holder = Some(session);
                        state.depth = 1;
                        return self.granted(&mut state, session);
                    }
                    Some(holder) if holder == session => {
                        state.depth += 1;
                        return ArbiterGrant {
                            arbiter: self.clone(),
                            session,
                            switched: false,
                        };
                    }
                    Some(_) => {
                        let (tx, rx) = oneshot::channel();
                        let seq = state.next_seq;
                        state.next_seq += 1;
                        state.waiters.push(Waiter {
                            session,
                            priority,
                            seq,
                            tx,
                        });
                        rx
                    }
                }
            };

            let mut pending = PendingGrant {
                rx: Some(rx),
                arbiter: self.clone(),
                session,
            };

            loop {
                match pending.wait(self.warn_after).await {
                    WaitOutcome::Granted => {
                        let mut state = self.lock();
                        return self.granted(&mut state, session);
                    }
                    WaitOutcome::Abandoned => break,
                    WaitOutcome::StillWaiting => {
                        warn!(
                            target: "arbiter",
                            "{}",
                            EngineError::ArbitrationTimeout {
                                session: name.to_string(),
                                waited: started.elapsed(),
                            }
                        );
                    }
                }
            }
        }
    }

    fn granted(self: &Arc<Self>, state: &mut ArbiterState, session: SessionId) -> ArbiterGrant {
        let switched = state.last_holder != Some(session);
        state.last_holder = Some(session);
        debug!(target: "arbiter", "Input granted to {}", session);
        ArbiterGrant {
            arbiter: self.clone(),
            session,
            switched,
        }
    }

    fn release(&self, session: SessionId) {
        let mut state = self.lock();
        if state.holder != Some(session) {
            return;
        }
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.grant_next();
        }
    }
}

enum WaitOutcome {
    Granted,
    StillWaiting,
    Abandoned,
}

/// Registration in the waiter list; releases a late grant when dropped
struct PendingGrant {
    rx: Option<oneshot::Receiver<()>>,
    arbiter: Arc<InputArbiter>,
    session: SessionId,
}

impl PendingGrant {
    async fn wait(&mut self, warn_after: Duration) -> WaitOutcome {
        let Some(rx) = self.rx.as_mut() else {
            return WaitOutcome::Abandoned;
        };
        match tokio::time::timeout(warn_after, rx).await {
            Ok(Ok(())) => {
                self.rx = None;
                WaitOutcome::Granted
            }
            Ok(Err(_)) => {
                self.rx = None;
                WaitOutcome::Abandoned
            }
            Err(_) => WaitOutcome::StillWaiting,
        }
    }
}

impl Drop for PendingGrant {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                self.arbiter.release(self.session);
            }
        }
    }
}

/// Ownership of the input device; released on drop
pub struct ArbiterGrant {
    arbiter: Arc<InputArbiter>,
    session: SessionId,
    switched: bool,
}

impl ArbiterGrant {
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Whether another session held the device before this grant
    pub fn switched(&self) -> bool {
        self.switched
    }
}

impl Drop for ArbiterGrant {
    fn drop(&mut self) {
        self.arbiter.release(self.session);
    }
}

/// Input device access, only obtainable through arbitration.
///
/// Every input primitive of a session goes through a lease, so operations
/// issued under one lease are strictly ordered and never interleave with
/// another session's input.
pub struct InputLease {
    _grant: ArbiterGrant,
    device: Arc<dyn InputDevice>,
}

impl InputLease {
    pub(crate) fn new(grant: ArbiterGrant, device: Arc<dyn InputDevice>) -> Self {
        if grant.switched() {
            device.activate_window();
        }
        Self {
            _grant: grant,
            device,
        }
    }

    pub fn press_key(&self, key: KeyCode) {
        self.device.press_key(key);
    }

    pub fn click(&self, button: MouseButton, x: i32, y: i32) {
        self.device.click(button, x, y);
    }

    pub fn move_pointer(&self, x: i32, y: i32) {
        self.device.move_pointer(x, y);
    }

    pub fn ascii_code(&self, ch: char) -> KeyCode {
        self.device.ascii_code(ch)
    }

    /// Type text one key press per character
    pub fn type_text(&self, text: &str) {
        for ch in text.chars() {
            self.device.press_key(self.device.ascii_code(ch));
        }
    }
}
