//! Scripted transport and event source
//!
//! Each dial consumes the next scripted session. A session either fails to
//! dial or yields its frames in order and then reports the connection lost.
//! Once all sessions are used up every dial fails.

use async_trait::async_trait;
use deflux::error::{DefluxError, Result};
use deflux::events::{DecodedEvent, EventSource, FrameConnection, Transport};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// One step of a scripted connection
#[derive(Debug, Clone)]
pub enum Step {
    Frame(Vec<u8>),
    /// Transport level failure
    Fail(String),
    /// Hold the read for a while before moving on
    Pause(Duration),
}

impl Step {
    pub fn frame(frame: &str) -> Self {
        Step::Frame(frame.as_bytes().to_vec())
    }
}

/// Script for one dial
#[derive(Debug, Clone)]
pub enum Session {
    Refuse(String),
    Accept(Vec<Step>),
}

#[derive(Default)]
struct TransportState {
    sessions: Mutex<VecDeque<Session>>,
    dials: AtomicUsize,
    closes: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<TransportState>,
}

impl ScriptedTransport {
    pub fn new(sessions: Vec<Session>) -> Self {
        let transport = Self::default();
        *transport.state.sessions.lock().unwrap() = sessions.into();
        transport
    }

    /// Number of dial attempts so far
    pub fn dials(&self) -> usize {
        self.state.dials.load(Ordering::SeqCst)
    }

    /// Number of connections closed so far
    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn address() -> Url {
        Url::parse("ws://127.0.0.1:443/").unwrap()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn dial(&self, address: &Url) -> Result<Box<dyn FrameConnection>> {
        self.state.dials.fetch_add(1, Ordering::SeqCst);
        let session = self.state.sessions.lock().unwrap().pop_front();
        match session {
            Some(Session::Accept(steps)) => Ok(Box::new(ScriptedConnection {
                steps: steps.into(),
                state: self.state.clone(),
            })),
            Some(Session::Refuse(reason)) => Err(DefluxError::dial_failed(address, reason)),
            None => Err(DefluxError::dial_failed(address, "connection refused")),
        }
    }
}

struct ScriptedConnection {
    steps: VecDeque<Step>,
    state: Arc<TransportState>,
}

#[async_trait]
impl FrameConnection for ScriptedConnection {
    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        loop {
            match self.steps.pop_front() {
                Some(Step::Frame(frame)) => return Ok(frame),
                Some(Step::Fail(reason)) => return Err(DefluxError::connection_lost(reason)),
                Some(Step::Pause(delay)) => tokio::time::sleep(delay).await,
                None => return Err(DefluxError::connection_lost("end of script")),
            }
        }
    }

    async fn close(&mut self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Event source whose connect always fails
#[derive(Clone, Default)]
pub struct UnreachableSource {
    connects: Arc<AtomicUsize>,
}

impl UnreachableSource {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for UnreachableSource {
    async fn connect(&mut self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Err(DefluxError::dial_failed("ws://192.0.2.1:443/", "no route to host"))
    }

    async fn read_next(&mut self) -> Result<DecodedEvent> {
        Err(DefluxError::connection_lost("never connected"))
    }

    async fn close(&mut self) {}
}
