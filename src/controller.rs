use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    Command, Result, ScannerError, ScannerState, StateReport,
    bus::{EventBus, Registration},
    config::ScannerConfig,
    gateway::{ClaimRequest, ReleaseRequest, ScannerGateway},
    listener::ScanEventListener,
    session::{ReadSession, ScanStream, StateCell},
};

/// reply to a command dispatched by action name
pub enum CommandOutput {
    /// the command succeeded without a payload
    Done,
    /// `{"state": n}`
    State(Value),
    /// multi-shot stream of scans
    Stream(ScanStream),
}

/// lifecycle of one scanner bridge session
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use anyhow::Result;
/// use intent_barcodescanner::{bus::LocalEventBus, config::ScannerConfig};
/// use intent_barcodescanner::{controller::ScannerController, gateway::TracingGateway};
///
/// fn main() -> Result<()> {
///     let bus = Arc::new(LocalEventBus::new());
///     let mut scanner = ScannerController::new(ScannerConfig::default(), Arc::new(TracingGateway), bus);
///     scanner.init()?;
///     for scan in scanner.read()? {
///         let scan = scan?;
///         println!("{}: {}", scan.format, scan.text);
///     }
///     Ok(())
/// }
/// ```
pub struct ScannerController {
    config: ScannerConfig,
    state: Arc<StateCell>,
    gateway: Arc<dyn ScannerGateway>,
    bus: Arc<dyn EventBus>,
    listener: Arc<ScanEventListener>,
    registration: Option<Registration>,
    session: Option<ReadSession>,
}

impl ScannerController {
    /// create the bridge, nothing is registered or claimed until `init`
    pub fn new(
        config: ScannerConfig,
        gateway: Arc<dyn ScannerGateway>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        let listener = Arc::new(ScanEventListener::new(&config));
        ScannerController {
            config,
            state: Arc::new(StateCell::new(ScannerState::None)),
            gateway,
            bus,
            listener,
            registration: None,
            session: None,
        }
    }

    pub fn state(&self) -> ScannerState {
        self.state.get()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// whether the scan listener is currently subscribed
    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    /// register the scan listener and claim the scanner
    ///
    /// Calling `init` again re-sends the claim without registering a second listener.
    /// Rejected while a read session is active and after `destroy`.
    pub fn init(&mut self) -> Result<()> {
        let state = self.state.get();
        if matches!(
            state,
            ScannerState::Reading | ScannerState::Read | ScannerState::Destroyed
        ) {
            return Err(ScannerError::invalid_state(Command::Init.action(), state));
        }
        if self.registration.is_none() {
            let registration = Registration::new(self.bus.clone(), self.listener.clone())
                .map_err(ScannerError::Registration)?;
            self.registration = Some(registration);
        }
        // a failed session has already ended, collect its worker
        if let Some(session) = self.session.take() {
            session.stop();
        }
        self.listener.detach();
        self.claim();
        self.state.set(ScannerState::Ready);
        info!("scanner ready");
        Ok(())
    }

    /// start streaming scans, only accepted while ready
    pub fn read(&mut self) -> Result<ScanStream> {
        self.state
            .transition(ScannerState::Ready, ScannerState::Reading)
            .map_err(|state| ScannerError::invalid_state(Command::Read.action(), state))?;
        debug!("reading...");
        match ReadSession::start(self.state.clone(), &self.listener, &self.config) {
            Ok((session, stream)) => {
                self.session = Some(session);
                Ok(stream)
            }
            Err(err) => {
                error!("{}", err);
                self.state.set(ScannerState::Error);
                Err(err)
            }
        }
    }

    /// stop reading, unsubscribe the listener and release the scanner
    ///
    /// Safe to call repeatedly, only the first call has any effect.
    pub fn destroy(&mut self) -> Result<()> {
        if self.state.get() == ScannerState::Destroyed {
            debug!("already destroyed");
            return Ok(());
        }
        self.state.set(ScannerState::Destroyed);
        self.listener.detach();
        if let Some(session) = self.session.take() {
            session.stop();
        }
        self.registration.take();
        self.release();
        info!("scanner destroyed");
        Ok(())
    }

    /// report the current state as `{"state": n}`
    pub fn get_state(&self) -> Result<Value> {
        serde_json::to_value(StateReport::from(self.state.get())).map_err(|err| {
            error!("unable to encode state: {}", err);
            self.state.set(ScannerState::Error);
            ScannerError::Serialization(err)
        })
    }

    /// dispatch a command by the action name the host bridge uses
    pub fn execute(&mut self, action: &str) -> Result<CommandOutput> {
        debug!("action: {}", action);
        let Some(command) = Command::from_action(action) else {
            return Err(ScannerError::invalid_state(action, self.state.get()));
        };
        match command {
            Command::Init => self.init().map(|_| CommandOutput::Done),
            Command::Destroy => self.destroy().map(|_| CommandOutput::Done),
            Command::Read => self.read().map(CommandOutput::Stream),
            Command::GetState => self.get_state().map(CommandOutput::State),
        }
    }

    fn claim(&self) {
        let request = ClaimRequest::new(&self.config);
        if let Err(err) = self.gateway.claim(&request) {
            warn!("claim request failed: {:#}", err);
        }
    }

    fn release(&self) {
        let request = ReleaseRequest::new(&self.config);
        if let Err(err) = self.gateway.release(&request) {
            warn!("release request failed: {:#}", err);
        }
    }
}

impl Drop for ScannerController {
    fn drop(&mut self) {
        if self.state.get() != ScannerState::Destroyed {
            debug!("session teardown without destroy");
            let _ = self.destroy();
        }
    }
}
