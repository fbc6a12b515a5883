//! Controller lifecycle for one manager instance
//!
//! An [`EnergyManager`] owns its input and output state, registers its input
//! items with the shared dispatcher, and runs a fixed-delay evaluation job.
//! Configuration problems stop it in [`ManagerStatus::ConfigurationError`]
//! until it is reconfigured; missing readings only make it
//! [`ManagerStatus::NotReady`] until they arrive.

use crate::config::{ManagerConfig, ManagerSection, OutputChannelDefinition, RawConfiguration};
use crate::engine::{BalancingEngine, CycleOutcome};
use crate::error::{ManagerError, Result};
use crate::events::{ItemEventDispatcher, input_callback};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::output::OutputSink;
use crate::params::{OutputChannel, SocThreshold, parse_output_channels, typed_manager_config};
use crate::state::{InputRole, ManagerState};
use crate::value::{ItemValue, OnOff};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

mod job;

use job::EvaluationJob;

/// Coarse status reported to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerStatus {
    /// Loading configuration
    Initializing,
    /// Evaluating normally
    Online,
    /// Waiting for required readings
    NotReady(String),
    /// Stopped until reconfigured
    ConfigurationError(String),
    /// Disposed
    Offline,
}

impl fmt::Display for ManagerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerStatus::Initializing => write!(f, "Initializing"),
            ManagerStatus::Online => write!(f, "Online"),
            ManagerStatus::NotReady(reason) => write!(f, "NotReady: {}", reason),
            ManagerStatus::ConfigurationError(reason) => {
                write!(f, "ConfigurationError: {}", reason)
            }
            ManagerStatus::Offline => write!(f, "Offline"),
        }
    }
}

/// Commands the host may send to an output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCommand {
    /// Reload configuration and restart evaluation
    Refresh,
}

/// One energy surplus manager
pub struct EnergyManager {
    inner: Arc<ManagerInner>,
}

pub(crate) struct ManagerInner {
    id: String,
    settings: RwLock<RawConfiguration>,
    definitions: RwLock<Vec<OutputChannelDefinition>>,
    config: RwLock<Option<ManagerConfig>>,
    channels: RwLock<Vec<OutputChannel>>,
    state: Arc<ManagerState>,
    dispatcher: Arc<ItemEventDispatcher>,
    sink: Arc<dyn OutputSink>,
    status: watch::Sender<ManagerStatus>,
    was_not_ready: AtomicBool,
    /// Bumped on every teardown; readings from older registrations are dropped
    generation: Arc<AtomicU64>,
    cycle_lock: Mutex<()>,
    job: Mutex<Option<EvaluationJob>>,
    logger: StructuredLogger,
}

impl EnergyManager {
    pub fn new(
        id: impl Into<String>,
        settings: RawConfiguration,
        outputs: Vec<OutputChannelDefinition>,
        dispatcher: Arc<ItemEventDispatcher>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        let id = id.into();
        let (status, _) = watch::channel(ManagerStatus::Initializing);
        let logger = get_logger_with_context(LogContext::new("manager").with_manager_id(&id));
        Self {
            inner: Arc::new(ManagerInner {
                id,
                settings: RwLock::new(settings),
                definitions: RwLock::new(outputs),
                config: RwLock::new(None),
                channels: RwLock::new(Vec::new()),
                state: Arc::new(ManagerState::new()),
                dispatcher,
                sink,
                status,
                was_not_ready: AtomicBool::new(false),
                generation: Arc::new(AtomicU64::new(0)),
                cycle_lock: Mutex::new(()),
                job: Mutex::new(None),
                logger,
            }),
        }
    }

    /// Manager built from one section of the application config
    pub fn from_section(
        section: &ManagerSection,
        dispatcher: Arc<ItemEventDispatcher>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self::new(
            section.id.clone(),
            section.settings.clone(),
            section.outputs.clone(),
            dispatcher,
            sink,
        )
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Load configuration and start evaluating
    pub fn initialize(&self) -> bool {
        self.inner.set_status(ManagerStatus::Initializing);
        let started = self.inner.reinitialize();
        if started {
            self.inner.set_status(ManagerStatus::Online);
        }
        started
    }

    /// Stop evaluating and drop all state
    pub fn dispose(&self) {
        self.inner.stop_job();
        self.inner.dispatcher.unregister_events_for(&self.inner.id);
        {
            let _guard = self.inner.cycle_lock.lock();
            self.inner.reset();
        }
        self.inner.set_status(ManagerStatus::Offline);
        self.inner.logger.info("Disposed");
    }

    /// Replace the manager settings and restart
    pub fn handle_configuration_update(&self, settings: RawConfiguration) -> bool {
        *self.inner.settings.write() = settings;
        self.initialize()
    }

    /// Replace the output channel definitions and restart
    pub fn handle_channels_update(&self, outputs: Vec<OutputChannelDefinition>) -> bool {
        *self.inner.definitions.write() = outputs;
        self.initialize()
    }

    pub fn handle_command(&self, channel: &str, command: ChannelCommand) {
        let known = self
            .inner
            .definitions
            .read()
            .iter()
            .any(|d| d.id == channel);
        if !known {
            self.inner
                .logger
                .warn(&format!("Ignoring {:?} for unknown channel {}", command, channel));
            return;
        }

        match command {
            ChannelCommand::Refresh => {
                self.inner
                    .logger
                    .debug(&format!("Refresh requested by channel {}", channel));
                self.initialize();
            }
        }
    }

    pub fn is_evaluation_job_running(&self) -> bool {
        self.inner
            .job
            .lock()
            .as_ref()
            .is_some_and(EvaluationJob::is_running)
    }

    pub fn status(&self) -> ManagerStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ManagerStatus> {
        self.inner.status.subscribe()
    }

    /// Run one evaluation cycle right away
    pub fn evaluate_now(&self) -> CycleOutcome {
        self.inner.run_cycle(&AtomicBool::new(false))
    }

    /// Write `state` to a channel unless it already has it; `force` always writes
    pub fn update_output_state(&self, channel: &str, state: OnOff, force: bool) -> Result<()> {
        self.inner.update_output_state(channel, state, force)
    }

    pub fn state(&self) -> &ManagerState {
        &self.inner.state
    }

    /// Typed configuration, once loaded
    pub fn config(&self) -> Option<ManagerConfig> {
        self.inner.config.read().clone()
    }

    /// Channels that passed parameter parsing, in declaration order
    pub fn channels(&self) -> Vec<OutputChannel> {
        self.inner.channels.read().clone()
    }
}

impl ManagerInner {
    fn set_status(&self, status: ManagerStatus) {
        self.status.send_replace(status);
    }

    fn stop_job(&self) {
        if let Some(job) = self.job.lock().take() {
            job.stop();
        }
    }

    /// Forget configuration, channels and readings. Caller holds `cycle_lock`.
    fn reset(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.config.write() = None;
        self.channels.write().clear();
        self.state.clear();
        self.was_not_ready.store(false, Ordering::Release);
    }

    /// Tear down and set up again from the current settings.
    ///
    /// Returns false, with the status set to a configuration error, when the
    /// settings are invalid. The job is not started in that case.
    fn reinitialize(self: &Arc<Self>) -> bool {
        self.stop_job();
        self.dispatcher.unregister_events_for(&self.id);
        let _guard = self.cycle_lock.lock();
        self.reset();

        let config = match typed_manager_config(&self.settings.read()) {
            Ok(config) => config,
            Err(e) => {
                self.logger.error(&format!("Invalid configuration: {}", e));
                self.set_status(ManagerStatus::ConfigurationError(e.to_string()));
                return false;
            }
        };

        let channels = parse_output_channels(&self.definitions.read());
        self.logger.info(&format!(
            "Configured with {} output channel(s), refresh every {}s",
            channels.len(),
            config.refresh_interval
        ));

        for channel in &channels {
            if let Err(e) = self.update_output_state(&channel.id, OnOff::Off, true) {
                self.logger
                    .error(&format!("Could not switch {} off: {}", channel.id, e));
            }
        }

        *self.channels.write() = channels;
        *self.config.write() = Some(config.clone());

        let job = EvaluationJob::spawn(
            self.dispatcher.runtime(),
            Arc::downgrade(self),
            Duration::from_secs(config.initial_delay),
            Duration::from_secs(config.refresh_interval),
        );
        *self.job.lock() = Some(job);

        self.register_inputs(&config);
        true
    }

    fn register_inputs(&self, config: &ManagerConfig) {
        let mut items = HashMap::new();
        items.insert(config.production_power.clone(), InputRole::ProductionPower);
        items.insert(config.grid_power.clone(), InputRole::GridPower);
        if let Some(item) = &config.storage_soc {
            items.insert(item.clone(), InputRole::StorageSoc);
        }
        if let Some(item) = &config.storage_power {
            items.insert(item.clone(), InputRole::StoragePower);
        }
        if let Some(item) = &config.electricity_price {
            items.insert(item.clone(), InputRole::ElectricityPrice);
        }
        if let Some(item) = SocThreshold::parse(&config.min_storage_soc).item_name() {
            items.insert(item.to_string(), InputRole::MinStorageSoc);
        }
        if let Some(item) = SocThreshold::parse(&config.max_storage_soc).item_name() {
            items.insert(item.to_string(), InputRole::MaxStorageSoc);
        }

        let state = Arc::clone(&self.state);
        let generation = Arc::clone(&self.generation);
        let registered = generation.load(Ordering::Acquire);
        let callback = input_callback(move |role, event| {
            if generation.load(Ordering::Acquire) != registered {
                debug!("Dropping {} reading from a previous registration", event.item);
                return Ok(());
            }
            if let ItemValue::OnOff(value) = &event.value {
                return Err(ManagerError::invalid_value(
                    event.item.clone(),
                    format!("switch state {} is not a reading for {}", value, role),
                ));
            }
            state.inputs.save(role, event.value.clone());
            Ok(())
        });
        self.dispatcher.register_events_for(&self.id, items, callback);
    }

    fn update_output_state(&self, channel: &str, state: OnOff, force: bool) -> Result<()> {
        if !force && self.state.outputs.output(channel) == Some(state) {
            return Ok(());
        }
        self.sink.apply(&self.id, channel, state)?;
        self.state.outputs.save(channel, state);
        Ok(())
    }

    /// One evaluation cycle; never overlaps another cycle of this manager
    pub(crate) fn run_cycle(&self, cancel: &AtomicBool) -> CycleOutcome {
        let _guard = self.cycle_lock.lock();
        if cancel.load(Ordering::Acquire) {
            return CycleOutcome::Aborted;
        }

        let Some(config) = self.config.read().clone() else {
            return CycleOutcome::NotReady("not configured".to_string());
        };
        let channels = self.channels.read().clone();

        let engine = BalancingEngine::new(&config, &channels, &self.state);
        let outcome = engine.evaluate(Utc::now(), cancel, |channel, state| {
            self.update_output_state(channel, state, false)
        });

        match &outcome {
            CycleOutcome::NotReady(reason) => {
                if !self.was_not_ready.swap(true, Ordering::AcqRel) {
                    self.logger.warn(&format!("Not ready: {}", reason));
                    self.set_status(ManagerStatus::NotReady(reason.clone()));
                }
            }
            CycleOutcome::Aborted => {
                self.logger.debug("Evaluation cycle aborted");
            }
            _ => {
                if self.was_not_ready.swap(false, Ordering::AcqRel) {
                    self.logger.info("All required readings available");
                    self.set_status(ManagerStatus::Online);
                }
            }
        }

        outcome
    }
}
