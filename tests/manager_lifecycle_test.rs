use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use surplus_manager::config::{OutputChannelDefinition, RawConfiguration};
use surplus_manager::engine::CycleOutcome;
use surplus_manager::events::{EventBus, EventKind, ItemEvent, ItemEventDispatcher};
use surplus_manager::manager::{EnergyManager, ManagerStatus};
use surplus_manager::output::RecordingSink;
use surplus_manager::state::InputRole;
use surplus_manager::value::{ItemValue, OnOff};

fn settings() -> RawConfiguration {
    serde_json::from_value(json!({
        "refreshInterval": 10,
        "initialDelay": 5,
        "peakProductionPower": 6000,
        "productionPower": "PV_Power",
        "gridPower": "Grid_Power"
    }))
    .unwrap()
}

fn channel(id: &str, load: u32, priority: i32) -> OutputChannelDefinition {
    OutputChannelDefinition {
        id: id.to_string(),
        parameters: serde_json::from_value(json!({"loadPower": load, "priority": priority}))
            .unwrap(),
    }
}

struct Harness {
    bus: EventBus,
    dispatcher: Arc<ItemEventDispatcher>,
    sink: Arc<RecordingSink>,
    manager: EnergyManager,
}

impl Harness {
    fn new(outputs: Vec<OutputChannelDefinition>) -> Self {
        let dispatcher = Arc::new(ItemEventDispatcher::from_current().unwrap());
        let bus = EventBus::new();
        bus.subscribe(dispatcher.clone());
        let sink = Arc::new(RecordingSink::new());
        let manager = EnergyManager::new(
            "house",
            settings(),
            outputs,
            dispatcher.clone(),
            sink.clone(),
        );
        Self {
            bus,
            dispatcher,
            sink,
            manager,
        }
    }

    async fn publish(&self, item: &str, value: ItemValue) {
        self.bus.publish(&ItemEvent::state_changed(item, value));
        settle().await;
    }
}

/// Let spawned dispatch tasks run without moving the paused clock
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn first_cycle_waits_for_initial_delay_then_repeats() {
    let h = Harness::new(vec![channel("boiler", 500, 1)]);
    assert!(h.manager.initialize());
    h.sink.clear();

    h.publish("PV_Power", ItemValue::Decimal(3000.0)).await;
    h.publish("Grid_Power", ItemValue::Decimal(-1000.0)).await;

    tokio::time::sleep(Duration::from_secs(4)).await;
    settle().await;
    assert!(h.sink.applied().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(h.sink.applied(), vec![("boiler".to_string(), OnOff::On)]);

    // The boiler takes its 500W; surplus drops below its threshold
    h.publish("Grid_Power", ItemValue::Decimal(600.0)).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(
        h.sink.applied(),
        vec![
            ("boiler".to_string(), OnOff::On),
            ("boiler".to_string(), OnOff::Off)
        ]
    );

    h.manager.dispose();
}

#[tokio::test(start_paused = true)]
async fn not_ready_is_reported_once_and_cleared() {
    let h = Harness::new(vec![channel("boiler", 500, 1)]);
    let mut status = h.manager.subscribe_status();
    assert!(h.manager.initialize());
    assert_eq!(*status.borrow_and_update(), ManagerStatus::Online);

    assert!(matches!(
        h.manager.evaluate_now(),
        CycleOutcome::NotReady(_)
    ));
    assert!(status.has_changed().unwrap());
    assert!(matches!(
        *status.borrow_and_update(),
        ManagerStatus::NotReady(_)
    ));

    // Still missing: no new status
    h.manager.evaluate_now();
    assert!(!status.has_changed().unwrap());

    h.publish("PV_Power", ItemValue::Decimal(0.0)).await;
    h.publish("Grid_Power", ItemValue::Decimal(100.0)).await;
    h.manager.evaluate_now();
    assert_eq!(*status.borrow_and_update(), ManagerStatus::Online);

    h.manager.dispose();
    assert_eq!(*status.borrow_and_update(), ManagerStatus::Offline);
}

#[tokio::test(start_paused = true)]
async fn switch_states_are_rejected_for_numeric_inputs() {
    let h = Harness::new(vec![channel("boiler", 500, 1)]);
    assert!(h.manager.initialize());

    h.publish("PV_Power", ItemValue::OnOff(OnOff::On)).await;
    assert!(h.manager.state().inputs.get(InputRole::ProductionPower).is_none());

    h.publish("PV_Power", "1500 W".parse().unwrap()).await;
    assert_eq!(
        h.manager.state().inputs.decimal(InputRole::ProductionPower),
        Some(1500.0)
    );
    h.manager.dispose();
}

#[tokio::test(start_paused = true)]
async fn command_events_never_reach_the_manager() {
    let h = Harness::new(vec![channel("boiler", 500, 1)]);
    assert!(h.manager.initialize());

    let delivered = h.bus.publish(&ItemEvent::new(
        "PV_Power",
        EventKind::ItemCommand,
        ItemValue::Decimal(42.0),
    ));
    settle().await;
    assert_eq!(delivered, 0);
    assert!(h.manager.state().inputs.is_empty());
    h.manager.dispose();
}

#[tokio::test(start_paused = true)]
async fn configuration_update_restarts_with_clean_state() {
    let h = Harness::new(vec![channel("boiler", 500, 1)]);
    assert!(h.manager.initialize());
    h.publish("PV_Power", ItemValue::Decimal(2000.0)).await;
    assert!(!h.manager.state().inputs.is_empty());

    let mut updated = settings();
    updated.insert("gridPower".to_string(), json!("Meter_Power"));
    assert!(h.manager.handle_configuration_update(updated));

    assert!(h.manager.state().inputs.is_empty());
    assert_eq!(h.dispatcher.registration_count("Grid_Power"), 0);
    assert_eq!(h.dispatcher.registration_count("Meter_Power"), 1);
    assert!(h.manager.is_evaluation_job_running());

    let mut broken = settings();
    broken.insert("refreshInterval".to_string(), json!(1));
    assert!(!h.manager.handle_configuration_update(broken));
    assert!(matches!(
        h.manager.status(),
        ManagerStatus::ConfigurationError(_)
    ));
    assert!(!h.manager.is_evaluation_job_running());
    assert_eq!(h.dispatcher.registration_count("PV_Power"), 0);
}

#[tokio::test(start_paused = true)]
async fn dispose_stops_the_schedule() {
    let h = Harness::new(vec![channel("boiler", 500, 1)]);
    assert!(h.manager.initialize());
    h.publish("PV_Power", ItemValue::Decimal(3000.0)).await;
    h.publish("Grid_Power", ItemValue::Decimal(-1000.0)).await;
    h.manager.dispose();
    h.sink.clear();

    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;
    assert!(h.sink.applied().is_empty());
    assert!(!h.manager.is_evaluation_job_running());
}

#[tokio::test(start_paused = true)]
async fn invalid_channels_are_skipped() {
    let h = Harness::new(vec![
        channel("boiler", 500, 1),
        OutputChannelDefinition {
            id: "broken".to_string(),
            parameters: serde_json::from_value(json!({"priority": 2})).unwrap(),
        },
    ]);
    assert!(h.manager.initialize());
    let ids: Vec<String> = h.manager.channels().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["boiler".to_string()]);
    assert_eq!(h.sink.applied(), vec![("boiler".to_string(), OnOff::Off)]);
    h.manager.dispose();
}

#[tokio::test(start_paused = true)]
async fn evaluation_after_dispose_keeps_manager_offline() {
    let h = Harness::new(vec![channel("boiler", 500, 1)]);
    assert!(h.manager.initialize());
    h.publish("PV_Power", ItemValue::Decimal(3000.0)).await;
    h.publish("Grid_Power", ItemValue::Decimal(-1000.0)).await;
    h.manager.dispose();
    h.sink.clear();

    assert!(matches!(
        h.manager.evaluate_now(),
        CycleOutcome::NotReady(_)
    ));
    assert_eq!(h.manager.status(), ManagerStatus::Offline);
    assert!(h.manager.config().is_none());
    assert!(h.manager.channels().is_empty());
    assert!(h.sink.applied().is_empty());
}

#[tokio::test(start_paused = true)]
async fn readings_in_flight_during_dispose_are_dropped() {
    let h = Harness::new(vec![channel("boiler", 500, 1)]);
    assert!(h.manager.initialize());

    // Dispatched before dispose, delivered after it
    let delivered = h
        .bus
        .publish(&ItemEvent::state_changed("PV_Power", ItemValue::Decimal(3000.0)));
    assert_eq!(delivered, 1);
    h.manager.dispose();
    settle().await;

    assert!(h.manager.state().inputs.is_empty());
}

#[tokio::test(start_paused = true)]
async fn readings_in_flight_during_reconfiguration_are_dropped() {
    let h = Harness::new(vec![channel("boiler", 500, 1)]);
    assert!(h.manager.initialize());

    h.bus
        .publish(&ItemEvent::state_changed("PV_Power", ItemValue::Decimal(3000.0)));
    assert!(h.manager.handle_configuration_update(settings()));
    settle().await;
    assert!(h.manager.state().inputs.is_empty());

    // The fresh registration takes readings again
    h.publish("PV_Power", ItemValue::Decimal(2500.0)).await;
    assert_eq!(
        h.manager.state().inputs.decimal(InputRole::ProductionPower),
        Some(2500.0)
    );
    h.manager.dispose();
}
