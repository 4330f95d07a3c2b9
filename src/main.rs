//! Service entrypoint: verifies connectivity and starts the queue listener.

use std::sync::Arc;

use tracing::info;

use dispatch_engine::api::FleetApiClient;
use dispatch_engine::auth::TokenProvider;
use dispatch_engine::broker::{INCIDENT_QUEUE, LocalBroker};
use dispatch_engine::config::EnvConfig;
use dispatch_engine::engine::AssignmentEngine;
use dispatch_engine::events::EventDispatcher;
use dispatch_engine::handler::IncidentHandler;
use dispatch_engine::listener::QueueListener;
use dispatch_engine::probe::ConnectivityProbe;
use dispatch_engine::scoring::DistanceEnergyScoring;
use dispatch_engine::telemetry;

fn main() {
    if let Err(err) = run() {
        eprintln!("startup failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = EnvConfig::load()?;
    telemetry::init(&config.log_level)?;
    info!("starting dispatch engine");
    info!(
        uri = %config.broker.uri,
        durable = config.broker.durable_queues,
        "broker configuration"
    );

    // In-process broker; a networked connector implements the same trait.
    let broker = Arc::new(LocalBroker::new());

    let probe = ConnectivityProbe::new(None, broker.clone());
    probe.run()?;

    let auth = TokenProvider::new(config.auth.clone())?;
    let api = FleetApiClient::new(config.api.clone(), auth)?;
    let engine = AssignmentEngine::new(api, DistanceEnergyScoring, config.criteria.clone());
    let handler = IncidentHandler::new(
        broker.clone(),
        config.broker.durable_queues,
        Box::new(engine),
    );

    let dispatcher = EventDispatcher::new(vec![Box::new(handler)])?;
    let listener = QueueListener::new(
        broker.clone(),
        vec![INCIDENT_QUEUE.to_string()],
        config.broker.durable_queues,
        dispatcher,
    )?;
    listener.start()?;
    info!(queue = INCIDENT_QUEUE, "engine is running");

    loop {
        std::thread::park();
    }
}
