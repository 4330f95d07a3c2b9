//! Startup connectivity probe.
//!
//! Validates the relational store and the broker before the listener comes
//! up. Any failure aborts startup; nothing here runs after boot.

use std::sync::Arc;

use tracing::info;

use crate::traits::{BrokerError, DatabaseClient, DatabaseError, MessageBroker};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("database connectivity check failed: {0}")]
    Database(#[from] DatabaseError),
    #[error("broker connectivity check failed: {0}")]
    Broker(#[from] BrokerError),
}

/// Runs lightweight checks against external services.
pub struct ConnectivityProbe {
    database: Option<Box<dyn DatabaseClient>>,
    broker: Arc<dyn MessageBroker>,
}

impl ConnectivityProbe {
    pub fn new(database: Option<Box<dyn DatabaseClient>>, broker: Arc<dyn MessageBroker>) -> Self {
        Self { database, broker }
    }

    pub fn run(&self) -> Result<(), ProbeError> {
        if let Some(database) = &self.database {
            database.connect()?;
            database.health_check()?;
        }

        self.broker.connect()?;
        self.broker.health_check()?;

        info!("connectivity checks completed");
        Ok(())
    }
}
