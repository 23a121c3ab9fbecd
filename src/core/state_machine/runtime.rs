//! Collaborators a run needs: configuration, transports and the activity
//! queue.

use super::resource::{
    ActivityQueue, ContainerTransport, FunctionTransport, HttpContainerTransport,
    HttpFunctionTransport, InMemoryActivityQueue,
};
use crate::core::config::RuntimeConfig;
use std::sync::Arc;

#[derive(Clone)]
pub struct Runtime {
    pub config: Arc<RuntimeConfig>,
    pub functions: Arc<dyn FunctionTransport>,
    pub containers: Arc<dyn ContainerTransport>,
    pub activities: Arc<dyn ActivityQueue>,
}

impl Runtime {
    /// HTTP transports against the configured endpoints and an in-memory
    /// activity queue.
    pub fn from_config(config: RuntimeConfig) -> Self {
        RuntimeBuilder::new(config).build()
    }

    pub fn builder(config: RuntimeConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(config)
    }
}

/// Builder used to swap individual collaborators, mostly in tests.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    functions: Option<Arc<dyn FunctionTransport>>,
    containers: Option<Arc<dyn ContainerTransport>>,
    activities: Option<Arc<dyn ActivityQueue>>,
}

impl RuntimeBuilder {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            functions: None,
            containers: None,
            activities: None,
        }
    }

    pub fn with_function_transport(mut self, transport: Arc<dyn FunctionTransport>) -> Self {
        self.functions = Some(transport);
        self
    }

    pub fn with_container_transport(mut self, transport: Arc<dyn ContainerTransport>) -> Self {
        self.containers = Some(transport);
        self
    }

    pub fn with_activity_queue(mut self, queue: Arc<dyn ActivityQueue>) -> Self {
        self.activities = Some(queue);
        self
    }

    pub fn build(self) -> Runtime {
        let functions = self
            .functions
            .unwrap_or_else(|| Arc::new(HttpFunctionTransport::new(&self.config.function)));
        let containers = self
            .containers
            .unwrap_or_else(|| Arc::new(HttpContainerTransport::new(&self.config.container)));
        let activities = self
            .activities
            .unwrap_or_else(|| Arc::new(InMemoryActivityQueue::new()));
        Runtime {
            config: Arc::new(self.config),
            functions,
            containers,
            activities,
        }
    }
}
