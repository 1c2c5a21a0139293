use crate::connector::LiveConnector;
use crate::echo::EchoConnector;
use crate::gemini::GeminiConnector;
use std::collections::HashMap;
use yuletide_core::{LiveConfig, LiveError};

type ConnectorFactory = fn(&LiveConfig) -> Box<dyn LiveConnector>;

pub struct ConnectorRegistry {
    factories: HashMap<String, ConnectorFactory>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("gemini", |config| Box::new(GeminiConnector::new(config)));
        registry.register("echo", |config| {
            Box::new(EchoConnector::new(config.echo_turn_chunks))
        });
        registry
    }

    pub fn register(&mut self, name: &str, factory: ConnectorFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(
        &self,
        name: &str,
        config: &LiveConfig,
    ) -> Result<Box<dyn LiveConnector>, LiveError> {
        self.factories
            .get(name)
            .map(|f| f(config))
            .ok_or_else(|| LiveError::ConnectorNotFound(name.to_string()))
    }

    pub fn list_connectors(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
