use std::time::Duration;

use tokio::runtime::Handle;

use crate::{Config, Engine, ProcwatchError, Result};

#[derive(Default)]
pub struct EngineBuilder {
    config: Config,
    handle: Option<Handle>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn poll_interval(
        mut self,
        interval: Duration,
    ) -> Self {
        self.config.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn fetch_timeout(
        mut self,
        timeout: Option<Duration>,
    ) -> Self {
        self.config.fetch_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// Runtime the background tasks are spawned on. Defaults to the current one.
    pub fn runtime(
        mut self,
        handle: Handle,
    ) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn build(self) -> Result<Engine> {
        if self.config.poll_interval_ms == 0 {
            return Err(ProcwatchError::Config("poll interval must be greater than 0".to_string()));
        }
        let handle = match self.handle {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| ProcwatchError::Engine(format!("no tokio runtime available: {}", e)))?,
        };

        Ok(Engine::new(self.config, handle))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::EngineBuilder;
    use crate::ProcwatchError;

    #[test]
    fn test_build_without_runtime_fails() {
        let result = EngineBuilder::new().build().map(|_| ());
        assert!(matches!(result, Err(ProcwatchError::Engine(_))));
    }

    #[test]
    fn test_build_with_explicit_runtime() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let engine = EngineBuilder::new().runtime(runtime.handle().clone()).poll_interval(Duration::from_millis(100)).build().unwrap();
        assert_eq!(engine.config().poll_interval_ms, 100);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result = EngineBuilder::new().runtime(runtime.handle().clone()).poll_interval(Duration::ZERO).build().map(|_| ());
        assert!(matches!(result, Err(ProcwatchError::Config(_))));
    }
}
