use std::sync::Arc;

use casewatch_core::Config;
use casewatch_timer::{TargetStore, TimerLifecycle, TimerStore};

pub struct AppState {
    pub config: Config,
    pub targets: Arc<dyn TargetStore>,
    pub timers: Arc<dyn TimerStore>,
    pub lifecycle: TimerLifecycle,
}

impl AppState {
    pub fn new(
        config: Config,
        targets: Arc<dyn TargetStore>,
        timers: Arc<dyn TimerStore>,
    ) -> Self {
        let lifecycle = TimerLifecycle::new(targets.clone(), timers.clone());
        Self {
            config,
            targets,
            timers,
            lifecycle,
        }
    }
}
