use parking_lot::Mutex;

use crate::LogLevel;
use crate::LogLevelControl;
use crate::Result;

/// Records every datasource log-level change.
#[derive(Default)]
pub struct LogLevelRecorder {
    changes: Mutex<Vec<(String, Option<LogLevel>)>>,
}

impl LogLevelRecorder {
    pub fn changes_for(
        &self,
        datasource: &str,
    ) -> Vec<Option<LogLevel>> {
        self.changes
            .lock()
            .iter()
            .filter(|(name, _)| name == datasource)
            .map(|(_, level)| *level)
            .collect()
    }
}

impl LogLevelControl for LogLevelRecorder {
    fn set_datasource_level(
        &self,
        datasource: &str,
        level: Option<LogLevel>,
    ) -> Result<()> {
        self.changes.lock().push((datasource.to_string(), level));
        Ok(())
    }
}
