use tracing::debug;

use crate::error::ProbeError;
use crate::system::ProcessTableInterface;

/// Answers "is the target application running?" from the process table
pub struct PresenceProbe<P: ProcessTableInterface> {
    process_table: P,
    target: String,
}

impl<P: ProcessTableInterface> PresenceProbe<P> {
    pub fn new(process_table: P, target: &str) -> Self {
        Self {
            process_table,
            target: target.to_lowercase(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Case-insensitive substring match against every process name
    pub fn is_target_running(&mut self) -> Result<bool, ProbeError> {
        let names = self.process_table.process_names()?;
        let found = names.iter().find(|name| self.matches(name));

        if let Some(name) = found {
            debug!("Target '{}' matched process '{}'", self.target, name);
        }
        Ok(found.is_some())
    }

    fn matches(&self, process_name: &str) -> bool {
        process_name.to_lowercase().contains(&self.target)
    }
}
