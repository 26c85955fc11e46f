//! Prints the digest as JSON on stdout

use std::io::Write;

use async_trait::async_trait;

use super::{Notifier, NotifyError};
use crate::models::{Filter, ProjectSummary};

pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn render(summaries: &[ProjectSummary]) -> Result<String, NotifyError> {
        Ok(serde_json::to_string_pretty(summaries)?)
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn publish(
        &self,
        summaries: &[ProjectSummary],
        _filter: &Filter,
    ) -> Result<(), NotifyError> {
        let rendered = Self::render(summaries)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{rendered}")?;
        stdout.flush()?;
        Ok(())
    }
}
