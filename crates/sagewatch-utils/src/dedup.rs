use std::collections::HashSet;

/// Ordered collection of warnings where each distinct message is kept once.
#[derive(Debug, Default, Clone)]
pub struct WarningLog {
    seen: HashSet<String>,
    messages: Vec<String>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning. Returns `false` when an identical message was
    /// already recorded and this one was dropped.
    pub fn record(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if self.seen.contains(&message) {
            return false;
        }
        self.seen.insert(message.clone());
        self.messages.push(message);
        true
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}
