use crate::error::{MatchReport, MockError, Result};
use crate::serializable::MockRequest;
use crate::spec::MockSpec;
use std::sync::Arc;

/// Outcome of scanning the registry for a request.
#[derive(Debug, Default)]
pub struct FoundMatch {
    pub spec: Option<Arc<MockSpec>>,
    /// One report per mock that rejected the request, in scan order.
    pub reports: Vec<MatchReport>,
}

/// Registered mocks in match-priority order.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<Arc<MockSpec>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, spec: MockSpec) {
        log::debug!("Registering mock {} {}", spec.method(), spec.url());
        self.entries.push(Arc::new(spec));
    }

    /// Remove every entry equal to `spec`. Returns how many were removed.
    pub fn remove(&mut self, spec: &MockSpec) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| **entry != *spec);
        let removed = before - self.entries.len();
        log::debug!(
            "Removed {removed} mock(s) for {} {}",
            spec.method(),
            spec.url()
        );
        removed
    }

    /// Overwrite the first entry equal to `spec`, keeping its position.
    pub fn replace(&mut self, spec: MockSpec) -> Result<()> {
        match self.entries.iter().position(|entry| **entry == spec) {
            Some(index) => {
                log::debug!(
                    "Replacing mock #{index} {} {}",
                    spec.method(),
                    spec.url()
                );
                self.entries[index] = Arc::new(spec);
                Ok(())
            }
            None => Err(MockError::NotRegistered {
                method: spec.method().to_string(),
                url: spec.url().to_string(),
            }),
        }
    }

    /// Replace the first equal entry, or append when there is none.
    pub fn upsert(&mut self, spec: MockSpec) {
        match self.entries.iter().position(|entry| **entry == spec) {
            Some(index) => self.entries[index] = Arc::new(spec),
            None => self.add(spec),
        }
    }

    pub fn registered(&self) -> Vec<Arc<MockSpec>> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Mocks that were never dispatched.
    pub fn unfired(&self) -> Vec<Arc<MockSpec>> {
        self.entries
            .iter()
            .filter(|entry| entry.call_count() == 0)
            .cloned()
            .collect()
    }

    /// Select the mock answering `request`.
    ///
    /// Entries are tried in insertion order. A lone match stays registered.
    /// When a second match turns up, the first one is taken out of the
    /// registry and answers this request; later requests see the rest.
    pub fn find_match(&mut self, request: &MockRequest) -> FoundMatch {
        let mut found: Option<usize> = None;
        let mut consume = false;
        let mut reports = Vec::new();

        for (index, entry) in self.entries.iter().enumerate() {
            match entry.matches(request) {
                Ok(()) if found.is_some() => {
                    consume = true;
                    break;
                }
                Ok(()) => found = Some(index),
                Err(reason) => reports.push(MatchReport {
                    method: entry.method().to_string(),
                    url: entry.url().to_string(),
                    reason: reason.to_string(),
                }),
            }
        }

        let spec = match found {
            Some(index) if consume => {
                let spec = self.entries.remove(index);
                log::debug!(
                    "Multiple mocks match {} {}; consuming {} {}",
                    request.method,
                    request.url,
                    spec.method(),
                    spec.url()
                );
                Some(spec)
            }
            Some(index) => Some(Arc::clone(&self.entries[index])),
            None => None,
        };

        FoundMatch { spec, reports }
    }
}
