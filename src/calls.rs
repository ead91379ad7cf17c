use crate::serializable::{CallOutcome, MockRequest};
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// One intercepted request and what it got back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub request: MockRequest,
    pub outcome: CallOutcome,
}

/// Every dispatched call in arrival order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallList {
    calls: Vec<CallRecord>,
}

impl CallList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, request: MockRequest, outcome: CallOutcome) {
        self.calls.push(CallRecord { request, outcome });
    }

    pub fn reset(&mut self) {
        self.calls.clear();
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CallRecord> {
        self.calls.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CallRecord> {
        self.calls.iter()
    }

    /// How many calls were made to exactly `url`.
    pub fn count_for_url(&self, url: &str) -> usize {
        self.calls
            .iter()
            .filter(|call| call.request.url == url)
            .count()
    }
}

impl Index<usize> for CallList {
    type Output = CallRecord;

    fn index(&self, index: usize) -> &Self::Output {
        &self.calls[index]
    }
}

impl<'a> IntoIterator for &'a CallList {
    type Item = &'a CallRecord;
    type IntoIter = std::slice::Iter<'a, CallRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.calls.iter()
    }
}
