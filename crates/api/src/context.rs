use bank_auth::SubjectId;
use bank_core::Deadline;

/// Caller context for a request (verified identity).
///
/// Present on every ledger route; inserted by the identity middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    subject: SubjectId,
}

impl CallerContext {
    pub fn new(subject: SubjectId) -> Self {
        Self { subject }
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }
}

/// Deadline the request must complete by, fixed when the request arrives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestDeadline(pub Deadline);

impl RequestDeadline {
    pub fn get(&self) -> Deadline {
        self.0
    }
}
