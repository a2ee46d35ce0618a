use serde::Serialize;

/// Point-in-time view of an [`AdmissionGate`](crate::AdmissionGate)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateStats {
    /// Maximum number of entries allowed in flight
    pub capacity: usize,
    /// Entries waiting for admission
    pub queued: usize,
    /// Admitted entries not yet released
    pub in_flight: usize,
    /// Total number of admissions since the gate was created
    pub admitted: u64,
    /// Total number of releases since the gate was created
    pub released: u64,
    /// Queued entries whose caller went away before they were admitted
    pub abandoned: u64,
}

impl GateStats {
    /// Number of entries that could be admitted right now
    #[must_use]
    pub const fn available(&self) -> usize {
        self.capacity.saturating_sub(self.in_flight)
    }

    /// `true` if nothing is queued or in flight
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.queued == 0 && self.in_flight == 0
    }
}
