//! Registration state cached from the last BootNotification exchange.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationState {
    /// No BootNotification answered yet.
    #[default]
    Unknown,
    Pending,
    Accepted,
    Rejected,
}

impl RegistrationState {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}
