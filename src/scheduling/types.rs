use crate::scheduling::trigger_registry::TriggerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    Registered(TriggerId),
    Deregistered { removed: usize },
    NoChange { registered: bool },
}

impl ReconcileAction {
    pub fn is_registered_after(&self) -> bool {
        match self {
            Self::Registered(_) => true,
            Self::Deregistered { .. } => false,
            Self::NoChange { registered } => *registered,
        }
    }
}
