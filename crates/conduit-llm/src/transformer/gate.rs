/// One-shot guard for control events that must appear exactly once per
/// message or content block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControlGate {
    #[default]
    NotStarted,
    Started,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Opened,
    AlreadySent,
}

impl GateOutcome {
    pub fn is_opened(self) -> bool {
        self == Self::Opened
    }
}

impl ControlGate {
    pub fn open(&mut self) -> GateOutcome {
        match self {
            Self::NotStarted => {
                *self = Self::Started;
                GateOutcome::Opened
            }
            Self::Started => GateOutcome::AlreadySent,
        }
    }

    /// Close the gate so the next `open` emits again; returns whether it was open.
    pub fn close(&mut self) -> bool {
        std::mem::take(self) == Self::Started
    }

    pub fn is_started(&self) -> bool {
        *self == Self::Started
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_open_is_already_sent() {
        let mut gate = ControlGate::default();
        assert_eq!(gate.open(), GateOutcome::Opened);
        assert_eq!(gate.open(), GateOutcome::AlreadySent);
        assert_eq!(gate.open(), GateOutcome::AlreadySent);
        assert!(gate.is_started());
    }

    #[test]
    fn test_close_rearms() {
        let mut gate = ControlGate::default();
        assert!(!gate.close());

        gate.open();
        assert!(gate.close());
        assert!(!gate.is_started());
        assert!(gate.open().is_opened());
    }
}
