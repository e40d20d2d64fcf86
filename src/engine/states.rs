use std::fmt;

/// Per-call state, held in the correlation entry for the call's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallState {
    /// Dispatched to the vendor; answer not yet observed
    #[default]
    Dispatched,
    /// Callee answered; menu not yet issued
    Answered,
    /// Menu playing, waiting for a digit or the gather timeout
    MenuPresented,
    /// Terminal outcome recorded; further events are observed but inert
    Terminal,
}

impl CallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispatched => write!(f, "dispatched"),
            Self::Answered => write!(f, "answered"),
            Self::MenuPresented => write!(f, "menu_presented"),
            Self::Terminal => write!(f, "terminal"),
        }
    }
}
