use super::error::CaptureError;

/// Lifecycle shared by the capture driver and the encoder driver.
///
/// State transitions:
/// ```text
/// idle → running → idle      (stop)
///           ↓
///         error              (device / converter failure, sticky)
/// ```
///
/// `Error` is terminal for the owning component: `start`, `stop` and
/// submissions become no-ops until the component is recreated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Running,
    Error(CaptureError),
}

impl LifecycleState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn error(&self) -> Option<&CaptureError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Idle → Running. Returns `false` (and leaves the state untouched) from
    /// any other state.
    pub fn begin(&mut self) -> bool {
        if self.is_idle() {
            *self = Self::Running;
            true
        } else {
            false
        }
    }

    /// Running → Idle. Returns `false` when there was nothing to stop.
    pub fn end(&mut self) -> bool {
        if self.is_running() {
            *self = Self::Idle;
            true
        } else {
            false
        }
    }

    /// Enter the error state. Only the first failure is recorded; returns
    /// `false` if the state was already `Error`.
    pub fn fail(&mut self, error: CaptureError) -> bool {
        if self.is_error() {
            return false;
        }
        *self = Self::Error(error);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_stop_cycle() {
        let mut state = LifecycleState::default();
        assert!(state.begin());
        assert!(state.is_running());
        assert!(!state.begin());
        assert!(state.end());
        assert!(state.is_idle());
        assert!(!state.end());
    }

    #[test]
    fn error_is_sticky() {
        let mut state = LifecycleState::Running;
        assert!(state.fail(CaptureError::device(-1, "render")));
        assert!(!state.fail(CaptureError::Encode("second".into())));
        assert!(!state.begin());
        assert!(!state.end());
        assert_eq!(state.error(), Some(&CaptureError::device(-1, "render")));
    }
}
