/// Step index of a saga that has not executed any step yet.
pub const NOT_STARTED: i32 = -1;

/// Position of a saga in its step list.
///
/// Transitions return new values. Once `ended` is set no further steps run,
/// and `compensating` is never cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepContext {
    step: i32,
    compensating: bool,
    ended: bool,
}

impl StepContext {
    pub fn new(step: i32, compensating: bool, ended: bool) -> Self {
        Self {
            step,
            compensating,
            ended,
        }
    }

    /// Context of a saga before its first step.
    pub fn not_started() -> Self {
        Self::new(NOT_STARTED, false, false)
    }

    /// Moves `delta` steps in the current direction.
    pub fn next(self, delta: i32) -> Self {
        Self {
            step: self.step + delta * self.direction(),
            ..self
        }
    }

    /// Switches to compensation at the current step.
    pub fn compensate(self) -> Self {
        Self {
            compensating: true,
            ..self
        }
    }

    pub fn end(self) -> Self {
        Self {
            ended: true,
            ..self
        }
    }

    /// `1` while advancing, `-1` while compensating.
    pub fn direction(&self) -> i32 {
        if self.compensating { -1 } else { 1 }
    }

    pub fn step(&self) -> i32 {
        self.step
    }

    pub fn is_compensating(&self) -> bool {
        self.compensating
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_follows_direction() {
        let ctx = StepContext::new(2, false, false);
        assert_eq!(ctx.next(1).step(), 3);
        assert_eq!(ctx.next(3).step(), 5);

        let ctx = ctx.compensate();
        assert_eq!(ctx.next(1).step(), 1);
        assert_eq!(ctx.next(2).step(), 0);
        assert!(ctx.next(1).is_compensating());
    }

    #[test]
    fn compensate_keeps_the_failed_step() {
        let ctx = StepContext::new(4, false, false).compensate();
        assert_eq!(ctx.step(), 4);
        assert!(ctx.is_compensating());
        assert_eq!(ctx.direction(), -1);
    }

    #[test]
    fn end_is_sticky() {
        let ended = StepContext::new(1, false, false).end();
        assert!(ended.is_ended());
        assert_eq!(ended.step(), 1);
        assert!(ended.compensate().is_ended());
        assert!(ended.next(1).is_ended());
    }

    #[test]
    fn not_started_is_before_the_first_step() {
        let ctx = StepContext::not_started();
        assert_eq!(ctx.step(), NOT_STARTED);
        assert_eq!(ctx.next(1).step(), 0);
        assert!(!ctx.is_ended());
    }
}
