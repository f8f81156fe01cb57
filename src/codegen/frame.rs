use crate::codegen::compile_error::AssemblerError;

/// Per-function sizing state: running and peak operand-stack depth, running
/// and peak local-slot cursor. The peaks size the activation record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    stack: u32,
    max_stack: u32,
    slot: u32,
    max_slot: u32,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack_depth(&self) -> u32 {
        self.stack
    }

    pub fn max_stack_depth(&self) -> u32 {
        self.max_stack
    }

    pub fn slot_count(&self) -> u32 {
        self.slot
    }

    pub fn max_slot_count(&self) -> u32 {
        self.max_slot
    }

    pub fn add_stack(&mut self, n: u32) {
        self.stack += n;
        self.max_stack = self.max_stack.max(self.stack);
    }

    pub fn release_stack(&mut self, n: u32) -> Result<(), AssemblerError> {
        self.stack = self
            .stack
            .checked_sub(n)
            .ok_or(AssemblerError::StackUnderflow {
                release: n,
                depth: self.stack,
            })?;
        Ok(())
    }

    /// Fold an instruction's declared stack effect into the running depth.
    pub fn apply_effect(&mut self, effect: i32) -> Result<(), AssemblerError> {
        if effect >= 0 {
            self.add_stack(effect as u32);
            Ok(())
        } else {
            self.release_stack(effect.unsigned_abs())
        }
    }

    /// Hand out `n` contiguous slots, returning the first.
    pub fn allocate_slot(&mut self, n: u32) -> u32 {
        let first = self.slot;
        self.slot += n;
        self.max_slot = self.max_slot.max(self.slot);
        first
    }

    /// Rewind the slot cursor. Slots are strictly nested, so releasing the
    /// most recent `n` is enough.
    pub fn release_slot(&mut self, n: u32) {
        debug_assert!(n <= self.slot, "releasing {} of {} slots", n, self.slot);
        self.slot -= n.min(self.slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_peak_tracking() {
        let mut frame = Frame::new();
        frame.add_stack(1);
        frame.add_stack(1);
        frame.release_stack(1).unwrap();

        assert_eq!(frame.stack_depth(), 1);
        assert_eq!(frame.max_stack_depth(), 2);
    }

    #[test]
    fn test_apply_effect() {
        let mut frame = Frame::new();
        frame.apply_effect(3).unwrap();
        frame.apply_effect(-2).unwrap();
        frame.apply_effect(0).unwrap();

        assert_eq!(frame.stack_depth(), 1);
        assert_eq!(frame.max_stack_depth(), 3);
    }

    #[test]
    fn test_release_below_zero() {
        let mut frame = Frame::new();
        frame.add_stack(1);
        let err = frame.apply_effect(-3).unwrap_err();
        assert_eq!(
            err,
            AssemblerError::StackUnderflow {
                release: 3,
                depth: 1
            }
        );
        assert_eq!(frame.stack_depth(), 1);
    }

    #[test]
    fn test_slots_rewind() {
        let mut frame = Frame::new();
        assert_eq!(frame.allocate_slot(1), 0);
        assert_eq!(frame.allocate_slot(2), 1);
        frame.release_slot(2);
        assert_eq!(frame.allocate_slot(1), 1);

        assert_eq!(frame.slot_count(), 2);
        assert_eq!(frame.max_slot_count(), 3);
    }
}
