//! Ordered, named target-initialization steps.
//!
//! A [`CallSequence`] is built by the host ([`TargetOps::init_sequence`])
//! and offered to the `will_init_target` hook, which may edit it in place
//! through the handle it receives. The host then executes the same instance
//! in final list order. Step counts are small (single digits to low tens),
//! so every operation is a linear scan keyed by step name.
//!
//! [`TargetOps::init_sequence`]: crate::host::TargetOps::init_sequence

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{SequenceError, StepError};
use crate::host::TransferError;

/// A host-provided step: a boxed closure run from the session thread.
pub type HostStep = Box<dyn FnMut() -> Result<(), TransferError>>;

/// The callable behind one sequence step.
pub enum StepFn {
    /// Step supplied by the host (target init code).
    Host(HostStep),
    /// Step inserted by the user script.
    Script(mlua::Function),
}

impl StepFn {
    /// Convenience wrapper for host closures.
    pub fn host(f: impl FnMut() -> Result<(), TransferError> + 'static) -> StepFn {
        StepFn::Host(Box::new(f))
    }
}

impl fmt::Debug for StepFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepFn::Host(_) => f.write_str("StepFn::Host"),
            StepFn::Script(_) => f.write_str("StepFn::Script"),
        }
    }
}

/// One named step of a [`CallSequence`].
#[derive(Debug)]
pub struct SequenceStep {
    name: String,
    call: StepFn,
}

impl SequenceStep {
    pub fn new(name: impl Into<String>, call: StepFn) -> SequenceStep {
        SequenceStep {
            name: name.into(),
            call,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the step was inserted by the user script.
    pub fn is_scripted(&self) -> bool {
        matches!(self.call, StepFn::Script(_))
    }

    /// Run the step, attributing any failure to its name.
    pub fn run(&mut self) -> Result<(), SequenceError> {
        let result = match &mut self.call {
            StepFn::Host(f) => f().map_err(StepError::from),
            StepFn::Script(f) => f.call::<()>(()).map_err(StepError::from),
        };
        result.map_err(|source| SequenceError::StepFailed {
            name: self.name.clone(),
            source,
        })
    }
}

/// Ordered list of uniquely named initialization steps.
#[derive(Debug, Default)]
pub struct CallSequence {
    steps: Vec<SequenceStep>,
}

impl CallSequence {
    pub fn new() -> CallSequence {
        CallSequence::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name() == name)
    }

    fn check_new_name(&self, name: &str) -> Result<(), SequenceError> {
        if self.position(name).is_some() {
            return Err(SequenceError::DuplicateStep(name.to_string()));
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SequenceStep> {
        self.position(name).map(|i| &self.steps[i])
    }

    pub fn append(&mut self, name: impl Into<String>, call: StepFn) -> Result<(), SequenceError> {
        let name = name.into();
        self.check_new_name(&name)?;
        self.steps.push(SequenceStep::new(name, call));
        Ok(())
    }

    pub fn insert_before(
        &mut self,
        anchor: &str,
        name: impl Into<String>,
        call: StepFn,
    ) -> Result<(), SequenceError> {
        let name = name.into();
        self.check_new_name(&name)?;
        let at = self
            .position(anchor)
            .ok_or_else(|| SequenceError::NoSuchStep(anchor.to_string()))?;
        self.steps.insert(at, SequenceStep::new(name, call));
        Ok(())
    }

    pub fn insert_after(
        &mut self,
        anchor: &str,
        name: impl Into<String>,
        call: StepFn,
    ) -> Result<(), SequenceError> {
        let name = name.into();
        self.check_new_name(&name)?;
        let at = self
            .position(anchor)
            .ok_or_else(|| SequenceError::NoSuchStep(anchor.to_string()))?;
        self.steps.insert(at + 1, SequenceStep::new(name, call));
        Ok(())
    }

    /// Swap the callable behind `name`, keeping its position and name.
    pub fn replace(&mut self, name: &str, call: StepFn) -> Result<(), SequenceError> {
        let at = self
            .position(name)
            .ok_or_else(|| SequenceError::NoSuchStep(name.to_string()))?;
        self.steps[at].call = call;
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<SequenceStep, SequenceError> {
        let at = self
            .position(name)
            .ok_or_else(|| SequenceError::NoSuchStep(name.to_string()))?;
        Ok(self.steps.remove(at))
    }

    /// Take all steps out, leaving the sequence empty.
    ///
    /// Execution drains first so that a script function which retained the
    /// sequence handle cannot re-enter or reorder a run in progress; its
    /// edits land on the emptied list.
    pub fn drain(&mut self) -> Vec<SequenceStep> {
        std::mem::take(&mut self.steps)
    }

    /// Drain and run every step in order, stopping at the first failure.
    pub fn run(&mut self) -> Result<(), SequenceError> {
        for mut step in self.drain() {
            step.run()?;
        }
        Ok(())
    }
}

/// Run a shared sequence the way the session does after `will_init_target`:
/// drain under a short borrow, then execute outside it.
pub fn run_shared(sequence: &Rc<RefCell<CallSequence>>) -> Result<(), SequenceError> {
    let steps = sequence.borrow_mut().drain();
    for mut step in steps {
        step.run()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> StepFn {
        let log = log.clone();
        StepFn::host(move || {
            log.borrow_mut().push(tag);
            Ok(())
        })
    }

    fn sample(log: &Rc<RefCell<Vec<&'static str>>>) -> CallSequence {
        let mut seq = CallSequence::new();
        seq.append("halt", record(log, "halt")).unwrap();
        seq.append("clocks", record(log, "clocks")).unwrap();
        seq.append("flash", record(log, "flash")).unwrap();
        seq
    }

    #[test]
    fn name_keyed_edits() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut seq = sample(&log);

        seq.insert_before("clocks", "dp_init", record(&log, "dp_init"))
            .unwrap();
        seq.insert_after("flash", "verify", record(&log, "verify"))
            .unwrap();
        seq.remove("halt").unwrap();
        seq.replace("clocks", record(&log, "clocks2")).unwrap();
        assert_eq!(seq.names(), ["dp_init", "clocks", "flash", "verify"]);

        seq.run().unwrap();
        assert_eq!(*log.borrow(), ["dp_init", "clocks2", "flash", "verify"]);
        assert!(seq.is_empty());
    }

    #[test]
    fn missing_and_duplicate_names() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut seq = sample(&log);

        assert!(matches!(
            seq.remove("nope"),
            Err(SequenceError::NoSuchStep(_))
        ));
        assert!(matches!(
            seq.insert_before("nope", "x", record(&log, "x")),
            Err(SequenceError::NoSuchStep(_))
        ));
        assert!(matches!(
            seq.append("halt", record(&log, "halt")),
            Err(SequenceError::DuplicateStep(_))
        ));
        assert!(matches!(
            seq.replace("nope", record(&log, "x")),
            Err(SequenceError::NoSuchStep(_))
        ));
        // failed edits leave the order untouched
        assert_eq!(seq.names(), ["halt", "clocks", "flash"]);
    }

    #[test]
    fn step_failure_carries_name() {
        let mut seq = CallSequence::new();
        seq.append(
            "boom",
            StepFn::host(|| Err(TransferError::Other("no link".to_string()))),
        )
        .unwrap();
        match seq.run() {
            Err(SequenceError::StepFailed { name, .. }) => assert_eq!(name, "boom"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn get_reports_kind() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let seq = sample(&log);
        let step = seq.get("clocks").unwrap();
        assert_eq!(step.name(), "clocks");
        assert!(!step.is_scripted());
        assert!(seq.get("nope").is_none());
    }
}
