//! Mock session collaborators shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use tempfile::TempDir;

use probescript::{
    BoardInfo, CallSequence, CoreOps, MemoryRegion, MemoryType, Options, ProbeOps, ResetType,
    Session, StepFn, TargetOps, TransferError,
};

/// Shared recorder for everything the host side does.
#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<String>>>);

impl EventLog {
    pub fn new() -> EventLog {
        EventLog::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn count_of(&self, event: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == event).count()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.count_of(event) > 0
    }
}

pub struct MockProbe;

impl ProbeOps for MockProbe {
    fn unique_id(&self) -> String {
        "E00DBEEF".to_string()
    }

    fn vendor_name(&self) -> String {
        "Mock".to_string()
    }

    fn product_name(&self) -> String {
        "UltraProbe".to_string()
    }
}

pub const RAM_BASE: u64 = 0x2000_0000;
pub const RAM_SIZE: usize = 0x1_0000;

pub struct MockTarget {
    pub events: EventLog,
    pub memory: Vec<u8>,
    pub regions: Vec<MemoryRegion>,
}

impl MockTarget {
    pub fn new(events: EventLog) -> MockTarget {
        MockTarget {
            events,
            memory: vec![0; RAM_SIZE],
            regions: vec![MemoryRegion::new(
                MemoryType::Ram,
                "sram",
                RAM_BASE,
                RAM_SIZE as u64,
            )],
        }
    }

    fn offset(&self, address: u64, length: usize) -> Result<usize, TransferError> {
        let end = address.checked_add(length as u64);
        if address < RAM_BASE || end.is_none() || end.unwrap() > RAM_BASE + RAM_SIZE as u64 {
            return Err(TransferError::Fault { address });
        }
        Ok((address - RAM_BASE) as usize)
    }
}

impl TargetOps for MockTarget {
    fn connect(&mut self) -> Result<(), TransferError> {
        self.events.push("target:connect");
        Ok(())
    }

    fn disconnect(&mut self, resume: bool) -> Result<(), TransferError> {
        self.events.push(format!("target:disconnect resume={resume}"));
        Ok(())
    }

    fn init_sequence(&mut self) -> CallSequence {
        let mut seq = CallSequence::new();
        for name in ["halt_core", "setup_clocks", "enable_flash"] {
            let events = self.events.clone();
            seq.append(name, StepFn::host(move || {
                events.push(format!("step:{name}"));
                Ok(())
            }))
            .unwrap();
        }
        seq
    }

    fn read_memory(&mut self, address: u64, length: usize) -> Result<Vec<u8>, TransferError> {
        let at = self.offset(address, length)?;
        Ok(self.memory[at..at + length].to_vec())
    }

    fn write_memory(&mut self, address: u64, data: &[u8]) -> Result<(), TransferError> {
        let at = self.offset(address, data.len())?;
        self.memory[at..at + data.len()].copy_from_slice(data);
        self.events.push(format!("target:write {address:#010x}"));
        Ok(())
    }

    fn mass_erase(&mut self) -> Result<(), TransferError> {
        self.events.push("target:mass_erase");
        Ok(())
    }

    fn trace_start(&mut self, mode: u32) -> Result<(), TransferError> {
        self.events.push(format!("target:trace_start {mode}"));
        Ok(())
    }

    fn trace_stop(&mut self, mode: u32) -> Result<(), TransferError> {
        self.events.push(format!("target:trace_stop {mode}"));
        Ok(())
    }

    fn memory_regions(&self) -> Vec<MemoryRegion> {
        self.regions.clone()
    }

    fn add_memory_region(&mut self, region: MemoryRegion) -> Result<(), TransferError> {
        self.events.push(format!("target:add_region {}", region.name));
        self.regions.push(region);
        Ok(())
    }
}

pub struct MockCore {
    pub events: EventLog,
    pub halted: bool,
}

impl MockCore {
    pub fn new(events: EventLog) -> MockCore {
        MockCore {
            events,
            halted: false,
        }
    }
}

impl CoreOps for MockCore {
    fn start(&mut self) -> Result<(), TransferError> {
        self.events.push("core:start");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransferError> {
        self.events.push("core:stop");
        Ok(())
    }

    fn halt(&mut self) -> Result<(), TransferError> {
        self.halted = true;
        self.events.push("core:halt");
        Ok(())
    }

    fn resume(&mut self) -> Result<(), TransferError> {
        self.halted = false;
        self.events.push("core:resume");
        Ok(())
    }

    fn is_halted(&self) -> bool {
        self.halted
    }

    fn reset(&mut self, reset_type: ResetType) -> Result<(), TransferError> {
        self.events.push(format!("core:reset {reset_type}"));
        Ok(())
    }

    fn set_reset_catch(&mut self, reset_type: ResetType) -> Result<(), TransferError> {
        self.events.push(format!("core:set_reset_catch {reset_type}"));
        Ok(())
    }

    fn clear_reset_catch(&mut self, reset_type: ResetType) -> Result<(), TransferError> {
        self.events.push(format!("core:clear_reset_catch {reset_type}"));
        Ok(())
    }
}

/// A full mock session, with handles back into the mocks.
pub struct Harness {
    pub dir: TempDir,
    pub events: EventLog,
    pub target: Rc<RefCell<MockTarget>>,
    pub core: Rc<RefCell<MockCore>>,
    pub session: Session,
}

/// Session over mock collaborators with an empty project directory.
pub fn harness() -> Harness {
    harness_with_options(Options::new())
}

pub fn harness_with_options(options: Options) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let events = EventLog::new();
    let target = Rc::new(RefCell::new(MockTarget::new(events.clone())));
    let core = Rc::new(RefCell::new(MockCore::new(events.clone())));

    let session = Session::new(
        Rc::new(MockProbe),
        target.clone(),
        BoardInfo::new("mock_target"),
    )
    .with_project_dir(dir.path())
    .with_options(options)
    .with_core(core.clone());

    Harness {
        dir,
        events,
        target,
        core,
        session,
    }
}

/// Harness with `script` written as the default user script and loaded.
pub fn harness_with_script(script: &str) -> Harness {
    let mut h = harness();
    fs::write(h.dir.path().join("probescript_user.lua"), script).unwrap();
    let loaded = h.session.load_user_script(None).unwrap();
    assert!(loaded, "script should have been discovered");
    h
}
