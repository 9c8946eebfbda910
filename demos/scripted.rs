//! Drives a full scripted session against an in-memory fake target.
//!
//! Run with `cargo run --example scripted`. The user script lives next to
//! this file (`demos/probescript_user.lua`) and is picked up by the default
//! filename probe.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use probescript::{
    BoardInfo, CallSequence, CoreOps, MemoryRegion, MemoryType, ProbeOps, ResetType, Session,
    StepFn, TargetOps, TransferError,
};

type DynResult<T> = Result<T, Box<dyn std::error::Error>>;

const RAM_BASE: u64 = 0x2000_0000;
const RAM_SIZE: usize = 0x1_0000;

struct FakeProbe;

impl ProbeOps for FakeProbe {
    fn unique_id(&self) -> String {
        "0001A5D1".to_string()
    }

    fn vendor_name(&self) -> String {
        "Acme".to_string()
    }

    fn product_name(&self) -> String {
        "LinkProbe".to_string()
    }
}

struct FakeTarget {
    ram: Vec<u8>,
    regions: Vec<MemoryRegion>,
}

impl FakeTarget {
    fn new() -> FakeTarget {
        FakeTarget {
            ram: vec![0; RAM_SIZE],
            regions: vec![MemoryRegion::new(
                MemoryType::Ram,
                "sram",
                RAM_BASE,
                RAM_SIZE as u64,
            )],
        }
    }

    fn offset(&self, address: u64, length: usize) -> Result<usize, TransferError> {
        if address < RAM_BASE || address + length as u64 > RAM_BASE + RAM_SIZE as u64 {
            return Err(TransferError::Fault { address });
        }
        Ok((address - RAM_BASE) as usize)
    }
}

impl TargetOps for FakeTarget {
    fn connect(&mut self) -> Result<(), TransferError> {
        println!("[target] connected");
        Ok(())
    }

    fn disconnect(&mut self, resume: bool) -> Result<(), TransferError> {
        println!("[target] disconnected (resume={resume})");
        Ok(())
    }

    fn init_sequence(&mut self) -> CallSequence {
        let mut seq = CallSequence::new();
        for name in ["halt_core", "setup_clocks", "enable_flash"] {
            seq.append(name, StepFn::host(move || {
                println!("[target] init step {name}");
                Ok(())
            }))
            .expect("unique step names");
        }
        seq
    }

    fn read_memory(&mut self, address: u64, length: usize) -> Result<Vec<u8>, TransferError> {
        let at = self.offset(address, length)?;
        Ok(self.ram[at..at + length].to_vec())
    }

    fn write_memory(&mut self, address: u64, data: &[u8]) -> Result<(), TransferError> {
        let at = self.offset(address, data.len())?;
        self.ram[at..at + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn mass_erase(&mut self) -> Result<(), TransferError> {
        println!("[target] mass erase");
        Ok(())
    }

    fn trace_start(&mut self, mode: u32) -> Result<(), TransferError> {
        println!("[target] trace start (mode {mode})");
        Ok(())
    }

    fn trace_stop(&mut self, mode: u32) -> Result<(), TransferError> {
        println!("[target] trace stop (mode {mode})");
        Ok(())
    }

    fn memory_regions(&self) -> Vec<MemoryRegion> {
        self.regions.clone()
    }

    fn add_memory_region(&mut self, region: MemoryRegion) -> Result<(), TransferError> {
        self.regions.push(region);
        Ok(())
    }
}

struct FakeCore {
    halted: bool,
}

impl CoreOps for FakeCore {
    fn start(&mut self) -> Result<(), TransferError> {
        println!("[core] debug started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransferError> {
        println!("[core] debug stopped");
        Ok(())
    }

    fn halt(&mut self) -> Result<(), TransferError> {
        self.halted = true;
        println!("[core] halted");
        Ok(())
    }

    fn resume(&mut self) -> Result<(), TransferError> {
        self.halted = false;
        println!("[core] resumed");
        Ok(())
    }

    fn is_halted(&self) -> bool {
        self.halted
    }

    fn reset(&mut self, reset_type: ResetType) -> Result<(), TransferError> {
        println!("[core] reset ({reset_type})");
        Ok(())
    }

    fn set_reset_catch(&mut self, _reset_type: ResetType) -> Result<(), TransferError> {
        Ok(())
    }

    fn clear_reset_catch(&mut self, _reset_type: ResetType) -> Result<(), TransferError> {
        Ok(())
    }
}

fn main() -> DynResult<()> {
    pretty_env_logger::init();

    let project_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
    let mut session = Session::new(
        Rc::new(FakeProbe),
        Rc::new(RefCell::new(FakeTarget::new())),
        BoardInfo::new("fake_cortex_m"),
    )
    .with_project_dir(project_dir)
    .with_core(Rc::new(RefCell::new(FakeCore { halted: false })));

    if session.load_user_script(None)? {
        let script = session.user_script().expect("just loaded");
        println!("loaded {}", script.path().display());
        for violation in script.contract_violations() {
            println!("warning: {violation}");
        }
    }

    session.connect()?;
    session.init_target()?;
    session.start_core(0)?;

    // the script overrides this one
    session.reset(0, ResetType::SwEmulated)?;
    // and lets this one fall through to the core
    session.reset(0, ResetType::Hw)?;

    // drive the script's commands the way a console front end would
    for (name, tokens) in [
        ("uid", vec![]),
        ("dump", vec!["0x20000000", "4"]),
    ] {
        match session.run_command(name, &tokens) {
            Ok(Some(output)) => println!("{name}> {output}"),
            Ok(None) => println!("{name}>"),
            Err(e) => println!("{name}> error: {e}"),
        }
    }

    session.stop_core(0)?;
    session.disconnect()?;
    Ok(())
}
