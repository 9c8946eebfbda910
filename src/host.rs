//! Interfaces consumed from the debug-host collaborators.
//!
//! `probescript` does not talk to hardware. The probe transport, memory
//! access, and flash machinery live in the host application, which hands the
//! session trait objects implementing [`ProbeOps`], [`TargetOps`], and
//! [`CoreOps`]. User scripts see these same objects through the handles
//! injected into their namespace.
//!
//! All collaborators are driven from a single session thread, so the shared
//! forms are `Rc<RefCell<_>>` rather than `Arc`/locks.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::sequence::CallSequence;

/// Shared handle to the session's debug probe.
pub type SharedProbe = Rc<dyn ProbeOps>;
/// Shared handle to the session's target.
pub type SharedTarget = Rc<RefCell<dyn TargetOps>>;
/// Shared handle to one target core.
pub type SharedCore = Rc<RefCell<dyn CoreOps>>;

/// A failed transfer on the debug link.
///
/// `Display` leads with the script-visible error class name, so the error
/// classes injected into the script namespace can classify host faults
/// caught with `pcall`.
#[derive(Debug, Clone, Error)]
pub enum TransferError {
    /// The target did not respond in time.
    #[error("TransferTimeoutError: {0}")]
    Timeout(String),
    /// The target faulted the access.
    #[error("TransferFaultError: memory transfer fault at {address:#010x}")]
    Fault {
        /// Address of the faulting access.
        address: u64,
    },
    /// Any other link failure.
    #[error("TransferError: {0}")]
    Other(String),
}

/// How a core is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetType {
    /// Hardware reset via the reset pin.
    Hw,
    /// Default software reset for the target.
    Sw,
    /// Software reset using SYSRESETREQ.
    SwSysresetreq,
    /// Software reset using VECTRESET.
    SwVectreset,
    /// Emulated reset: core registers are reset by the debugger.
    SwEmulated,
}

impl ResetType {
    /// Integer encoding used in the script namespace's `ResetType` table.
    pub fn as_i64(self) -> i64 {
        match self {
            ResetType::Hw => 0,
            ResetType::Sw => 1,
            ResetType::SwSysresetreq => 2,
            ResetType::SwVectreset => 3,
            ResetType::SwEmulated => 4,
        }
    }

    /// Inverse of [`ResetType::as_i64`].
    pub fn from_i64(value: i64) -> Option<ResetType> {
        Some(match value {
            0 => ResetType::Hw,
            1 => ResetType::Sw,
            2 => ResetType::SwSysresetreq,
            3 => ResetType::SwVectreset,
            4 => ResetType::SwEmulated,
            _ => return None,
        })
    }
}

impl fmt::Display for ResetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResetType::Hw => "hw",
            ResetType::Sw => "sw",
            ResetType::SwSysresetreq => "sw_sysresetreq",
            ResetType::SwVectreset => "sw_vectreset",
            ResetType::SwEmulated => "sw_emulated",
        };
        write!(f, "{name}")
    }
}

/// Kind of a memory region in the target's memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryType {
    Ram,
    Rom,
    Flash,
    Device,
}

impl MemoryType {
    /// Lowercase name, as exposed in the script namespace's `MemoryType`
    /// table and on region handles.
    pub fn name(self) -> &'static str {
        match self {
            MemoryType::Ram => "ram",
            MemoryType::Rom => "rom",
            MemoryType::Flash => "flash",
            MemoryType::Device => "device",
        }
    }
}

/// One region of the target's memory map.
///
/// Scripts construct new regions with the `RamRegion`/`RomRegion`/
/// `FlashRegion`/`DeviceRegion` constructors and install them with
/// `target:add_memory_region`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub kind: MemoryType,
    pub name: String,
    pub start: u64,
    pub length: u64,
    /// Erase sector size; only meaningful for flash regions.
    pub sector_size: Option<u32>,
}

impl MemoryRegion {
    pub fn new(kind: MemoryType, name: impl Into<String>, start: u64, length: u64) -> MemoryRegion {
        MemoryRegion {
            kind,
            name: name.into(),
            start,
            length,
            sector_size: None,
        }
    }

    /// First address past the region.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Whether `address` falls inside the region.
    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end()
    }
}

/// Static description of the board a session is attached to.
#[derive(Debug, Clone)]
pub struct BoardInfo {
    /// Board name; "generic" when the board is not otherwise identified.
    pub name: String,
    /// Target type name, e.g. `stm32f405rg`.
    pub target_type: String,
    /// Optional firmware image used by automated tests against this board.
    pub test_binary: Option<String>,
}

impl BoardInfo {
    pub fn new(target_type: impl Into<String>) -> BoardInfo {
        BoardInfo {
            name: "generic".to_string(),
            target_type: target_type.into(),
            test_binary: None,
        }
    }

    /// Human-readable description, composed from the probe's identity.
    pub fn description(&self, probe: &dyn ProbeOps) -> String {
        format!(
            "{} {} [{}]",
            probe.vendor_name(),
            probe.product_name(),
            self.target_type
        )
    }
}

/// Identity of the attached debug probe.
pub trait ProbeOps {
    /// Unique identifier (usually the serial number).
    fn unique_id(&self) -> String;
    fn vendor_name(&self) -> String;
    fn product_name(&self) -> String;
}

/// Operations on the target as a whole.
///
/// `read32`/`write32` have default implementations in terms of the block
/// accessors; hosts with native word transfers should override them.
pub trait TargetOps {
    /// Establish the debug connection.
    fn connect(&mut self) -> Result<(), TransferError>;

    /// Tear down the debug connection, optionally resuming the core first.
    fn disconnect(&mut self, resume: bool) -> Result<(), TransferError>;

    /// The ordered initialization steps this target runs after connecting.
    ///
    /// The session offers the returned sequence to the `will_init_target`
    /// hook for editing before executing it.
    fn init_sequence(&mut self) -> CallSequence;

    fn read_memory(&mut self, address: u64, length: usize) -> Result<Vec<u8>, TransferError>;

    fn write_memory(&mut self, address: u64, data: &[u8]) -> Result<(), TransferError>;

    fn read32(&mut self, address: u64) -> Result<u32, TransferError> {
        let bytes = self.read_memory(address, 4)?;
        let bytes: [u8; 4] = bytes
            .try_into()
            .map_err(|_| TransferError::Other(format!("short read at {address:#010x}")))?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn write32(&mut self, address: u64, value: u32) -> Result<(), TransferError> {
        self.write_memory(address, &value.to_le_bytes())
    }

    /// Erase all of the target's flash.
    fn mass_erase(&mut self) -> Result<(), TransferError>;

    fn trace_start(&mut self, mode: u32) -> Result<(), TransferError>;

    fn trace_stop(&mut self, mode: u32) -> Result<(), TransferError>;

    /// Current memory map.
    fn memory_regions(&self) -> Vec<MemoryRegion>;

    /// Install an additional region into the memory map.
    fn add_memory_region(&mut self, region: MemoryRegion) -> Result<(), TransferError>;
}

/// Operations on a single core.
pub trait CoreOps {
    /// Start debugging the core (enable debug logic, attach).
    fn start(&mut self) -> Result<(), TransferError>;

    /// Stop debugging the core.
    fn stop(&mut self) -> Result<(), TransferError>;

    fn halt(&mut self) -> Result<(), TransferError>;

    fn resume(&mut self) -> Result<(), TransferError>;

    fn is_halted(&self) -> bool;

    fn reset(&mut self, reset_type: ResetType) -> Result<(), TransferError>;

    /// Arrange for the core to halt out of the next reset.
    fn set_reset_catch(&mut self, reset_type: ResetType) -> Result<(), TransferError>;

    fn clear_reset_catch(&mut self, reset_type: ResetType) -> Result<(), TransferError>;
}
