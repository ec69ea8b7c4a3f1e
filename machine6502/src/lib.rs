//! Composes the bus, CPU, and devices into a runnable 6502 machine.
//!
//! `Machine` is the sole caller of `Cpu::step`; callers outside this
//! crate only ever see `load_rom`, `protect_rom`, `step`, and `run`.

mod stdio;

pub use cpu6502::Variant;
pub use stdio::{StdinInput, StdoutOutput};

use bus6502::{AddressRange, Bus};
use cpu6502::{Cpu, Mos6502};
use mos_acia_6551::{Acia6551, NoInput, NullOutput};
use mos_core::Bus as BusTrait;
use std::fmt;

/// Default range protected from writes at machine creation: the ROM
/// window the guest's boot code and vectors live in.
pub const DEFAULT_ROM_RANGE: AddressRange = AddressRange {
    start: 0xD000,
    end: 0xFFFF,
};

/// Errors a host program can hit while loading or driving a [`Machine`].
///
/// Core emulation (`step`, `run`, `irq`, `nmi`) is infallible by
/// construction — only host-facing load operations can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MachineError {
    /// `data` would run past the end of the 64KB address space.
    RomTooLarge { origin: u16, len: usize },
    /// The underlying bus rejected the load for a reason other than size.
    RomLoad(String),
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RomTooLarge { origin, len } => write!(
                f,
                "rom of {len} bytes at ${origin:04X} runs past the end of the address space"
            ),
            Self::RomLoad(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for MachineError {}

/// A snapshot of CPU-visible register state, used for trace hooks.
///
/// Purely informational: nothing reads a `CpuState` back into the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuState {
    pub pc: u16,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub p: u8,
}

impl CpuState {
    fn capture(cpu: &Mos6502) -> Self {
        Self {
            pc: cpu.pc(),
            a: cpu.a(),
            x: cpu.x(),
            y: cpu.y(),
            sp: cpu.sp(),
            p: cpu.status(),
        }
    }
}

/// A serializable mirror of [`CpuState`] plus the flags `CpuState` omits,
/// for debug dumps and test fixtures.
///
/// Read-only projection: nothing deserializes a `CpuSnapshot` back into a
/// running [`Machine`].
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CpuSnapshot {
    pub pc: u16,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub p: u8,
    pub variant: Variant,
    pub halted: bool,
}

#[cfg(feature = "serde")]
impl CpuSnapshot {
    fn capture(machine: &Machine) -> Self {
        let state = CpuState::capture(&machine.cpu);
        Self {
            pc: state.pc,
            a: state.a,
            x: state.x,
            y: state.y,
            sp: state.sp,
            p: state.p,
            variant: machine.cpu.variant(),
            halted: machine.halted,
        }
    }

    /// Serializes to a pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error only if a future field becomes non-serializable;
    /// every field here is a primitive.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a snapshot previously produced by [`Self::to_json`].
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not valid `CpuSnapshot` JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

type TraceHook = Box<dyn FnMut(&CpuState, &CpuState)>;

/// Owns the bus and CPU and drives execution one instruction at a time.
pub struct Machine {
    bus: Bus,
    cpu: Mos6502,
    halted: bool,
    trace_hook: Option<TraceHook>,
    /// Emit a diagnostic on every write dropped by ROM protection.
    pub verbose: bool,
}

impl Machine {
    /// Builds a machine with stdin/stdout-backed ACIAs, the default ROM
    /// protection range installed, and the CPU reset against the bus.
    #[must_use]
    pub fn new(variant: Variant) -> Self {
        let acia1 = Acia6551::new(Box::new(StdinInput), Box::new(StdoutOutput));
        let acia2 = Acia6551::new(Box::new(NoInput), Box::new(NullOutput));
        let mut bus = Bus::new(acia1, acia2);
        bus.protect(DEFAULT_ROM_RANGE);

        let mut cpu = Mos6502::new(variant);
        cpu.reset(&mut bus);

        Self {
            bus,
            cpu,
            halted: false,
            trace_hook: None,
            verbose: false,
        }
    }

    #[must_use]
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    #[must_use]
    pub fn cpu(&self) -> &Mos6502 {
        &self.cpu
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Captures a serializable snapshot of the current CPU state.
    #[cfg(feature = "serde")]
    #[must_use]
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot::capture(self)
    }

    /// Request that `run` stop at the top of its next iteration.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    /// Copies `data` into RAM starting at `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::RomTooLarge`] if `data` would run past the
    /// end of the address space. Does not itself mark the region
    /// protected; call [`Self::protect_rom`] once loading is complete if
    /// it should be.
    pub fn load_rom(&mut self, origin: u16, data: &[u8]) -> Result<(), MachineError> {
        self.bus.load(origin, data).map_err(|_| MachineError::RomTooLarge {
            origin,
            len: data.len(),
        })
    }

    /// Marks `range` write-protected.
    pub fn protect_rom(&mut self, range: AddressRange) {
        self.bus.protect(range);
    }

    /// Resets the CPU, re-reading the reset vector.
    pub fn reset(&mut self) {
        self.cpu.reset(&mut self.bus);
        self.halted = false;
    }

    /// Installs a hook invoked after every step with `(before, after)`
    /// register snapshots taken around the instruction, before the VIA
    /// tick that follows it.
    pub fn set_trace_hook(&mut self, hook: impl FnMut(&CpuState, &CpuState) + 'static) {
        self.trace_hook = Some(Box::new(hook));
    }

    pub fn clear_trace_hook(&mut self) {
        self.trace_hook = None;
    }

    /// Signal a maskable interrupt.
    pub fn irq(&mut self) {
        self.cpu.interrupt(&mut self.bus);
    }

    /// Signal a non-maskable interrupt.
    pub fn nmi(&mut self) {
        self.cpu.nmi(&mut self.bus);
    }

    /// Executes one instruction, then advances the VIA by one tick, then
    /// (if installed) invokes the trace hook. Returns the cycle count the
    /// CPU reports for the instruction, matching [`cpu6502::Cpu::step`].
    pub fn step(&mut self) -> u32 {
        self.bus.verbose = self.verbose;
        let before = CpuState::capture(&self.cpu);
        let cycles = self.cpu.step(&mut self.bus);
        self.bus.tick();
        if let Some(hook) = self.trace_hook.as_mut() {
            let after = CpuState::capture(&self.cpu);
            hook(&before, &after);
        }
        if self.cpu.is_stopped() {
            self.halted = true;
        }
        cycles
    }

    /// Steps until [`Self::halt`] has been called or a 65C02 `STP` has
    /// executed.
    pub fn run(&mut self) {
        while !self.halted {
            self.step();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> Machine {
        Machine::new(Variant::Wdc65C02)
    }

    #[test]
    fn reset_vector_sets_pc() {
        let mut m = machine();
        m.bus_mut().unprotect(DEFAULT_ROM_RANGE);
        m.load_rom(0xFFFC, &[0x00, 0x80]).unwrap();
        m.reset();
        assert_eq!(m.cpu().pc(), 0x8000);
    }

    #[test]
    fn load_rom_past_end_of_address_space_errors() {
        let mut m = machine();
        assert_eq!(
            m.load_rom(0xFFFE, &[1, 2, 3]).unwrap_err(),
            MachineError::RomTooLarge {
                origin: 0xFFFE,
                len: 3
            }
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn snapshot_round_trips_through_json() {
        let mut m = machine();
        m.bus_mut().unprotect(DEFAULT_ROM_RANGE);
        m.load_rom(0x8000, &[0xA9, 0x42, 0xDB]).unwrap(); // LDA #$42 ; STP
        m.load_rom(0xFFFC, &[0x00, 0x80]).unwrap();
        m.reset();
        m.run();

        let snapshot = m.snapshot();
        assert_eq!(snapshot.a, 0x42);
        assert!(snapshot.halted);

        let json = snapshot.to_json().unwrap();
        let restored = CpuSnapshot::from_json(&json).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn rom_range_is_protected_by_default() {
        let mut m = machine();
        m.bus_mut().unprotect(DEFAULT_ROM_RANGE);
        m.load_rom(0xFFFC, &[0x00, 0x80]).unwrap();
        m.bus_mut().protect(DEFAULT_ROM_RANGE);
        assert!(m.bus().is_protected(0xD000));
        assert!(m.bus().is_protected(0xFFFF));
    }

    #[test]
    fn run_halts_on_stp() {
        let mut m = machine();
        m.bus_mut().unprotect(DEFAULT_ROM_RANGE);
        // LDA #$42 ; STP
        m.load_rom(0x8000, &[0xA9, 0x42, 0xDB]).unwrap();
        m.load_rom(0xFFFC, &[0x00, 0x80]).unwrap();
        m.reset();
        m.run();
        assert!(m.is_halted());
        assert_eq!(m.cpu().a(), 0x42);
    }

    #[test]
    fn step_advances_via_and_invokes_trace_hook() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut m = machine();
        m.bus_mut().unprotect(DEFAULT_ROM_RANGE);
        m.load_rom(0x8000, &[0xEA]).unwrap(); // NOP
        m.load_rom(0xFFFC, &[0x00, 0x80]).unwrap();
        m.reset();

        let seen = Rc::new(RefCell::new(None));
        let seen_clone = Rc::clone(&seen);
        m.set_trace_hook(move |before, after| {
            *seen_clone.borrow_mut() = Some((*before, *after));
        });
        m.step();

        let (before, after) = seen.borrow().unwrap();
        assert_eq!(before.pc, 0x8000);
        assert_eq!(after.pc, 0x8001);
    }
}
