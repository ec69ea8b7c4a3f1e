//! 16-bit address bus dispatching RAM, ROM write-protection, and the
//! ACIA/VIA/FileIO device register windows.
//!
//! Address map:
//!
//! | Range           | Device      |
//! |-----------------|-------------|
//! | `$C010-$C013`   | ACIA #1     |
//! | `$C020-$C023`   | ACIA #2     |
//! | `$C030-$C03F`   | VIA         |
//! | `$C040-$C04F`   | File I/O    |
//! | anything else   | RAM         |
//!
//! Writes that land on a protected RAM address are silently dropped.

mod address_range;

pub use address_range::{AddressRange, AddressRangeSet};

use fileio_device::FileIo;
use mos_acia_6551::Acia6551;
use mos_core::Bus as BusTrait;
use mos_via_6522::Via6522;

const ACIA1_BASE: u16 = 0xC010;
const ACIA1_TOP: u16 = 0xC013;
const ACIA2_BASE: u16 = 0xC020;
const ACIA2_TOP: u16 = 0xC023;
const VIA_BASE: u16 = 0xC030;
const VIA_TOP: u16 = 0xC03F;
const FILEIO_BASE: u16 = 0xC040;
const FILEIO_TOP: u16 = 0xC04F;

/// The 6502 system bus: 64KiB of RAM plus the mapped devices.
pub struct Bus {
    ram: Box<[u8; 0x10000]>,
    protected: AddressRangeSet,
    pub acia1: Acia6551,
    pub acia2: Acia6551,
    pub via: Via6522,
    pub fileio: FileIo,
    /// Emit a diagnostic on every write dropped by ROM protection.
    pub verbose: bool,
}

impl Bus {
    #[must_use]
    pub fn new(acia1: Acia6551, acia2: Acia6551) -> Self {
        Self {
            ram: Box::new([0; 0x10000]),
            protected: AddressRangeSet::new(),
            acia1,
            acia2,
            via: Via6522::new(),
            fileio: FileIo::new(),
            verbose: false,
        }
    }

    /// Copy `data` into RAM starting at `origin`.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` would run past the end of the address
    /// space.
    pub fn load(&mut self, origin: u16, data: &[u8]) -> Result<(), String> {
        let end = usize::from(origin) + data.len();
        if end > self.ram.len() {
            return Err(format!(
                "load of {} bytes at ${origin:04X} would overrun the address space",
                data.len()
            ));
        }
        self.ram[usize::from(origin)..end].copy_from_slice(data);
        Ok(())
    }

    /// Mark `range` as write-protected: writes inside it are dropped.
    pub fn protect(&mut self, range: AddressRange) {
        self.protected.add(range);
    }

    /// Remove write protection from `range`.
    pub fn unprotect(&mut self, range: AddressRange) {
        self.protected.remove(range);
    }

    #[must_use]
    pub fn is_protected(&self, address: u16) -> bool {
        self.protected.contains(address)
    }
}

impl BusTrait for Bus {
    fn read(&mut self, address: u16) -> u8 {
        match address {
            ACIA1_BASE..=ACIA1_TOP => self.acia1.read(address as u8 & 0x03),
            ACIA2_BASE..=ACIA2_TOP => self.acia2.read(address as u8 & 0x03),
            VIA_BASE..=VIA_TOP => self.via.read(address as u8 & 0x0F),
            FILEIO_BASE..=FILEIO_TOP => self.fileio.read(address as u8 & 0x0F),
            _ => self.ram[usize::from(address)],
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            ACIA1_BASE..=ACIA1_TOP => self.acia1.write(address as u8 & 0x03, value),
            ACIA2_BASE..=ACIA2_TOP => self.acia2.write(address as u8 & 0x03, value),
            VIA_BASE..=VIA_TOP => self.via.write(address as u8 & 0x0F, value),
            FILEIO_BASE..=FILEIO_TOP => self.fileio.write(address as u8 & 0x0F, value),
            _ => {
                if self.protected.contains(address) {
                    if self.verbose {
                        eprintln!("bus: dropped write of ${value:02X} to protected ${address:04X}");
                    }
                    return;
                }
                self.ram[usize::from(address)] = value;
            }
        }
    }

    fn tick(&mut self) {
        self.via.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mos_acia_6551::{NoInput, NullOutput};

    fn bus() -> Bus {
        Bus::new(
            Acia6551::new(Box::new(NoInput), Box::new(NullOutput)),
            Acia6551::new(Box::new(NoInput), Box::new(NullOutput)),
        )
    }

    #[test]
    fn ram_reads_back_what_was_written() {
        let mut bus = bus();
        bus.write(0x1234, 0x42);
        assert_eq!(bus.read(0x1234), 0x42);
    }

    #[test]
    fn load_places_bytes_at_origin() {
        let mut bus = bus();
        bus.load(0x8000, &[1, 2, 3]).unwrap();
        assert_eq!(bus.read(0x8000), 1);
        assert_eq!(bus.read(0x8001), 2);
        assert_eq!(bus.read(0x8002), 3);
    }

    #[test]
    fn load_past_end_of_address_space_errors() {
        let mut bus = bus();
        assert!(bus.load(0xFFFE, &[1, 2, 3]).is_err());
    }

    #[test]
    fn protected_writes_are_dropped() {
        let mut bus = bus();
        bus.write(0xD000, 0xAA);
        bus.protect(AddressRange::new(0xD000, 0xFFFF));
        bus.write(0xD000, 0xBB);
        assert_eq!(bus.read(0xD000), 0xAA);
    }

    #[test]
    fn unprotect_allows_writes_again() {
        let mut bus = bus();
        let range = AddressRange::new(0xD000, 0xDFFF);
        bus.protect(range);
        bus.unprotect(range);
        bus.write(0xD000, 0x77);
        assert_eq!(bus.read(0xD000), 0x77);
    }

    #[test]
    fn acia1_register_window_dispatches_to_acia1() {
        let mut bus = bus();
        bus.write(0xC010, 0x55); // DATA write forwards to output, no RAM effect
        assert_eq!(bus.read(0xC011) & 0x10, 0x10); // TDRE always set
    }

    #[test]
    fn via_register_window_dispatches_to_via() {
        let mut bus = bus();
        bus.write(0xC034, 3); // T1CL
        bus.write(0xC035, 0); // T1CH: start
        assert_eq!(bus.via.t1_counter(), 3);
    }

    #[test]
    fn fileio_register_window_dispatches_to_fileio() {
        let mut bus = bus();
        bus.write(0xC040, 0x00); // CMD_RESET
        assert_eq!(bus.read(0xC040) & 0x80, 0x80); // STATUS_READY
    }

    #[test]
    fn tick_advances_via_timers() {
        let mut bus = bus();
        bus.write(0xC034, 2);
        bus.write(0xC035, 0);
        let before = bus.via.t1_counter();
        bus.tick();
        assert_eq!(bus.via.t1_counter(), before - 1);
    }
}
