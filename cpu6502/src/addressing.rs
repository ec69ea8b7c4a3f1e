//! 6502/65C02 addressing modes.
//!
//! - Implied: No operand (e.g., CLC, RTS)
//! - Accumulator: Operates on A register (e.g., ASL A)
//! - Immediate: #$nn (literal value)
//! - Zero Page: $nn (8-bit address in page zero)
//! - Zero Page,X: $nn,X (8-bit address + X, wraps in page zero)
//! - Zero Page,Y: $nn,Y (8-bit address + Y, wraps in page zero)
//! - Absolute: $nnnn (16-bit address)
//! - Absolute,X: $nnnn,X (16-bit address + X, may cross page)
//! - Absolute,Y: $nnnn,Y (16-bit address + Y, may cross page)
//! - Indirect: ($nnnn) (JMP only)
//! - Indexed Indirect: ($nn,X) (pointer in zero page indexed by X)
//! - Indirect Indexed: ($nn),Y (zero page pointer + Y)
//! - Zero Page Indirect: ($nn) (65C02 addition, no X/Y index)
//! - Relative: Branch offset (-128 to +127)
//!
//! This is an instruction-stepped model: addressing helpers compute an
//! effective address with no dummy reads or mid-instruction bus ticks.
//! `JMP (abs)` in particular always reads a plain, non-wrapping 16-bit
//! word; the NMOS page-boundary fetch bug is not reproduced.

use crate::Mos6502;
use mos_core::Bus;

impl Mos6502 {
    /// Fetch the next byte at PC and increment PC.
    pub(crate) fn fetch(&mut self, bus: &mut impl Bus) -> u8 {
        let value = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    /// Fetch a 16-bit word (little-endian) at PC.
    pub(crate) fn fetch_word(&mut self, bus: &mut impl Bus) -> u16 {
        let low = self.fetch(bus);
        let high = self.fetch(bus);
        u16::from_le_bytes([low, high])
    }

    /// Read a 16-bit word from memory (little-endian), e.g. an interrupt
    /// vector. Never reproduces the NMOS page-wrap fetch bug.
    pub(crate) fn read_word(&self, bus: &mut impl Bus, addr: u16) -> u16 {
        bus.read16(addr)
    }

    /// Push a byte onto the stack.
    pub(crate) fn push(&mut self, bus: &mut impl Bus, value: u8) {
        bus.write(0x0100 | u16::from(self.sp), value);
        self.sp = self.sp.wrapping_sub(1);
    }

    /// Pull a byte from the stack.
    pub(crate) fn pull(&mut self, bus: &mut impl Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(0x0100 | u16::from(self.sp))
    }

    /// Push a 16-bit word onto the stack (high byte first).
    pub(crate) fn push_word(&mut self, bus: &mut impl Bus, value: u16) {
        self.push(bus, (value >> 8) as u8);
        self.push(bus, value as u8);
    }

    /// Pull a 16-bit word from the stack (low byte first).
    pub(crate) fn pull_word(&mut self, bus: &mut impl Bus) -> u16 {
        let low = self.pull(bus);
        let high = self.pull(bus);
        u16::from_le_bytes([low, high])
    }

    // =====================================================================
    // Addressing mode helpers
    // =====================================================================

    /// Zero Page: $nn
    pub(crate) fn addr_zero_page(&mut self, bus: &mut impl Bus) -> u16 {
        u16::from(self.fetch(bus))
    }

    /// Zero Page,X: $nn,X (wraps within zero page)
    pub(crate) fn addr_zero_page_x(&mut self, bus: &mut impl Bus) -> u16 {
        let base = self.fetch(bus);
        u16::from(base.wrapping_add(self.x))
    }

    /// Zero Page,Y: $nn,Y (wraps within zero page)
    pub(crate) fn addr_zero_page_y(&mut self, bus: &mut impl Bus) -> u16 {
        let base = self.fetch(bus);
        u16::from(base.wrapping_add(self.y))
    }

    /// Absolute: $nnnn
    pub(crate) fn addr_absolute(&mut self, bus: &mut impl Bus) -> u16 {
        self.fetch_word(bus)
    }

    /// Absolute,X: $nnnn,X. Returns `(address, page_crossed)`.
    pub(crate) fn addr_absolute_x(&mut self, bus: &mut impl Bus) -> (u16, bool) {
        let base = self.fetch_word(bus);
        let addr = base.wrapping_add(u16::from(self.x));
        ((addr), (base & 0xFF00) != (addr & 0xFF00))
    }

    /// Absolute,X for a read-modify-write instruction, which always
    /// takes the page-cross cycle penalty; the caller doesn't need to
    /// know whether the page was actually crossed.
    pub(crate) fn addr_absolute_x_rmw(&mut self, bus: &mut impl Bus) -> u16 {
        self.addr_absolute_x(bus).0
    }

    /// Absolute,Y: $nnnn,Y. Returns `(address, page_crossed)`.
    pub(crate) fn addr_absolute_y(&mut self, bus: &mut impl Bus) -> (u16, bool) {
        let base = self.fetch_word(bus);
        let addr = base.wrapping_add(u16::from(self.y));
        ((addr), (base & 0xFF00) != (addr & 0xFF00))
    }

    /// Absolute,Y for a read-modify-write instruction (see
    /// [`Self::addr_absolute_x_rmw`]).
    pub(crate) fn addr_absolute_y_rmw(&mut self, bus: &mut impl Bus) -> u16 {
        self.addr_absolute_y(bus).0
    }

    /// Indirect: ($nnnn), JMP only. A single non-wrapping 16-bit read.
    pub(crate) fn addr_indirect(&mut self, bus: &mut impl Bus) -> u16 {
        let ptr = self.fetch_word(bus);
        bus.read16(ptr)
    }

    /// Zero Page Indirect: ($nn) (65C02 addition, no index)
    pub(crate) fn addr_zero_page_indirect(&mut self, bus: &mut impl Bus) -> u16 {
        let ptr = self.fetch(bus);
        let low = bus.read(u16::from(ptr));
        let high = bus.read(u16::from(ptr.wrapping_add(1)));
        u16::from_le_bytes([low, high])
    }

    /// Indexed Indirect: ($nn,X)
    /// The pointer is at zero page address (operand + X), wrapping within ZP.
    pub(crate) fn addr_indexed_indirect(&mut self, bus: &mut impl Bus) -> u16 {
        let base = self.fetch(bus);
        let ptr = base.wrapping_add(self.x);
        let low = bus.read(u16::from(ptr));
        let high = bus.read(u16::from(ptr.wrapping_add(1)));
        u16::from_le_bytes([low, high])
    }

    /// Indirect Indexed: ($nn),Y. Returns `(address, page_crossed)`.
    pub(crate) fn addr_indirect_indexed(&mut self, bus: &mut impl Bus) -> (u16, bool) {
        let ptr = self.fetch(bus);
        let low = bus.read(u16::from(ptr));
        let high = bus.read(u16::from(ptr.wrapping_add(1)));
        let base = u16::from_le_bytes([low, high]);
        let addr = base.wrapping_add(u16::from(self.y));
        (addr, (base & 0xFF00) != (addr & 0xFF00))
    }

    /// Indirect Indexed ($nn),Y for a read-modify-write instruction (see
    /// [`Self::addr_absolute_x_rmw`]).
    pub(crate) fn addr_indirect_indexed_rmw(&mut self, bus: &mut impl Bus) -> u16 {
        self.addr_indirect_indexed(bus).0
    }

    /// Relative: Branch offset. Returns the target address after applying
    /// the signed offset to the address of the instruction following the
    /// branch.
    pub(crate) fn branch_offset(&mut self, bus: &mut impl Bus) -> u16 {
        let offset = self.fetch(bus) as i8;
        self.pc.wrapping_add(offset as u16)
    }

    /// Execute a branch if `condition` is true.
    /// Returns extra cycles (1 if branch taken, +1 more if page crossed).
    pub(crate) fn branch_if(&mut self, bus: &mut impl Bus, condition: bool) -> u32 {
        let target = self.branch_offset(bus);
        if !condition {
            return 0;
        }
        let page_crossed = (self.pc & 0xFF00) != (target & 0xFF00);
        self.pc = target;
        u32::from(page_crossed) + 1
    }
}
