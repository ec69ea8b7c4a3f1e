//! stdin/stdout-backed ACIA input/output.
//!
//! Readiness is checked with a raw `select()` on the stdin file descriptor
//! rather than through `std::io::Stdin`'s buffering, which can hold a byte
//! `poll_ready` never sees. Bytes are read with a raw `read()` for the same
//! reason, mirroring the original implementation's fd-level workaround.

use mos_acia_6551::{AciaInput, AciaOutput};
use std::io::Write;

/// Non-blocking stdin source for ACIA #1.
pub struct StdinInput;

impl AciaInput for StdinInput {
    // Raw select() on fd 0: the only way to poll stdin readiness without
    // routing through std::io::Stdin's buffer.
    #[allow(unsafe_code)]
    fn poll_ready(&mut self) -> bool {
        unsafe {
            let mut fds: libc::fd_set = std::mem::zeroed();
            libc::FD_ZERO(&mut fds);
            libc::FD_SET(0, &mut fds);
            let mut tv = libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            };
            libc::select(1, &mut fds, std::ptr::null_mut(), std::ptr::null_mut(), &mut tv) > 0
        }
    }

    // Raw read() on fd 0, for the same reason.
    #[allow(unsafe_code)]
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = 0u8;
        let n = unsafe { libc::read(0, std::ptr::addr_of_mut!(byte).cast(), 1) };
        if n == 1 { Some(byte) } else { None }
    }
}

/// Flushes every byte to stdout immediately, matching the original's
/// `fputc`+`fflush` pairing.
pub struct StdoutOutput;

impl AciaOutput for StdoutOutput {
    fn write_byte(&mut self, value: u8) {
        let mut out = std::io::stdout();
        let _ = out.write_all(&[value]);
        let _ = out.flush();
    }
}
