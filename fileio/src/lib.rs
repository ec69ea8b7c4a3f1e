//! Memory-mapped file I/O pseudo-device.
//!
//! A custom device (no real-hardware counterpart) used by guest-side
//! BASIC-style LOAD/SAVE routines to read and write host files one byte
//! at a time. The guest writes a filename into a small register window,
//! issues a command, then drives REDS/WRITE a byte per register access.
//!
//! Register offsets:
//!
//! | Reg | Read          | Write                          |
//! |-----|---------------|--------------------------------|
//! | $0  | status        | command                        |
//! | $1  | data in       | data out                       |
//! | $2  | filename index| filename index                 |
//! | $3  | char at index | char at index (auto-increments)|

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};

pub const REG_STATUS: u8 = 0x00;
pub const REG_DATA: u8 = 0x01;
pub const REG_NAMEINDEX: u8 = 0x02;
pub const REG_NAMECHAR: u8 = 0x03;

pub const CMD_RESET: u8 = 0x00;
pub const CMD_OPEN_R: u8 = 0x01;
pub const CMD_OPEN_W: u8 = 0x02;
pub const CMD_READ: u8 = 0x03;
pub const CMD_WRITE: u8 = 0x04;
pub const CMD_CLOSE: u8 = 0x05;

pub const STATUS_OPEN: u8 = 0x01;
pub const STATUS_EOF: u8 = 0x02;
pub const STATUS_ERR: u8 = 0x04;
pub const STATUS_READY: u8 = 0x80;

const NAME_MAXLEN: usize = 256;

/// Memory-mapped file I/O device.
pub struct FileIo {
    file: Option<File>,
    status: u8,
    data: u8,
    name_index: u8,
    filename: [u8; NAME_MAXLEN],
}

impl FileIo {
    #[must_use]
    pub fn new() -> Self {
        Self {
            file: None,
            status: STATUS_READY,
            data: 0,
            name_index: 0,
            filename: [0; NAME_MAXLEN],
        }
    }

    /// Close any open file and restore the device to its reset state.
    pub fn reset(&mut self) {
        self.file = None;
        self.status = STATUS_READY;
        self.data = 0;
        self.name_index = 0;
        self.filename = [0; NAME_MAXLEN];
    }

    pub fn read(&self, reg: u8) -> u8 {
        match reg {
            REG_STATUS => self.status,
            REG_DATA => self.data,
            REG_NAMEINDEX => self.name_index,
            REG_NAMECHAR => self.filename[self.name_index as usize],
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        match reg {
            REG_STATUS => self.command(value),
            REG_DATA => self.data = value,
            REG_NAMEINDEX => self.name_index = value,
            REG_NAMECHAR => {
                self.filename[self.name_index as usize] = value;
                self.name_index = self.name_index.saturating_add(1);
            }
            _ => {}
        }
    }

    fn command(&mut self, cmd: u8) {
        match cmd {
            CMD_RESET => self.reset(),
            CMD_OPEN_R => self.open(false),
            CMD_OPEN_W => self.open(true),
            CMD_READ => self.do_read(),
            CMD_WRITE => self.do_write(),
            CMD_CLOSE => {
                self.file = None;
                self.status = STATUS_READY;
            }
            _ => {}
        }
    }

    fn open(&mut self, write: bool) {
        self.file = None;
        let name = self.current_name();
        let opened = if write {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&name)
        } else {
            File::open(&name)
        };
        match opened {
            Ok(f) => {
                self.file = Some(f);
                self.status = STATUS_READY | STATUS_OPEN;
            }
            Err(_) => {
                self.status = STATUS_READY | STATUS_ERR;
            }
        }
    }

    fn do_read(&mut self) {
        let Some(file) = self.file.as_mut() else {
            self.status |= STATUS_ERR;
            return;
        };
        let mut byte = [0u8; 1];
        match file.read(&mut byte) {
            Ok(1) => self.data = byte[0],
            Ok(_) => {
                self.status |= STATUS_EOF;
                self.data = 0;
            }
            Err(_) => self.status |= STATUS_ERR,
        }
    }

    fn do_write(&mut self) {
        let Some(file) = self.file.as_mut() else {
            self.status |= STATUS_ERR;
            return;
        };
        if file.write_all(&[self.data]).is_err() {
            self.status |= STATUS_ERR;
        }
    }

    /// The filename buffer up to `name_index`, decoded as a host path.
    ///
    /// Guest-side filenames are not guaranteed to be valid UTF-8; bytes
    /// outside the ASCII range are passed through losslessly on
    /// platforms with `OsStr::from_bytes`, and lossy-decoded elsewhere.
    fn current_name(&self) -> std::path::PathBuf {
        let bytes = &self.filename[..self.name_index as usize];
        #[cfg(unix)]
        {
            use std::ffi::OsStr;
            use std::os::unix::ffi::OsStrExt;
            std::path::PathBuf::from(OsStr::from_bytes(bytes))
        }
        #[cfg(not(unix))]
        {
            std::path::PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl Default for FileIo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_name(dev: &mut FileIo, name: &str) {
        dev.write(REG_NAMEINDEX, 0);
        for b in name.bytes() {
            dev.write(REG_NAMECHAR, b);
        }
    }

    #[test]
    fn write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greeting.txt");
        let mut dev = FileIo::new();

        write_name(&mut dev, path.to_str().unwrap());
        dev.write(REG_STATUS, CMD_OPEN_W);
        assert_eq!(dev.read(REG_STATUS) & STATUS_OPEN, STATUS_OPEN);

        for b in b"hi" {
            dev.write(REG_DATA, *b);
            dev.write(REG_STATUS, CMD_WRITE);
            assert_eq!(dev.read(REG_STATUS) & STATUS_ERR, 0);
        }
        dev.write(REG_STATUS, CMD_CLOSE);
        assert_eq!(dev.read(REG_STATUS), STATUS_READY);

        write_name(&mut dev, path.to_str().unwrap());
        dev.write(REG_STATUS, CMD_OPEN_R);
        assert_eq!(dev.read(REG_STATUS) & STATUS_OPEN, STATUS_OPEN);

        let mut got = Vec::new();
        loop {
            dev.write(REG_STATUS, CMD_READ);
            if dev.read(REG_STATUS) & STATUS_EOF != 0 {
                break;
            }
            got.push(dev.read(REG_DATA));
        }
        assert_eq!(got, b"hi");
    }

    #[test]
    fn open_read_missing_file_sets_err() {
        let mut dev = FileIo::new();
        write_name(&mut dev, "/nonexistent/path/does/not/exist.bin");
        dev.write(REG_STATUS, CMD_OPEN_R);
        assert_eq!(dev.read(REG_STATUS) & STATUS_ERR, STATUS_ERR);
        assert_eq!(dev.read(REG_STATUS) & STATUS_OPEN, 0);
    }

    #[test]
    fn read_without_open_file_sets_err() {
        let mut dev = FileIo::new();
        dev.write(REG_STATUS, CMD_READ);
        assert_eq!(dev.read(REG_STATUS) & STATUS_ERR, STATUS_ERR);
    }

    #[test]
    fn open_write_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncate.txt");
        std::fs::write(&path, b"old contents").unwrap();

        let mut dev = FileIo::new();
        write_name(&mut dev, path.to_str().unwrap());
        dev.write(REG_STATUS, CMD_OPEN_W);
        dev.write(REG_STATUS, CMD_CLOSE);

        assert_eq!(std::fs::read(&path).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn name_index_auto_increments_and_is_readable() {
        let mut dev = FileIo::new();
        write_name(&mut dev, "abc");
        assert_eq!(dev.read(REG_NAMEINDEX), 3);
    }

    #[test]
    fn reset_closes_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.txt");
        let mut dev = FileIo::new();
        write_name(&mut dev, path.to_str().unwrap());
        dev.write(REG_STATUS, CMD_OPEN_W);
        assert!(dev.file.is_some());
        dev.write(REG_STATUS, CMD_RESET);
        assert!(dev.file.is_none());
        assert_eq!(dev.read(REG_STATUS), STATUS_READY);
    }
}
