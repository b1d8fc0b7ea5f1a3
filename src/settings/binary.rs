//! Big-endian binary framing for persisted mode settings.

use std::io::{self, Read, Write};

use crate::model::{Bounds, Location, ModeId, Placement};
use crate::settings::SettingsError;

pub struct DataOutput<W> {
    inner: W,
}

impl<W: Write> DataOutput<W> {
    pub fn new(inner: W) -> Self { Self { inner } }

    pub fn into_inner(self) -> W { self.inner }

    pub fn write_u8(&mut self, value: u8) -> Result<(), SettingsError> {
        self.inner.write_all(&[value])?;
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), SettingsError> {
        self.write_u8(u8::from(value))
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), SettingsError> {
        self.inner.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), SettingsError> {
        self.inner.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    pub fn write_len(&mut self, len: usize) -> Result<(), SettingsError> {
        let len = u32::try_from(len).map_err(|_| SettingsError::TooLong(len))?;
        self.write_u32(len)
    }

    /// UTF-8 bytes behind a `u16` length.
    pub fn write_utf(&mut self, value: &str) -> Result<(), SettingsError> {
        let len = u16::try_from(value.len()).map_err(|_| SettingsError::TooLong(value.len()))?;
        self.inner.write_all(&len.to_be_bytes())?;
        self.inner.write_all(value.as_bytes())?;
        Ok(())
    }

    pub fn write_location(&mut self, location: &Location) -> Result<(), SettingsError> {
        self.write_utf(location.mode().as_str())?;
        self.write_utf(location.root())?;
        match location.placement() {
            None => self.write_bool(false)?,
            Some(placement) => {
                self.write_bool(true)?;
                self.write_len(placement.path.len())?;
                for &step in &placement.path {
                    self.write_len(step)?;
                }
                match placement.bounds {
                    None => self.write_bool(false)?,
                    Some(b) => {
                        self.write_bool(true)?;
                        for v in [b.x, b.y, b.width, b.height] {
                            self.write_i32(v)?;
                        }
                    }
                }
            }
        }
        self.write_bool(location.is_application_defined())
    }
}

pub struct DataInput<R> {
    inner: R,
}

impl<R: Read> DataInput<R> {
    pub fn new(inner: R) -> Self { Self { inner } }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SettingsError> {
        let mut buf = [0; N];
        self.inner.read_exact(&mut buf).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => SettingsError::Truncated { needed: N },
            _ => SettingsError::Io(err),
        })?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, SettingsError> { Ok(self.read_array::<1>()?[0]) }

    pub fn read_bool(&mut self) -> Result<bool, SettingsError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SettingsError::InvalidValue {
                field: "bool",
                value: other.to_string(),
            }),
        }
    }

    pub fn read_u32(&mut self) -> Result<u32, SettingsError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, SettingsError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_len(&mut self) -> Result<usize, SettingsError> {
        let len = self.read_u32()?;
        usize::try_from(len).map_err(|_| SettingsError::TooLong(usize::MAX))
    }

    pub fn read_utf(&mut self) -> Result<String, SettingsError> {
        let len = u16::from_be_bytes(self.read_array()?) as usize;
        let mut buf = vec![0; len];
        self.inner.read_exact(&mut buf).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => SettingsError::Truncated { needed: len },
            _ => SettingsError::Io(err),
        })?;
        String::from_utf8(buf).map_err(|_| SettingsError::InvalidUtf8)
    }

    pub fn read_location(&mut self) -> Result<Location, SettingsError> {
        let mode = ModeId::new(self.read_utf()?);
        let root = self.read_utf()?;
        if root.is_empty() {
            return Err(SettingsError::InvalidValue { field: "root", value: root });
        }
        let placement = if self.read_bool()? {
            let len = self.read_len()?;
            let path = (0..len).map(|_| self.read_len()).collect::<Result<Vec<_>, _>>()?;
            let bounds = if self.read_bool()? {
                Some(Bounds::new(self.read_i32()?, self.read_i32()?, self.read_i32()?, self.read_i32()?))
            } else {
                None
            };
            Some(Placement { path, bounds })
        } else {
            None
        };
        let application = self.read_bool()?;
        Ok(Location::new(mode, root, placement).application_defined(application))
    }
}
