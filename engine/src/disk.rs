//! The filesystem interface (§6): `mtime`, `exists`, `mkdir_p`, `read_text`. Injectable so the
//! staleness oracle (§4.C) can be tested against a fake clock without touching a real filesystem.

use std::{io::Result, path::Path, time::SystemTime};

pub trait DiskInterface {
    fn modified(&self, path: &Path) -> Result<SystemTime>;
    fn exists(&self, path: &Path) -> bool;
    fn mkdir_p(&self, path: &Path) -> Result<()>;
    fn read_text(&self, path: &Path) -> Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDiskInterface;

impl DiskInterface for SystemDiskInterface {
    fn modified(&self, path: &Path) -> Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn mkdir_p(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path)
    }
}
