//! The staleness oracle (§4.C): `needs_rerun(task) -> Option<reason>`. Ordered checks, first
//! match wins. Every `mtime` call increments the ambient metrics counter.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::depfile;
use crate::disk::DiskInterface;
use orchestra_metrics::scoped_metric;

#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("cannot stat {0}: {1}")]
    Stat(PathBuf, std::io::Error),
    #[error("cannot read depfile {0}: {1}")]
    ReadDepfile(PathBuf, std::io::Error),
    #[error("malformed depfile {0}: {1}")]
    ParseDepfile(PathBuf, #[source] depfile::DepfileError),
}

/// Describes everything the oracle needs to judge one task; `abs_*` paths are already resolved.
/// `root` is the project root that depfile-reported paths (relative to the compiler's invocation
/// directory, not necessarily the cwd this process happens to have) are joined against.
pub struct RebuildInputs<'a> {
    pub force: bool,
    pub root: &'a Path,
    pub abs_inputs: &'a [PathBuf],
    pub abs_outputs: &'a [PathBuf],
    pub abs_deps: &'a [PathBuf],
    pub abs_depfile: Option<&'a Path>,
    pub module_mtimes: &'a [PathBuf],
}

fn mtime(disk: &dyn DiskInterface, path: &Path) -> Result<std::time::SystemTime, RebuildError> {
    scoped_metric!("mtime");
    disk.modified(path).map_err(|e| RebuildError::Stat(path.to_path_buf(), e))
}

fn max_mtime(disk: &dyn DiskInterface, paths: &[PathBuf]) -> Result<Option<std::time::SystemTime>, RebuildError> {
    let mut max = None;
    for p in paths {
        let m = mtime(disk, p)?;
        max = Some(match max {
            Some(cur) if cur >= m => cur,
            _ => m,
        });
    }
    Ok(max)
}

fn min_mtime(disk: &dyn DiskInterface, paths: &[PathBuf]) -> Result<Option<std::time::SystemTime>, RebuildError> {
    let mut min = None;
    for p in paths {
        let m = mtime(disk, p)?;
        min = Some(match min {
            Some(cur) if cur <= m => cur,
            _ => m,
        });
    }
    Ok(min)
}

/// Returns `Some(reason)` if the task must rerun, `None` if up to date.
pub fn needs_rerun(disk: &dyn DiskInterface, inputs: &RebuildInputs<'_>) -> Result<Option<&'static str>, RebuildError> {
    if inputs.force {
        return Ok(Some("forced"));
    }
    if inputs.abs_inputs.is_empty() {
        return Ok(Some("always rebuild"));
    }
    if inputs.abs_outputs.is_empty() {
        return Ok(Some("always rebuild"));
    }
    for out in inputs.abs_outputs {
        if !disk.exists(out) {
            return Ok(Some("missing outputs"));
        }
    }

    let min_out = min_mtime(disk, inputs.abs_outputs)?;

    if let Some(max_build) = max_mtime(disk, inputs.module_mtimes)? {
        if Some(max_build) >= min_out {
            return Ok(Some("build files changed"));
        }
    }

    if !inputs.abs_deps.is_empty() {
        if let Some(max_dep) = max_mtime(disk, inputs.abs_deps)? {
            if Some(max_dep) >= min_out {
                return Ok(Some("manual dependency changed"));
            }
        }
    }

    if let Some(depfile_path) = inputs.abs_depfile {
        if disk.exists(depfile_path) {
            let contents = disk
                .read_text(depfile_path)
                .map_err(|e| RebuildError::ReadDepfile(depfile_path.to_path_buf(), e))?;
            let deps = depfile::parse(&contents)
                .map_err(|e| RebuildError::ParseDepfile(depfile_path.to_path_buf(), e))?;
            let rooted_deps: Vec<PathBuf> = deps.iter().map(|d| inputs.root.join(d)).collect();
            if let Some(max_dep) = max_mtime(disk, &rooted_deps)? {
                if Some(max_dep) >= min_out {
                    return Ok(Some("depfile dependency changed"));
                }
            }
        }
    }

    if let Some(max_in) = max_mtime(disk, inputs.abs_inputs)? {
        if Some(max_in) >= min_out {
            return Ok(Some("input changed"));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::{Duration, SystemTime};

    #[derive(Default)]
    struct FakeDisk {
        mtimes: RefCell<HashMap<PathBuf, SystemTime>>,
        files: RefCell<HashMap<PathBuf, String>>,
    }

    impl FakeDisk {
        fn touch(&self, path: &str, secs: u64) {
            self.mtimes.borrow_mut().insert(
                PathBuf::from(path),
                SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            );
        }

        fn write(&self, path: &str, contents: &str, secs: u64) {
            self.touch(path, secs);
            self.files.borrow_mut().insert(PathBuf::from(path), contents.to_string());
        }
    }

    impl DiskInterface for FakeDisk {
        fn modified(&self, path: &Path) -> std::io::Result<SystemTime> {
            self.mtimes
                .borrow()
                .get(path)
                .copied()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no mtime"))
        }
        fn exists(&self, path: &Path) -> bool {
            self.mtimes.borrow().contains_key(path)
        }
        fn mkdir_p(&self, _path: &Path) -> std::io::Result<()> {
            Ok(())
        }
        fn read_text(&self, path: &Path) -> std::io::Result<String> {
            self.files
                .borrow()
                .get(path)
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no file"))
        }
    }

    fn base_inputs<'a>(ins: &'a [PathBuf], outs: &'a [PathBuf]) -> RebuildInputs<'a> {
        RebuildInputs {
            force: false,
            root: Path::new(""),
            abs_inputs: ins,
            abs_outputs: outs,
            abs_deps: &[],
            abs_depfile: None,
            module_mtimes: &[],
        }
    }

    #[test]
    fn test_missing_output_reruns() {
        let disk = FakeDisk::default();
        disk.touch("a.c", 1);
        let ins = vec![PathBuf::from("a.c")];
        let outs = vec![PathBuf::from("a.o")];
        let reason = needs_rerun(&disk, &base_inputs(&ins, &outs)).unwrap();
        assert_eq!(reason, Some("missing outputs"));
    }

    #[test]
    fn test_clean_when_output_newer() {
        let disk = FakeDisk::default();
        disk.touch("a.c", 1);
        disk.touch("a.o", 2);
        let ins = vec![PathBuf::from("a.c")];
        let outs = vec![PathBuf::from("a.o")];
        let reason = needs_rerun(&disk, &base_inputs(&ins, &outs)).unwrap();
        assert_eq!(reason, None);
    }

    #[test]
    fn test_input_changed_reruns() {
        let disk = FakeDisk::default();
        disk.touch("a.o", 1);
        disk.touch("a.c", 2);
        let ins = vec![PathBuf::from("a.c")];
        let outs = vec![PathBuf::from("a.o")];
        let reason = needs_rerun(&disk, &base_inputs(&ins, &outs)).unwrap();
        assert_eq!(reason, Some("input changed"));
    }

    #[test]
    fn test_same_second_forces_rebuild() {
        let disk = FakeDisk::default();
        disk.touch("a.c", 5);
        disk.touch("a.o", 5);
        let ins = vec![PathBuf::from("a.c")];
        let outs = vec![PathBuf::from("a.o")];
        let reason = needs_rerun(&disk, &base_inputs(&ins, &outs)).unwrap();
        assert_eq!(reason, Some("input changed"));
    }

    #[test]
    fn test_depfile_drives_rebuild() {
        let disk = FakeDisk::default();
        disk.touch("main.c", 1);
        disk.touch("main.o", 2);
        disk.touch("header.h", 3);
        disk.write("main.d", "main.o: main.c header.h", 1);
        let ins = vec![PathBuf::from("main.c")];
        let outs = vec![PathBuf::from("main.o")];
        let mut inputs = base_inputs(&ins, &outs);
        let depfile_path = PathBuf::from("main.d");
        inputs.abs_depfile = Some(&depfile_path);
        let reason = needs_rerun(&disk, &inputs).unwrap();
        assert_eq!(reason, Some("depfile dependency changed"));
    }

    #[test]
    fn test_forced_wins_over_clean() {
        let disk = FakeDisk::default();
        disk.touch("a.c", 1);
        disk.touch("a.o", 2);
        let ins = vec![PathBuf::from("a.c")];
        let outs = vec![PathBuf::from("a.o")];
        let mut inputs = base_inputs(&ins, &outs);
        inputs.force = true;
        let reason = needs_rerun(&disk, &inputs).unwrap();
        assert_eq!(reason, Some("forced"));
    }
}
