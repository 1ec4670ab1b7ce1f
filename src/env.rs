//! Host facts recorded alongside each result set.

use std::path::Path;
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::{Disks, RefreshKind, System};

/// Machine and checkout the timings were taken on.
#[derive(Debug, Clone, Serialize)]
pub struct EnvMetadata {
    /// Collection time.
    pub collected_at: DateTime<Utc>,
    /// CPU, memory and OS of the host.
    pub host: HostInfo,
    /// Volume holding the Parquet interchange files.
    pub data_volume: Option<VolumeInfo>,
    /// Volume the charts and summaries were written to.
    pub results_volume: Option<VolumeInfo>,
    /// Revision of the checkout the harness ran from.
    pub revision: Option<Revision>,
}

/// CPU, memory and operating system.
#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    /// Host name as reported by the OS.
    pub hostname: Option<String>,
    /// OS name and version.
    pub os: Option<String>,
    /// Kernel version.
    pub kernel: Option<String>,
    /// Brand string of the first logical CPU.
    pub cpu: Option<String>,
    /// Physical core count, when the platform reports it.
    pub physical_cores: Option<usize>,
    /// Logical CPU count.
    pub logical_cores: usize,
    /// Total memory.
    pub memory_bytes: u64,
}

/// Mounted volume containing a path; the longest matching mount wins.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeInfo {
    /// Where the volume is mounted.
    pub mount_point: String,
    /// Filesystem type, e.g. `ext4`.
    pub filesystem: String,
    /// Capacity.
    pub total_bytes: u64,
    /// Free space at collection time.
    pub available_bytes: u64,
}

/// Git revision; absent outside a repository or without `git` on `PATH`.
#[derive(Debug, Clone, Serialize)]
pub struct Revision {
    /// Full commit hash.
    pub commit: String,
    /// Short ref name; `HEAD` on a detached checkout.
    pub branch: Option<String>,
    /// Uncommitted changes present.
    pub dirty: bool,
}

impl EnvMetadata {
    /// Snapshots the host. Directories that do not exist yet report no volume.
    pub fn collect(data_dir: &Path, results_dir: &Path) -> Self {
        let disks = Disks::new_with_refreshed_list();
        Self {
            collected_at: Utc::now(),
            host: HostInfo::collect(),
            data_volume: volume_of(&disks, data_dir),
            results_volume: volume_of(&disks, results_dir),
            revision: Revision::of(Path::new(".")),
        }
    }
}

impl HostInfo {
    fn collect() -> Self {
        let mut sys = System::new_with_specifics(RefreshKind::everything());
        sys.refresh_all();
        Self {
            hostname: System::host_name(),
            os: System::long_os_version(),
            kernel: System::kernel_version(),
            cpu: sys.cpus().first().map(|cpu| cpu.brand().to_string()),
            physical_cores: sys.physical_core_count(),
            logical_cores: sys.cpus().len().max(1),
            memory_bytes: sys.total_memory(),
        }
    }
}

fn volume_of(disks: &Disks, path: &Path) -> Option<VolumeInfo> {
    let canonical = path.canonicalize().ok()?;
    disks
        .list()
        .iter()
        .filter(|disk| canonical.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| VolumeInfo {
            mount_point: disk.mount_point().display().to_string(),
            filesystem: disk.file_system().to_string_lossy().into_owned(),
            total_bytes: disk.total_space(),
            available_bytes: disk.available_space(),
        })
}

impl Revision {
    fn of(dir: &Path) -> Option<Self> {
        let commit = git(dir, &["rev-parse", "HEAD"])?;
        Some(Self {
            commit,
            branch: git(dir, &["rev-parse", "--abbrev-ref", "HEAD"]),
            dirty: git(dir, &["status", "--porcelain"]).is_some_and(|out| !out.is_empty()),
        })
    }
}

fn git(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git").arg("-C").arg(dir).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|out| out.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directories_report_no_volume() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let env = EnvMetadata::collect(&dir.path().join("absent"), dir.path());
        assert!(env.data_volume.is_none());
        assert!(env.host.logical_cores >= 1);
    }

    #[test]
    fn serializes_with_collection_time() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let env = EnvMetadata::collect(dir.path(), dir.path());
        let json = serde_json::to_value(&env).expect("json");
        assert!(json.get("collected_at").is_some());
        assert!(json["host"].get("logical_cores").is_some());
    }

    #[test]
    fn git_outside_a_repository_yields_nothing() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        assert!(Revision::of(dir.path()).is_none());
    }
}
