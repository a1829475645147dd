//! Process control for the detached daemon.

use std::io;
use std::process::Command;

/// Run the spawned daemon in its own session so it outlives the caller's
/// terminal and process group
#[cfg(unix)]
pub fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub fn detach(_command: &mut Command) {}

/// True if `pid` is alive and, where it can be checked, runs filewarden
#[cfg(unix)]
pub fn is_daemon_process(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    let alive = unsafe { libc::kill(raw, 0) == 0 }
        || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);
    if !alive {
        return false;
    }

    #[cfg(target_os = "linux")]
    {
        match std::fs::read(format!("/proc/{pid}/cmdline")) {
            Ok(cmdline) => String::from_utf8_lossy(&cmdline).contains("filewarden"),
            Err(_) => false,
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        true
    }
}

#[cfg(not(unix))]
pub fn is_daemon_process(_pid: u32) -> bool {
    false
}

/// Ask `pid` to shut down gracefully (SIGTERM)
#[cfg(unix)]
pub fn terminate(pid: u32) -> io::Result<()> {
    let raw = i32::try_from(pid).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    if unsafe { libc::kill(raw, libc::SIGTERM) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn terminate(_pid: u32) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_detached_child_leads_its_own_session() {
        let mut command = Command::new("sleep");
        command.arg("5");
        detach(&mut command);
        let mut child = command.spawn().unwrap();

        let pid = child.id() as i32;
        let session = unsafe { libc::getsid(pid) };
        let ours = unsafe { libc::getsid(0) };

        child.kill().unwrap();
        child.wait().unwrap();
        assert_eq!(session, pid);
        assert_ne!(session, ours);
    }

    #[test]
    fn test_terminate_stops_process() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();

        terminate(child.id()).unwrap();

        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_dead_pid_is_not_the_daemon() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        child.kill().unwrap();
        child.wait().unwrap();

        assert!(!is_daemon_process(pid));
        assert!(!is_daemon_process(0));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_other_programs_are_not_the_daemon() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let unrelated = is_daemon_process(child.id());
        child.kill().unwrap();
        child.wait().unwrap();

        assert!(!unrelated);
        // The test binary is named after the crate
        assert!(is_daemon_process(std::process::id()));
    }
}
