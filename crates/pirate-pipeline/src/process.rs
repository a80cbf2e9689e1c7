//! Child process helpers shared by the decode and emission stages.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

const EXIT_POLL: Duration = Duration::from_millis(10);

/// Locate an executable, searching `PATH` for bare names.
pub fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.is_absolute() || program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Ask a child to exit (SIGTERM on unix).
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn request_terminate(child: &mut Child) -> io::Result<()> {
    let Ok(pid) = libc::pid_t::try_from(child.id()) else {
        return child.kill();
    };
    // SAFETY: kill(2) takes plain integers; callers only pass children that
    // have not been reaped, so the pid cannot have been recycled.
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
pub fn request_terminate(child: &mut Child) -> io::Result<()> {
    child.kill()
}

/// Request a graceful exit, then kill the child if it outlives `grace`.
pub fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    if let Err(e) = request_terminate(child) {
        debug!("Graceful stop of pid {} failed: {e}", child.id());
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        thread::sleep(EXIT_POLL);
    }

    debug!("pid {} ignored graceful stop, killing", child.id());
    kill_and_reap(child)
}

/// Kill a child immediately and collect its exit status.
pub fn kill_and_reap(child: &mut Child) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }
    // The child may exit between the check and the kill; waiting covers both.
    let _ = child.kill();
    child.wait()
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{script, PROCESS_LOCK};
    use std::process::{Command, Stdio};

    #[test]
    fn test_resolve_program() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = PROCESS_LOCK.lock();
        let tool = script(dir.path(), "tool", "exit 0");

        assert_eq!(resolve_program(&tool), Some(tool.clone()));
        assert!(resolve_program(&dir.path().join("missing")).is_none());
        assert!(resolve_program(Path::new("sh")).is_some());
        assert!(resolve_program(Path::new("pirate-radio-no-such-tool")).is_none());
    }

    #[test]
    fn test_terminate_graceful() {
        let _guard = PROCESS_LOCK.lock();
        let mut child = Command::new("sleep")
            .arg("10")
            .stdout(Stdio::null())
            .spawn()
            .unwrap();

        let started = Instant::now();
        let status = terminate(&mut child, Duration::from_secs(5)).unwrap();
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_terminate_escalates_to_kill() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = PROCESS_LOCK.lock();
        let stubborn = script(dir.path(), "stubborn", "trap '' TERM\nsleep 10 &\nwait");
        let mut child = Command::new(&stubborn).spawn().unwrap();
        // Give the shell time to install its trap.
        thread::sleep(Duration::from_millis(200));

        let started = Instant::now();
        let status = terminate(&mut child, Duration::from_millis(200)).unwrap();
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_kill_exited_child() {
        let _guard = PROCESS_LOCK.lock();
        let mut child = Command::new("true").spawn().unwrap();
        child.wait().unwrap();
        assert!(kill_and_reap(&mut child).unwrap().success());
    }
}
