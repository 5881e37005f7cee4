// SPDX-License-Identifier: MIT

//! Native PTY spawn plumbing: `forkpty` + non-blocking async I/O.
//!
//! This module owns exactly the platform primitives a [`crate::session::TerminalSession`]
//! needs: spawn a child on a new pseudo-terminal, read/write it asynchronously,
//! resize its window, and reap its exit status.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::libc;
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{dup, execvp, ForkResult, Pid};
use tokio::io::unix::AsyncFd;

/// Exit status of a terminal's child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Newtype wrapper around `OwnedFd` so it can be driven by `AsyncFd`.
#[derive(Debug)]
pub struct PtyFd(OwnedFd);

impl AsRawFd for PtyFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

fn set_nonblocking(fd: &impl AsRawFd) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    let flags = fcntl(raw, FcntlArg::F_GETFL).map_err(io_err)?;
    let flags = OFlag::from_bits_truncate(flags);
    fcntl(raw, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK)).map_err(io_err)?;
    Ok(())
}

async fn read_chunk(afd: &AsyncFd<PtyFd>, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let mut guard = afd.readable().await?;
        match guard.try_io(|inner| nix::unistd::read(inner.as_raw_fd(), buf).map_err(io_err)) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}

async fn write_all(afd: &AsyncFd<PtyFd>, data: &[u8]) -> io::Result<()> {
    let mut offset = 0;
    while offset < data.len() {
        let mut guard = afd.writable().await?;
        match guard.try_io(|inner| nix::unistd::write(inner, &data[offset..]).map_err(io_err)) {
            Ok(Ok(n)) => offset += n,
            Ok(Err(e)) => return Err(e),
            Err(_would_block) => continue,
        }
    }
    Ok(())
}

fn io_err(e: nix::errno::Errno) -> io::Error {
    io::Error::from_raw_os_error(e as i32)
}

/// A pseudo-terminal running a child process, spawned via `forkpty`.
pub struct NativePty {
    master: AsyncFd<PtyFd>,
    /// A `dup()` of the master fd kept aside purely so the process waiter
    /// can force-close it to unstick a pump parked on a read, without
    /// racing the `AsyncFd`-owned copy.
    unstick_fd: RawFd,
    child_pid: Pid,
}

impl NativePty {
    /// Spawn `command` (argv, `command[0]` is the program) on a new PTY of
    /// the given size. `env` is applied on top of the inherited environment
    /// in the child before `execvp`.
    // forkpty requires unsafe: the child is partially initialized post-fork.
    #[allow(unsafe_code)]
    pub fn spawn(command: &[String], cols: u16, rows: u16, env: &[(String, String)]) -> anyhow::Result<Self> {
        anyhow::ensure!(!command.is_empty(), "command must have at least one argument");

        let winsize = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };

        // SAFETY: forkpty is unsafe because the child is in a
        // partially-initialized state after fork. We immediately exec.
        let result = unsafe { forkpty(&winsize, None) }?;
        let ForkptyResult { master, fork_result } = result;

        match fork_result {
            ForkResult::Child => {
                for (key, value) in env {
                    std::env::set_var(key, value);
                }

                let c_args: Vec<CString> = command
                    .iter()
                    .map(|s| CString::new(s.as_bytes()))
                    .collect::<Result<_, _>>()
                    .unwrap_or_default();
                if c_args.is_empty() {
                    std::process::exit(127);
                }
                let _ = execvp(&c_args[0], &c_args);
                std::process::exit(127);
            }
            ForkResult::Parent { child } => {
                set_nonblocking(&master)?;
                let unstick_fd = dup(master.as_raw_fd())?;
                let afd = AsyncFd::new(PtyFd(master))?;
                Ok(Self { master: afd, unstick_fd, child_pid: child })
            }
        }
    }

    pub async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        read_chunk(&self.master, buf).await
    }

    pub async fn write(&self, data: &[u8]) -> io::Result<()> {
        write_all(&self.master, data).await
    }

    pub fn child_pid(&self) -> u32 {
        self.child_pid.as_raw() as u32
    }

    // TIOCSWINSZ ioctl requires unsafe for the libc::ioctl call.
    #[allow(unsafe_code)]
    pub fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()> {
        let ws = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };
        // SAFETY: TIOCSWINSZ is a well-defined ioctl on a valid master fd
        // with a properly initialized Winsize.
        let ret = unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
        if ret < 0 {
            anyhow::bail!("TIOCSWINSZ ioctl failed: {}", io::Error::last_os_error());
        }
        Ok(())
    }

    /// Block (on the calling thread — call from `spawn_blocking`) until the
    /// child exits, then close the unstick fd so a pump still parked on a
    /// read of the master side observes EOF/EBADF.
    pub fn wait_and_unstick(&self) -> anyhow::Result<ExitStatus> {
        let status = wait_for_exit(self.child_pid)?;
        let _ = nix::unistd::close(self.unstick_fd);
        Ok(status)
    }

    /// Ask the child's process group to exit. Callable directly (not just
    /// from `Drop`) so an explicit `close()` terminates the child even
    /// while other `Arc<NativePty>` clones are still held by the pump,
    /// writer, and waiter tasks.
    pub fn signal_hangup(&self) {
        let _ = kill(self.child_pid, Signal::SIGHUP);
    }

    /// Force-kill the child immediately.
    pub fn signal_kill(&self) {
        let _ = kill(self.child_pid, Signal::SIGKILL);
    }
}

impl Drop for NativePty {
    fn drop(&mut self) {
        // Best-effort graceful shutdown: SIGHUP then SIGKILL.
        self.signal_hangup();
        std::thread::sleep(std::time::Duration::from_millis(50));
        self.signal_kill();
        let _ = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG));
        let _ = nix::unistd::close(self.unstick_fd);
    }
}

fn wait_for_exit(pid: Pid) -> anyhow::Result<ExitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ExitStatus { code: Some(code), signal: None }),
            Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(ExitStatus { code: None, signal: Some(sig as i32) }),
            Ok(_) => continue,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => anyhow::bail!("waitpid failed: {e}"),
        }
    }
}
