// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end smoke tests.
//!
//! Spawns the real `liftd` and `cab` binaries as subprocesses and inspects
//! the system from the outside: through the call pad protocol and through
//! each car's shared memory block.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use liftcore::shm::SharedBlock;
use liftcore::state::RawState;

/// Resolve the path to a compiled workspace binary.
pub fn binary(name: &str) -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join(name)
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Poll a predicate until it holds or the deadline passes.
pub fn eventually(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if pred() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// A child process killed on drop.
struct Reaped(Child);

impl Drop for Reaped {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

/// A running `liftd` process.
pub struct Controller {
    _child: Reaped,
    pub addr: String,
}

impl Controller {
    pub fn start() -> anyhow::Result<Controller> {
        let bin = binary("liftd");
        anyhow::ensure!(bin.exists(), "liftd binary not found at {}", bin.display());
        let addr = format!("127.0.0.1:{}", free_port()?);
        let child = Command::new(&bin)
            .args(["--listen", &addr])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(Controller { _child: Reaped(child), addr })
    }

    /// One call-pad exchange against this controller.
    pub async fn call(&self, src: &str, dst: &str) -> anyhow::Result<cab::call::CallReply> {
        cab::call::request(&self.addr, src.parse()?, dst.parse()?).await
    }

    /// Call repeatedly until the expected reply arrives.
    pub async fn call_until(
        &self,
        src: &str,
        dst: &str,
        want: &cab::call::CallReply,
        timeout: Duration,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(reply) = self.call(src, dst).await {
                if &reply == want {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
    }
}

/// A running `cab car` process plus an attachment to its shared block.
pub struct Car {
    _child: Reaped,
    pub name: String,
    block: SharedBlock,
}

impl Car {
    pub fn start(
        name: &str,
        low: &str,
        high: &str,
        delay_ms: u64,
        controller: &str,
    ) -> anyhow::Result<Car> {
        let bin = binary("cab");
        anyhow::ensure!(bin.exists(), "cab binary not found at {}", bin.display());
        let child = Command::new(&bin)
            .args([
                "car",
                name,
                low,
                high,
                &delay_ms.to_string(),
                "--controller",
                controller,
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let child = Reaped(child);

        // The block appears once the car process has created it.
        let mut attached = None;
        let appeared = eventually(Duration::from_secs(5), || {
            if attached.is_none() {
                attached = SharedBlock::attach(name).ok();
            }
            attached.is_some()
        });
        anyhow::ensure!(appeared, "car {name} never published its shared block");
        let Some(block) = attached else {
            anyhow::bail!("car {name} never published its shared block");
        };
        Ok(Car { _child: child, name: name.to_owned(), block })
    }

    pub fn block(&self) -> &SharedBlock {
        &self.block
    }

    pub fn raw(&self) -> RawState {
        self.block().raw()
    }

    /// Poll the block until the predicate holds.
    pub fn eventually(&self, timeout: Duration, pred: impl Fn(&RawState) -> bool) -> bool {
        eventually(timeout, || pred(&self.raw()))
    }
}

/// A running `cab safety` process with captured stdout.
pub struct Safety {
    child: Option<Child>,
}

impl Safety {
    pub fn start(car: &str) -> anyhow::Result<Safety> {
        let bin = binary("cab");
        anyhow::ensure!(bin.exists(), "cab binary not found at {}", bin.display());
        let child = Command::new(&bin)
            .args(["safety", car])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(Safety { child: Some(child) })
    }

    /// Kill the monitor and return everything it wrote to stdout.
    pub fn stop_and_read_output(mut self) -> anyhow::Result<String> {
        let Some(mut child) = self.child.take() else {
            return Ok(String::new());
        };
        let _ = child.kill();
        let output = child.wait_with_output()?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Drop for Safety {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Run one `cab internal` operation to completion.
pub fn internal(car: &str, op: &str) -> anyhow::Result<std::process::ExitStatus> {
    let bin = binary("cab");
    anyhow::ensure!(bin.exists(), "cab binary not found at {}", bin.display());
    Ok(Command::new(&bin)
        .args(["internal", car, op])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?)
}
