// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-shared car state block.
//!
//! Each car publishes one POSIX shared memory object named `/car<NAME>`
//! holding a mutex, a condition variable, and the car's externally visible
//! state. Both synchronisation primitives are initialised process-shared so
//! the operator tooling and the safety monitor can attach from separate
//! processes. The layout matches the canonical C struct byte for byte, which
//! keeps the block mappable by non-Rust tooling.
//!
//! Locking discipline: every externally visible write acquires the mutex,
//! mutates, and broadcasts on the condition variable before releasing.
//! [`StateGuard`] enforces the release half on every exit path.

use std::mem::MaybeUninit;
use std::num::NonZeroUsize;
use std::ptr::NonNull;
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::libc;
use nix::sys::mman::{mmap, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;
use thiserror::Error;

use crate::floor::Floor;
use crate::state::{RawState, Status};

/// On-disk/in-memory layout of a car's shared block.
///
/// Field order is part of the contract; do not reorder.
#[repr(C)]
struct SharedState {
    mutex: libc::pthread_mutex_t,
    cond: libc::pthread_cond_t,
    current_floor: [u8; 4],
    destination_floor: [u8; 4],
    status: [u8; 8],
    open_button: u8,
    close_button: u8,
    door_obstruction: u8,
    overload: u8,
    emergency_stop: u8,
    individual_service_mode: u8,
    emergency_mode: u8,
}

/// Errors raised while creating or attaching a shared block.
#[derive(Debug, Error)]
pub enum ShmError {
    #[error("failed to open shared block {name}: {source}")]
    Open { name: String, source: Errno },
    #[error("failed to size shared block {name}: {source}")]
    Size { name: String, source: Errno },
    #[error("failed to map shared block {name}: {source}")]
    Map { name: String, source: Errno },
    #[error("failed to initialise block synchronisation: {0}")]
    SyncInit(Errno),
}

/// The shared memory object name for a car, `/car<NAME>`.
pub fn shm_name(car_name: &str) -> String {
    format!("/car{car_name}")
}

/// Outcome of a timed condition wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Notified,
    TimedOut,
}

/// A mapped car state block.
///
/// The creating car owns the object's lifetime and unlinks it on drop;
/// attachers only unmap.
pub struct SharedBlock {
    ptr: NonNull<SharedState>,
    name: String,
    owner: bool,
}

// SAFETY: all access to the pointed-to state goes through the embedded
// process-shared mutex via `lock()`; the mapping itself is valid for the
// lifetime of the struct.
#[allow(unsafe_code)]
unsafe impl Send for SharedBlock {}
#[allow(unsafe_code)]
unsafe impl Sync for SharedBlock {}

impl SharedBlock {
    /// Create the block for a car, replacing any stale object left behind by
    /// a previous run, and initialise its contents.
    #[allow(unsafe_code)]
    pub fn create(car_name: &str) -> Result<SharedBlock, ShmError> {
        let name = shm_name(car_name);
        // A stale object from a crashed run would otherwise be re-mapped
        // with an undefined mutex state.
        let _ = shm_unlink(name.as_str());

        let fd = shm_open(
            name.as_str(),
            OFlag::O_RDWR | OFlag::O_CREAT,
            Mode::from_bits_truncate(0o666),
        )
        .map_err(|source| ShmError::Open { name: name.clone(), source })?;

        let len = std::mem::size_of::<SharedState>();
        ftruncate(&fd, len as libc::off_t)
            .map_err(|source| ShmError::Size { name: name.clone(), source })?;

        let ptr = map(&fd, len, &name)?;
        let block = SharedBlock { ptr, name, owner: true };

        // SAFETY: the mapping is fresh and private to this process until the
        // synchronisation primitives below are initialised.
        unsafe {
            let state = block.ptr.as_ptr();

            let mut mattr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
            check(libc::pthread_mutexattr_init(mattr.as_mut_ptr()))?;
            check(libc::pthread_mutexattr_setpshared(
                mattr.as_mut_ptr(),
                libc::PTHREAD_PROCESS_SHARED,
            ))?;
            check(libc::pthread_mutex_init(&mut (*state).mutex, mattr.as_ptr()))?;
            check(libc::pthread_mutexattr_destroy(mattr.as_mut_ptr()))?;

            let mut cattr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
            check(libc::pthread_condattr_init(cattr.as_mut_ptr()))?;
            check(libc::pthread_condattr_setpshared(
                cattr.as_mut_ptr(),
                libc::PTHREAD_PROCESS_SHARED,
            ))?;
            check(libc::pthread_cond_init(&mut (*state).cond, cattr.as_ptr()))?;
            check(libc::pthread_condattr_destroy(cattr.as_mut_ptr()))?;
        }

        {
            let mut guard = block.lock();
            guard.reset();
            guard.broadcast();
        }
        Ok(block)
    }

    /// Attach to an existing car's block. Fails if the car is not running.
    pub fn attach(car_name: &str) -> Result<SharedBlock, ShmError> {
        let name = shm_name(car_name);
        let fd = shm_open(name.as_str(), OFlag::O_RDWR, Mode::from_bits_truncate(0o666))
            .map_err(|source| ShmError::Open { name: name.clone(), source })?;
        let len = std::mem::size_of::<SharedState>();
        let ptr = map(&fd, len, &name)?;
        Ok(SharedBlock { ptr, name, owner: false })
    }

    /// Acquire the block mutex.
    #[allow(unsafe_code)]
    pub fn lock(&self) -> StateGuard<'_> {
        // SAFETY: the mutex was initialised at create time and lives inside
        // the mapping, which is valid while `self` exists.
        unsafe {
            libc::pthread_mutex_lock(&mut (*self.ptr.as_ptr()).mutex);
        }
        StateGuard { block: self }
    }

    /// Copy the payload fields under the lock.
    pub fn raw(&self) -> RawState {
        self.lock().raw()
    }

    /// Wake every waiter without changing state. Used for shutdown so that
    /// blocking condvar loops observe their stop token.
    pub fn notify_all(&self) {
        self.lock().broadcast();
    }

    pub fn set_status(&self, status: Status) {
        let mut guard = self.lock();
        guard.set_status(status);
        guard.broadcast();
    }

    pub fn set_current(&self, floor: Floor) {
        let mut guard = self.lock();
        guard.set_current(floor);
        guard.broadcast();
    }

    pub fn set_destination(&self, floor: Floor) {
        let mut guard = self.lock();
        guard.set_destination(floor);
        guard.broadcast();
    }

    pub fn set_open_button(&self, pressed: bool) {
        let mut guard = self.lock();
        guard.set_open_button(pressed);
        guard.broadcast();
    }

    pub fn set_close_button(&self, pressed: bool) {
        let mut guard = self.lock();
        guard.set_close_button(pressed);
        guard.broadcast();
    }

    pub fn set_door_obstruction(&self, sensed: bool) {
        let mut guard = self.lock();
        guard.set_door_obstruction(sensed);
        guard.broadcast();
    }

    pub fn set_overload(&self, sensed: bool) {
        let mut guard = self.lock();
        guard.set_overload(sensed);
        guard.broadcast();
    }

    pub fn set_emergency_stop(&self, latched: bool) {
        let mut guard = self.lock();
        guard.set_emergency_stop(latched);
        guard.broadcast();
    }

    pub fn set_emergency_mode(&self, latched: bool) {
        let mut guard = self.lock();
        guard.set_emergency_mode(latched);
        guard.broadcast();
    }

    /// Switch individual service mode. Turning it on clears emergency mode;
    /// that coupling is how an operator recovers a car after an emergency.
    pub fn set_service_mode(&self, on: bool) {
        let mut guard = self.lock();
        if on {
            guard.set_emergency_mode(false);
        }
        guard.set_service_mode(on);
        guard.broadcast();
    }
}

impl Drop for SharedBlock {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        // SAFETY: the pointer came from mmap with this exact length and is
        // unmapped exactly once.
        unsafe {
            let _ = munmap(self.ptr.cast(), std::mem::size_of::<SharedState>());
        }
        if self.owner {
            let _ = shm_unlink(self.name.as_str());
        }
    }
}

/// Holds the block mutex; released on drop along every exit path.
pub struct StateGuard<'a> {
    block: &'a SharedBlock,
}

impl StateGuard<'_> {
    #[allow(unsafe_code)]
    fn state(&self) -> &SharedState {
        // SAFETY: the mutex is held for the guard's lifetime and the mapping
        // outlives it.
        unsafe { &*self.block.ptr.as_ptr() }
    }

    #[allow(unsafe_code)]
    fn state_mut(&mut self) -> &mut SharedState {
        // SAFETY: as above; the mutex gives us exclusive access.
        unsafe { &mut *self.block.ptr.as_ptr() }
    }

    pub fn raw(&self) -> RawState {
        let s = self.state();
        RawState {
            current_floor: s.current_floor,
            destination_floor: s.destination_floor,
            status: s.status,
            open_button: s.open_button,
            close_button: s.close_button,
            door_obstruction: s.door_obstruction,
            overload: s.overload,
            emergency_stop: s.emergency_stop,
            individual_service_mode: s.individual_service_mode,
            emergency_mode: s.emergency_mode,
        }
    }

    pub fn status(&self) -> Option<Status> {
        Status::from_padded(&self.state().status)
    }

    pub fn current(&self) -> Option<Floor> {
        Floor::from_padded(&self.state().current_floor)
    }

    pub fn destination(&self) -> Option<Floor> {
        Floor::from_padded(&self.state().destination_floor)
    }

    pub fn open_button(&self) -> bool {
        self.state().open_button == 1
    }

    pub fn close_button(&self) -> bool {
        self.state().close_button == 1
    }

    pub fn door_obstruction(&self) -> bool {
        self.state().door_obstruction == 1
    }

    pub fn overload(&self) -> bool {
        self.state().overload == 1
    }

    pub fn emergency_stop(&self) -> bool {
        self.state().emergency_stop == 1
    }

    pub fn service_mode(&self) -> bool {
        self.state().individual_service_mode == 1
    }

    pub fn emergency_mode(&self) -> bool {
        self.state().emergency_mode == 1
    }

    pub fn set_status(&mut self, status: Status) {
        self.state_mut().status = status.to_padded();
    }

    /// Write an arbitrary ASCII label into the status field, truncated to
    /// fit. The label is not validated; the safety monitor polices validity.
    pub fn set_status_label(&mut self, label: &str) {
        let mut padded = [0u8; 8];
        let bytes = label.as_bytes();
        let len = bytes.len().min(padded.len() - 1);
        padded[..len].copy_from_slice(&bytes[..len]);
        self.state_mut().status = padded;
    }

    pub fn set_current(&mut self, floor: Floor) {
        self.state_mut().current_floor = floor.to_padded();
    }

    pub fn set_destination(&mut self, floor: Floor) {
        self.state_mut().destination_floor = floor.to_padded();
    }

    pub fn set_open_button(&mut self, pressed: bool) {
        self.state_mut().open_button = u8::from(pressed);
    }

    pub fn set_close_button(&mut self, pressed: bool) {
        self.state_mut().close_button = u8::from(pressed);
    }

    pub fn set_door_obstruction(&mut self, sensed: bool) {
        self.state_mut().door_obstruction = u8::from(sensed);
    }

    pub fn set_overload(&mut self, sensed: bool) {
        self.state_mut().overload = u8::from(sensed);
    }

    pub fn set_emergency_stop(&mut self, latched: bool) {
        self.state_mut().emergency_stop = u8::from(latched);
    }

    pub fn set_service_mode(&mut self, on: bool) {
        self.state_mut().individual_service_mode = u8::from(on);
    }

    pub fn set_emergency_mode(&mut self, latched: bool) {
        self.state_mut().emergency_mode = u8::from(latched);
    }

    /// Reset the payload to the post-creation state: doors closed, both
    /// floors at `1`, every flag clear.
    pub fn reset(&mut self) {
        let state = self.state_mut();
        state.status = Status::Closed.to_padded();
        state.current_floor = Floor::GROUND.to_padded();
        state.destination_floor = Floor::GROUND.to_padded();
        state.open_button = 0;
        state.close_button = 0;
        state.door_obstruction = 0;
        state.overload = 0;
        state.emergency_stop = 0;
        state.individual_service_mode = 0;
        state.emergency_mode = 0;
    }

    /// Wake every waiter on the block's condition variable.
    #[allow(unsafe_code)]
    pub fn broadcast(&self) {
        // SAFETY: the condvar was initialised at create time; broadcasting
        // is valid with or without the mutex held, and we hold it.
        unsafe {
            libc::pthread_cond_broadcast(&mut (*self.block.ptr.as_ptr()).cond);
        }
    }

    /// Block until another process or thread broadcasts a state change.
    #[allow(unsafe_code)]
    pub fn wait(&mut self) {
        // SAFETY: we hold the mutex, which pthread_cond_wait releases and
        // reacquires around the sleep.
        unsafe {
            let state = self.block.ptr.as_ptr();
            libc::pthread_cond_wait(&mut (*state).cond, &mut (*state).mutex);
        }
    }

    /// Block until a broadcast or the timeout, whichever comes first.
    #[allow(unsafe_code)]
    pub fn wait_timeout(&mut self, timeout: Duration) -> Wait {
        let mut now = libc::timespec { tv_sec: 0, tv_nsec: 0 };
        // SAFETY: plain syscall writing into a local.
        unsafe {
            libc::clock_gettime(libc::CLOCK_REALTIME, &mut now);
        }
        let nanos = now.tv_nsec as i128 + timeout.subsec_nanos() as i128;
        let deadline = libc::timespec {
            tv_sec: now.tv_sec
                + timeout.as_secs() as libc::time_t
                + (nanos / 1_000_000_000) as libc::time_t,
            tv_nsec: (nanos % 1_000_000_000) as libc::c_long,
        };
        // SAFETY: we hold the mutex, as pthread_cond_timedwait requires.
        let rc = unsafe {
            let state = self.block.ptr.as_ptr();
            libc::pthread_cond_timedwait(&mut (*state).cond, &mut (*state).mutex, &deadline)
        };
        if rc == libc::ETIMEDOUT {
            Wait::TimedOut
        } else {
            Wait::Notified
        }
    }
}

impl Drop for StateGuard<'_> {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        // SAFETY: this guard acquired the mutex in `lock()` and releases it
        // exactly once.
        unsafe {
            libc::pthread_mutex_unlock(&mut (*self.block.ptr.as_ptr()).mutex);
        }
    }
}

#[allow(unsafe_code)]
fn map(
    fd: &std::os::fd::OwnedFd,
    len: usize,
    name: &str,
) -> Result<NonNull<SharedState>, ShmError> {
    let length = NonZeroUsize::new(len).ok_or(ShmError::Map {
        name: name.to_owned(),
        source: Errno::EINVAL,
    })?;
    // SAFETY: mapping a shared memory object we just opened, read-write, at
    // an address of the kernel's choosing.
    let ptr = unsafe {
        mmap(
            None,
            length,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            MapFlags::MAP_SHARED,
            fd,
            0,
        )
    }
    .map_err(|source| ShmError::Map { name: name.to_owned(), source })?;
    Ok(ptr.cast())
}

fn check(rc: libc::c_int) -> Result<(), ShmError> {
    if rc == 0 {
        Ok(())
    } else {
        Err(ShmError::SyncInit(Errno::from_raw(rc)))
    }
}

#[cfg(test)]
#[path = "shm_tests.rs"]
mod tests;
