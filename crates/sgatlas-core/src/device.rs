//! Single-owner graphics device access.
//!
//! Surfaces may only be created on the thread that owns the device. [`DeviceWorker`] keeps
//! the device on a dedicated thread and runs submitted closures there in order.

use crate::error::{Result, SgError};
use crate::model::SurfaceHandle;
use crossbeam::channel::{Sender, bounded, unbounded};
use image::RgbaImage;
use std::collections::HashMap;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Creates and releases GPU-side surfaces from RGBA pixels.
pub trait GraphicsDevice {
    fn upload(&mut self, rgba: RgbaImage) -> Result<SurfaceHandle>;
    fn release(&mut self, surface: SurfaceHandle);
}

/// Device that keeps surfaces in memory. Used by the CLI and tests.
#[derive(Debug, Default)]
pub struct MemoryDevice {
    next: u64,
    surfaces: HashMap<SurfaceHandle, RgbaImage>,
    /// Largest accepted width or height; `None` means unbounded.
    pub max_surface_size: Option<u32>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that rejects surfaces wider or taller than `max`.
    pub fn with_max_surface_size(max: u32) -> Self {
        Self {
            max_surface_size: Some(max),
            ..Self::default()
        }
    }

    pub fn surface(&self, handle: SurfaceHandle) -> Option<&RgbaImage> {
        self.surfaces.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

impl GraphicsDevice for MemoryDevice {
    fn upload(&mut self, rgba: RgbaImage) -> Result<SurfaceHandle> {
        let (w, h) = rgba.dimensions();
        if let Some(max) = self.max_surface_size {
            if w > max || h > max {
                return Err(SgError::OutOfSpace);
            }
        }
        self.next += 1;
        let handle = SurfaceHandle(self.next);
        self.surfaces.insert(handle, rgba);
        Ok(handle)
    }

    fn release(&mut self, surface: SurfaceHandle) {
        self.surfaces.remove(&surface);
    }
}

type Job<D> = Box<dyn FnOnce(&mut D) + Send>;

/// Owns a device on its own thread; other threads submit work through a channel.
pub struct DeviceWorker<D> {
    tx: Option<Sender<Job<D>>>,
    handle: Option<JoinHandle<()>>,
}

impl<D: 'static> DeviceWorker<D> {
    /// Starts the worker. `init` runs on the worker thread so the device never leaves it.
    pub fn spawn<F>(init: F) -> Result<Self>
    where
        F: FnOnce() -> D + Send + 'static,
    {
        let (tx, rx) = unbounded::<Job<D>>();
        let handle = thread::Builder::new()
            .name("sgatlas-device".into())
            .spawn(move || {
                let mut device = init();
                debug!("device worker started");
                while let Ok(job) = rx.recv() {
                    job(&mut device);
                }
                debug!("device worker stopped");
            })?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Runs `f` on the device thread and waits for its result.
    pub fn run_sync<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut D) -> R + Send + 'static,
    {
        let (done_tx, done_rx) = bounded::<R>(1);
        self.submit(Box::new(move |device: &mut D| {
            let _ = done_tx.send(f(device));
        }))?;
        done_rx.recv().map_err(|_| SgError::DeviceClosed)
    }

    /// Queues `f` on the device thread without waiting.
    pub fn run_detached<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut D) + Send + 'static,
    {
        self.submit(Box::new(f))
    }

    fn submit(&self, job: Job<D>) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(SgError::DeviceClosed)?;
        tx.send(job).map_err(|_| SgError::DeviceClosed)
    }
}

impl<D> Drop for DeviceWorker<D> {
    fn drop(&mut self) {
        // closing the channel ends the worker loop once queued jobs have run
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("device worker panicked");
            }
        }
    }
}
