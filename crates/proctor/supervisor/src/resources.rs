//! Exclusively owned capture resources.
//!
//! Each device lives in a [`ResourceSlot`]. The slot is the only path to the
//! device: the schedule that reads it locks the slot for the duration of one
//! read, and teardown empties the slot before releasing the device, so a
//! device is released exactly once however many times teardown runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proctor_detectors::{AudioBuffer, Frame};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ResourceError;

/// Video capture device.
#[async_trait]
pub trait CaptureDevice: Send {
    fn name(&self) -> &str {
        "camera"
    }

    async fn open(&mut self) -> Result<(), ResourceError>;

    /// Read the next frame. `Ok(None)` means no frame this cycle.
    async fn read_frame(&mut self) -> Result<Option<Frame>, ResourceError>;

    async fn release(&mut self);
}

/// Audio input stream.
#[async_trait]
pub trait AudioInput: Send {
    fn name(&self) -> &str {
        "microphone"
    }

    async fn open(&mut self) -> Result<(), ResourceError>;

    /// Record for `duration` at `sample_rate`.
    async fn capture(
        &mut self,
        duration: Duration,
        sample_rate: u32,
    ) -> Result<AudioBuffer, ResourceError>;

    async fn release(&mut self);
}

/// Shared, releasable handle to one device.
pub struct ResourceSlot<R: ?Sized> {
    name: String,
    device: Arc<Mutex<Option<Box<R>>>>,
}

impl<R: ?Sized> Clone for ResourceSlot<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            device: Arc::clone(&self.device),
        }
    }
}

impl<R: ?Sized + Send> ResourceSlot<R> {
    pub fn new(name: impl Into<String>, device: Box<R>) -> Self {
        Self {
            name: name.into(),
            device: Arc::new(Mutex::new(Some(device))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the device is still held.
    pub async fn is_held(&self) -> bool {
        self.device.lock().await.is_some()
    }

    /// Lock the slot. `None` inside the guard means the device is released.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Option<Box<R>>> {
        self.device.lock().await
    }

    /// Take the device out of the slot. Later calls return `None`.
    pub async fn take(&self) -> Option<Box<R>> {
        let taken = self.device.lock().await.take();
        if taken.is_none() {
            debug!(resource = %self.name, "Resource already released");
        }
        taken
    }
}

impl ResourceSlot<dyn CaptureDevice> {
    /// Release the capture device if still held.
    pub async fn release(&self) -> bool {
        match self.take().await {
            Some(mut device) => {
                device.release().await;
                debug!(resource = %self.name, "Capture device released");
                true
            }
            None => false,
        }
    }
}

impl ResourceSlot<dyn AudioInput> {
    /// Release the audio input if still held.
    pub async fn release(&self) -> bool {
        match self.take().await {
            Some(mut device) => {
                device.release().await;
                debug!(resource = %self.name, "Audio input released");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCamera {
        releases: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CaptureDevice for CountingCamera {
        async fn open(&mut self) -> Result<(), ResourceError> {
            Ok(())
        }

        async fn read_frame(&mut self) -> Result<Option<Frame>, ResourceError> {
            Ok(Some(Frame::blank(4, 4)))
        }

        async fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn release_runs_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        let slot: ResourceSlot<dyn CaptureDevice> = ResourceSlot::new(
            "camera",
            Box::new(CountingCamera {
                releases: Arc::clone(&releases),
            }),
        );
        let other = slot.clone();

        assert!(slot.is_held().await);
        assert!(slot.release().await);
        assert!(!other.release().await);
        assert!(!slot.is_held().await);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reads_go_through_the_slot() {
        let slot: ResourceSlot<dyn CaptureDevice> = ResourceSlot::new(
            "camera",
            Box::new(CountingCamera {
                releases: Arc::new(AtomicUsize::new(0)),
            }),
        );

        {
            let mut guard = slot.lock().await;
            let device = guard.as_mut().unwrap();
            assert!(device.read_frame().await.unwrap().is_some());
        }

        slot.release().await;
        assert!(slot.lock().await.is_none());
    }
}
