//! Test utilities and mock collaborators
//!
//! Mock implementations of [`RemovalEngine`], [`Notifier`] and
//! [`DownloadHost`] that record every call, plus helpers for producing real
//! encoded images without fixture files.

use crate::{
    engine::RemovalEngine, exporter::DownloadHost, notifier::Notifier, types::DisplayRef,
};
use anyhow::anyhow;
use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use std::collections::VecDeque;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Encode a small gradient image in `format`
pub fn encode_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        let r = ((x as f32 / width as f32) * 255.0) as u8;
        let g = ((y as f32 / height as f32) * 255.0) as u8;
        Rgb([r, g, 128])
    });

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, format)
        .unwrap();
    buffer.into_inner()
}

/// Reader that fails on the first read
#[derive(Debug, Default)]
pub struct FailingReader;

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "permission denied",
        )))
    }
}

/// Mock engine answering from a script; the last entry repeats
#[derive(Debug, Clone)]
pub struct MockEngine {
    script: Arc<Mutex<VecDeque<Result<Vec<u8>, String>>>>,
    /// Inputs received, in call order
    call_history: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockEngine {
    #[must_use]
    pub fn scripted(script: Vec<Result<Vec<u8>, String>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn succeeding(output: Vec<u8>) -> Self {
        Self::scripted(vec![Ok(output)])
    }

    #[must_use]
    pub fn failing(reason: &str) -> Self {
        Self::scripted(vec![Err(reason.to_string())])
    }

    pub fn get_call_history(&self) -> Vec<Vec<u8>> {
        self.call_history.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_history.lock().unwrap().len()
    }

    fn next_answer(&self) -> Result<Vec<u8>, String> {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script
                .front()
                .cloned()
                .unwrap_or_else(|| Err("mock engine has no script".to_string()))
        }
    }
}

#[async_trait]
impl RemovalEngine for MockEngine {
    async fn remove_background(&self, image: &[u8]) -> anyhow::Result<Vec<u8>> {
        self.call_history.lock().unwrap().push(image.to_vec());
        self.next_answer().map_err(|reason| anyhow!(reason))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Failure(String),
}

/// Notifier that keeps every message it receives
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_success(&self, message: &str) {
        self.notifications
            .lock()
            .unwrap()
            .push(Notification::Success(message.to_string()));
    }

    fn notify_failure(&self, message: &str) {
        self.notifications
            .lock()
            .unwrap()
            .push(Notification::Failure(message.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSave {
    pub display_ref: DisplayRef,
    pub data: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
}

/// Download host that records saves instead of writing files
#[derive(Debug, Default)]
pub struct RecordingDownloadHost {
    saves: Mutex<Vec<RecordedSave>>,
    attempts: Mutex<usize>,
    fail: bool,
}

impl RecordingDownloadHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Host whose every save fails
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn get_saves(&self) -> Vec<RecordedSave> {
        self.saves.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl DownloadHost for RecordingDownloadHost {
    fn save(
        &self,
        display_ref: &DisplayRef,
        data: &[u8],
        mime_type: &str,
        filename: &str,
    ) -> anyhow::Result<()> {
        *self.attempts.lock().unwrap() += 1;
        if self.fail {
            return Err(anyhow!("download blocked by host"));
        }
        self.saves.lock().unwrap().push(RecordedSave {
            display_ref: display_ref.clone(),
            data: data.to_vec(),
            mime_type: mime_type.to_string(),
            filename: filename.to_string(),
        });
        Ok(())
    }
}
