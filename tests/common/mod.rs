//! Shared helpers for pipeline integration tests

#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use bgremove_pipeline::{
    BackgroundRemovalPipeline, DisplayRef, DownloadHost, Notifier, RemovalEngine, SelectedFile,
};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

/// Encode a small gradient image
pub fn encode_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 64])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, format)
        .expect("Failed to encode test image");
    buffer.into_inner()
}

pub fn photo(name: &str) -> SelectedFile {
    SelectedFile::from_bytes(name, "image/jpeg", encode_image(16, 12, ImageFormat::Jpeg))
}

pub fn cutout() -> Vec<u8> {
    encode_image(16, 12, ImageFormat::Png)
}

/// One engine call waiting for the test to decide its result
pub struct PendingCall {
    pub input: Vec<u8>,
    reply: oneshot::Sender<Result<Vec<u8>, String>>,
}

impl PendingCall {
    pub fn succeed(self, output: Vec<u8>) {
        let _ = self.reply.send(Ok(output));
    }

    pub fn fail(self, reason: &str) {
        let _ = self.reply.send(Err(reason.to_string()));
    }
}

/// Engine whose calls stay in flight until the test resolves them
pub struct GatedEngine {
    calls: mpsc::UnboundedSender<PendingCall>,
}

impl GatedEngine {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PendingCall>) {
        let (calls, receiver) = mpsc::unbounded_channel();
        (Self { calls }, receiver)
    }
}

#[async_trait]
impl RemovalEngine for GatedEngine {
    async fn remove_background(&self, image: &[u8]) -> anyhow::Result<Vec<u8>> {
        let (reply, answer) = oneshot::channel();
        self.calls
            .send(PendingCall {
                input: image.to_vec(),
                reply,
            })
            .map_err(|_| anyhow!("test stopped listening for engine calls"))?;

        match answer.await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(reason)) => Err(anyhow!(reason)),
            Err(_) => Err(anyhow!("engine call abandoned")),
        }
    }

    fn name(&self) -> &str {
        "gated"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toast {
    Success(String),
    Failure(String),
}

#[derive(Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_success(&self, message: &str) {
        self.toasts.lock().unwrap().push(Toast::Success(message.to_string()));
    }

    fn notify_failure(&self, message: &str) {
        self.toasts.lock().unwrap().push(Toast::Failure(message.to_string()));
    }
}

#[derive(Debug, Clone)]
pub struct Save {
    pub display_ref: DisplayRef,
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Default)]
pub struct RecordingHost {
    saves: Mutex<Vec<Save>>,
}

impl RecordingHost {
    pub fn saves(&self) -> Vec<Save> {
        self.saves.lock().unwrap().clone()
    }
}

impl DownloadHost for RecordingHost {
    fn save(
        &self,
        display_ref: &DisplayRef,
        data: &[u8],
        _mime_type: &str,
        filename: &str,
    ) -> anyhow::Result<()> {
        self.saves.lock().unwrap().push(Save {
            display_ref: display_ref.clone(),
            filename: filename.to_string(),
            data: data.to_vec(),
        });
        Ok(())
    }
}

pub struct TestPipeline {
    pub pipeline: BackgroundRemovalPipeline,
    pub notifier: Arc<RecordingNotifier>,
    pub host: Arc<RecordingHost>,
}

/// Pipeline wired to recording collaborators and the given engine
pub fn pipeline_with(engine: Arc<dyn RemovalEngine>) -> TestPipeline {
    let notifier = Arc::new(RecordingNotifier::default());
    let host = Arc::new(RecordingHost::default());
    let pipeline = BackgroundRemovalPipeline::builder()
        .engine(engine)
        .notifier(notifier.clone())
        .download_host(host.clone())
        .build()
        .expect("Failed to build pipeline");
    TestPipeline {
        pipeline,
        notifier,
        host,
    }
}

/// Pipeline backed by a [`GatedEngine`]
pub fn gated_pipeline() -> (TestPipeline, mpsc::UnboundedReceiver<PendingCall>) {
    let (engine, calls) = GatedEngine::new();
    (pipeline_with(Arc::new(engine)), calls)
}
