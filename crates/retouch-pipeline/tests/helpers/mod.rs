#![allow(dead_code)]

use image::{ImageFormat, Rgb, RgbImage};
use retouch_api_client::ApiClient;
use retouch_core::{
    EditOutcome, ErrorMetadata, PipelineError, PipelineLimits, PipelineState, SelectedFile,
};
use retouch_pipeline::{PipelineController, StateObserver};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 5 % 256) as u8, (y * 5 % 256) as u8, 128])
    });
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

pub fn png_file(name: &str, width: u32, height: u32) -> SelectedFile {
    SelectedFile::new(name, "image/png", png_bytes(width, height))
}

/// Deterministic noise PNG; it compresses badly, so byte budgets bite.
pub fn noise_png(width: u32, height: u32) -> Vec<u8> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let img = RgbImage::from_fn(width, height, |_, _| {
        let mut px = [0u8; 3];
        for channel in px.iter_mut() {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            *channel = (state >> 33) as u8;
        }
        Rgb(px)
    });
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

/// The uploaded image inside an echoed multipart body, from its PNG signature on.
pub fn png_part(body: &[u8]) -> &[u8] {
    const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    let start = body
        .windows(SIGNATURE.len())
        .position(|window| window == SIGNATURE)
        .expect("no PNG in request body");
    &body[start..]
}

/// Records every callback for later assertions.
#[derive(Default)]
pub struct RecordingObserver {
    pub states: Mutex<Vec<PipelineState>>,
    pub successes: Mutex<Vec<String>>,
    pub failures: Mutex<Vec<&'static str>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<PipelineState> {
        self.states.lock().unwrap().clone()
    }

    pub fn failure_codes(&self) -> Vec<&'static str> {
        self.failures.lock().unwrap().clone()
    }

    pub fn success_names(&self) -> Vec<String> {
        self.successes.lock().unwrap().clone()
    }
}

impl StateObserver for RecordingObserver {
    fn on_state(&self, state: PipelineState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_success(&self, outcome: &EditOutcome) {
        self.successes.lock().unwrap().push(outcome.filename.clone());
    }

    fn on_failure(&self, error: &PipelineError) {
        self.failures.lock().unwrap().push(error.error_code());
    }
}

pub fn limits() -> PipelineLimits {
    PipelineLimits {
        max_width: 400,
        max_height: 400,
        resize_width: 200,
        resize_height: 200,
        request_timeout: Duration::from_secs(5),
        ..PipelineLimits::default()
    }
}

/// Controller against `base_url` with a recording observer.
pub fn controller(
    base_url: &str,
    limits: PipelineLimits,
) -> (Arc<PipelineController>, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::default());
    let coordinator = ApiClient::new(base_url.to_string())
        .unwrap()
        .coordinator("/edit", limits.request_timeout);
    let controller = PipelineController::new(&limits, coordinator).with_observer(observer.clone());
    (Arc::new(controller), observer)
}

/// Accepts connections and never answers.
pub async fn hanging_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

/// Poll until the controller reports `state`, panicking after a few seconds.
pub async fn wait_for_state(controller: &PipelineController, state: PipelineState) {
    for _ in 0..500 {
        if controller.state() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "controller never reached {} (stuck in {})",
        state,
        controller.state()
    );
}
