#![allow(dead_code)]

use effectors::{effector_fn, Context, Effector, EffectorError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestError(pub &'static str);

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "test error: {}", self.0)
    }
}

impl std::error::Error for TestError {}

/// Effector that counts its invocations and reports `outcome(call_index)`.
pub fn scripted<F>(calls: Arc<AtomicUsize>, outcome: F) -> impl Effector + Clone
where
    F: Fn(usize) -> Result<(), EffectorError> + Send + Sync + 'static,
{
    let outcome = Arc::new(outcome);
    effector_fn(move |_ctx: Context| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        let result = outcome(n);
        async move { result }
    })
}

pub fn always_fails(calls: Arc<AtomicUsize>, tag: &'static str) -> impl Effector + Clone {
    scripted(calls, move |_| Err(EffectorError::inner(TestError(tag))))
}

/// Captures formatted `tracing` output for assertions.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::set_default(subscriber)
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureGuard;
    fn make_writer(&'a self) -> Self::Writer {
        CaptureGuard(self.0.clone())
    }
}

pub struct CaptureGuard(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CaptureGuard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
