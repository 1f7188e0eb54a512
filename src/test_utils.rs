//! Hand-written capability mocks shared by the unit tests.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

use crate::{
    collector::{Collector, CollectorError, LocationRecord, LocationReport},
    geocode::{GeocodeError, GeocodedAddress, Geocoder},
    identity::{DeviceIdentityStore, IdentitySlot},
    permission::LocationAuthority,
    position::{PositionSource, RawFix, SourceError},
};

/// OS permission mock. `check` reflects the OS setting; a granted prompt
/// flips it on.
pub struct MockAuthority {
    os_granted: AtomicBool,
    foreground_answer: bool,
    background_answer: AtomicBool,
    prompt_delay: Mutex<Duration>,
    foreground_prompts: AtomicUsize,
    background_prompts: AtomicUsize,
    explanations: Mutex<Vec<String>>,
}

impl MockAuthority {
    fn with_answer(foreground_answer: bool) -> Self {
        Self {
            os_granted: AtomicBool::new(false),
            foreground_answer,
            background_answer: AtomicBool::new(true),
            prompt_delay: Mutex::new(Duration::ZERO),
            foreground_prompts: AtomicUsize::new(0),
            background_prompts: AtomicUsize::new(0),
            explanations: Mutex::new(Vec::new()),
        }
    }

    pub fn granting() -> Self {
        Self::with_answer(true)
    }

    pub fn denying() -> Self {
        Self::with_answer(false)
    }

    pub fn set_os_granted(&self, granted: bool) {
        self.os_granted.store(granted, Ordering::SeqCst);
    }

    pub fn set_background_answer(&self, granted: bool) {
        self.background_answer.store(granted, Ordering::SeqCst);
    }

    pub fn set_prompt_delay(&self, delay: Duration) {
        *self.prompt_delay.lock().unwrap() = delay;
    }

    pub fn foreground_prompts(&self) -> usize {
        self.foreground_prompts.load(Ordering::SeqCst)
    }

    pub fn background_prompts(&self) -> usize {
        self.background_prompts.load(Ordering::SeqCst)
    }

    pub fn explanations(&self) -> Vec<String> {
        self.explanations.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocationAuthority for MockAuthority {
    async fn check(&self) -> bool {
        self.os_granted.load(Ordering::SeqCst)
    }

    async fn request_foreground(&self) -> bool {
        self.foreground_prompts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.prompt_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.foreground_answer {
            self.os_granted.store(true, Ordering::SeqCst);
        }
        self.foreground_answer
    }

    async fn request_background(&self) -> bool {
        self.background_prompts.fetch_add(1, Ordering::SeqCst);
        self.background_answer.load(Ordering::SeqCst)
    }

    fn explain_denial(&self, message: &str) {
        self.explanations.lock().unwrap().push(message.to_string());
    }
}

/// Position source returning a configurable fix; `None` means hardware error.
pub struct MockPositionSource {
    fix: Mutex<Option<RawFix>>,
    hang: bool,
    calls: AtomicUsize,
}

impl Default for MockPositionSource {
    fn default() -> Self {
        Self::fixed(RawFix::new(10.0, 106.0, None))
    }
}

impl MockPositionSource {
    pub fn fixed(fix: RawFix) -> Self {
        Self {
            fix: Mutex::new(Some(fix)),
            hang: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fix: Mutex::new(None),
            hang: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Never answers; exercises the sampler timeout.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::failing()
        }
    }

    pub fn set_fix(&self, fix: Option<RawFix>) {
        *self.fix.lock().unwrap() = fix;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PositionSource for MockPositionSource {
    async fn current_fix(&self) -> Result<RawFix, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        let fix = self.fix.lock().unwrap().clone();
        fix.ok_or_else(|| SourceError::Unavailable("mock hardware off".into()))
    }
}

/// Collector recording every accepted report.
pub struct MockCollector {
    rejecting: AtomicBool,
    delay: Mutex<Duration>,
    attempts: AtomicUsize,
    accepted: Mutex<Vec<LocationReport>>,
}

impl MockCollector {
    fn new(rejecting: bool) -> Self {
        Self {
            rejecting: AtomicBool::new(rejecting),
            delay: Mutex::new(Duration::ZERO),
            attempts: AtomicUsize::new(0),
            accepted: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::new(false)
    }

    pub fn rejecting() -> Self {
        Self::new(true)
    }

    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Calls to `submit`, whether or not they finished.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Reports the collector accepted.
    pub fn completed(&self) -> usize {
        self.accepted.lock().unwrap().len()
    }

    pub fn reports(&self) -> Vec<LocationReport> {
        self.accepted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Collector for MockCollector {
    async fn submit(&self, report: &LocationReport) -> Result<LocationRecord, CollectorError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(CollectorError::Rejected {
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.accepted.lock().unwrap().push(report.clone());
        Ok(LocationRecord {
            id: None,
            latitude: report.fix.latitude,
            longitude: report.fix.longitude,
            speed: Some(f64::from(report.fix.speed_kmh)),
            user_id: Some(report.user_id.clone()),
            device_id: Some(report.device_id.clone()),
            timestamp: Some(report.timestamp.to_rfc3339()),
        })
    }
}

pub struct MockGeocoder {
    answer: Option<String>,
    calls: AtomicUsize,
}

impl MockGeocoder {
    pub fn answering(address: &str) -> Self {
        Self {
            answer: Some(address.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn reverse(&self, _latitude: f64, _longitude: f64) -> Result<GeocodedAddress, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            Some(address) => Ok(GeocodedAddress {
                address: address.clone(),
                legacy_address: None,
            }),
            None => Err(GeocodeError::Status(500)),
        }
    }
}

struct FixedSlot(String);

#[async_trait]
impl IdentitySlot for FixedSlot {
    async fn load(&self) -> Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }

    async fn store(&self, _value: &str) -> Result<()> {
        Ok(())
    }
}

/// Identity store that always yields `device_id`.
pub fn memory_identity(device_id: &str) -> Arc<DeviceIdentityStore> {
    Arc::new(DeviceIdentityStore::new(Arc::new(FixedSlot(device_id.to_string()))))
}

/// HTTP client for loopback tests; ignores any proxy set in the environment.
pub fn loopback_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Serve exactly one HTTP response on a loopback port.
///
/// Returns the base URL and a handle yielding the raw request that was read.
pub async fn respond_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            reason_phrase(status),
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        request
    });

    (format!("http://{addr}"), handle)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
