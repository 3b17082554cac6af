//! eSpeak speech engine adapter for VoxBridge
//!
//! Drives the `espeak` (or `espeak-ng`) command line synthesizer. A worker
//! task owns the running child process so that speech can be cancelled
//! mid-utterance and queued utterances play back to back.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use voxbridge_engine::{
    EngineError, EngineFeatures, EngineResult, NormalizedUtterance, SignalSender, SpeechEngine,
    VoiceInfo, VoiceSelection,
};


/// One utterance handed to the worker, with its command line prebuilt.
struct SpeakJob {
    id: u64,
    args: Vec<String>,
}

enum WorkerCmd {
    Speak(SpeakJob),
    Stop,
    Shutdown,
}

/// Speech engine backed by the eSpeak command line synthesizer.
pub struct EspeakEngine {
    worker_tx: Option<mpsc::UnboundedSender<WorkerCmd>>,
    worker: Option<JoinHandle<()>>,
    voices: Vec<VoiceInfo>,
    speaking: Arc<AtomicBool>,
}

impl EspeakEngine {
    pub fn new() -> Self {
        Self {
            worker_tx: None,
            worker: None,
            voices: Vec::new(),
            speaking: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Find the installed espeak binary, preferring classic espeak.
    async fn espeak_command() -> Option<String> {
        for candidate in ["espeak", "espeak-ng"] {
            if Command::new(candidate)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .output()
                .await
                .is_ok()
            {
                return Some(candidate.to_string());
            }
        }
        None
    }

    fn worker_tx(&self) -> EngineResult<&mpsc::UnboundedSender<WorkerCmd>> {
        self.worker_tx
            .as_ref()
            .ok_or_else(|| EngineError::NotAvailable("engine not initialized".to_string()))
    }
}

impl Default for EspeakEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechEngine for EspeakEngine {
    fn name(&self) -> &str {
        "espeak"
    }

    fn features(&self) -> EngineFeatures {
        EngineFeatures {
            rate: true,
            pitch: true,
            volume: true,
            pause: false,
            resume: false,
            is_speaking: true,
            utterance_callbacks: true,
        }
    }

    async fn initialize(&mut self, signals: SignalSender) -> EngineResult<()> {
        let command = Self::espeak_command().await.ok_or_else(|| {
            EngineError::NotAvailable(
                "eSpeak not found. Please install espeak or espeak-ng.".to_string(),
            )
        })?;

        let output = Command::new(&command)
            .arg("--voices")
            .output()
            .await
            .map_err(|e| EngineError::Initialization(format!("Failed to list voices: {}", e)))?;
        self.voices = parse_voice_list(&String::from_utf8_lossy(&output.stdout));
        debug!(
            "Loaded {} eSpeak voices via {}",
            self.voices.len(),
            command
        );

        let (tx, rx) = mpsc::unbounded_channel();
        self.worker = Some(tokio::spawn(worker_loop(
            command,
            rx,
            signals.clone(),
            Arc::clone(&self.speaking),
        )));
        self.worker_tx = Some(tx);

        signals.ready(self.voices.len());
        Ok(())
    }

    async fn speak(&mut self, utterance: &NormalizedUtterance) -> EngineResult<()> {
        let job = SpeakJob {
            id: utterance.id,
            args: build_args(utterance),
        };
        self.worker_tx()?
            .send(WorkerCmd::Speak(job))
            .map_err(|_| EngineError::Synthesis("speech worker is gone".to_string()))?;
        Ok(())
    }

    async fn stop(&mut self) -> EngineResult<()> {
        self.worker_tx()?
            .send(WorkerCmd::Stop)
            .map_err(|_| EngineError::Synthesis("speech worker is gone".to_string()))?;
        Ok(())
    }

    async fn pause(&mut self) -> EngineResult<()> {
        Err(EngineError::NotSupported("pause"))
    }

    async fn resume(&mut self) -> EngineResult<()> {
        Err(EngineError::NotSupported("resume"))
    }

    async fn voices(&mut self) -> EngineResult<Vec<VoiceInfo>> {
        if self.worker_tx.is_none() {
            return Err(EngineError::NotAvailable(
                "engine not initialized".to_string(),
            ));
        }
        Ok(self.voices.clone())
    }

    async fn is_speaking(&mut self) -> EngineResult<bool> {
        Ok(self.speaking.load(Ordering::SeqCst))
    }

    async fn shutdown(&mut self) -> EngineResult<()> {
        if let Some(tx) = self.worker_tx.take() {
            let _ = tx.send(WorkerCmd::Shutdown);
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.await;
        }
        self.voices.clear();
        debug!("eSpeak engine shut down");
        Ok(())
    }
}

/// Owns the espeak child process. One utterance plays at a time; the rest
/// wait in arrival order.
async fn worker_loop(
    command: String,
    mut rx: mpsc::UnboundedReceiver<WorkerCmd>,
    signals: SignalSender,
    speaking: Arc<AtomicBool>,
) {
    let mut current: Option<(u64, Child)> = None;
    let mut queue: VecDeque<SpeakJob> = VecDeque::new();

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(WorkerCmd::Speak(job)) => {
                    queue.push_back(job);
                    if current.is_none() {
                        start_next(&command, &mut queue, &mut current, &signals, &speaking);
                    }
                }
                Some(WorkerCmd::Stop) => {
                    // Cancellation is reported upstream at the stop call
                    // itself, so the worker tears down silently.
                    cancel_all(&mut current, &mut queue, &speaking).await;
                }
                Some(WorkerCmd::Shutdown) | None => {
                    cancel_all(&mut current, &mut queue, &speaking).await;
                    break;
                }
            },
            status = wait_current(&mut current), if current.is_some() => {
                if let Some((id, _)) = current.take() {
                    match status {
                        Ok(s) if s.success() => signals.finished(id),
                        Ok(s) => signals.errored(Some(id), format!("eSpeak exited with {}", s)),
                        Err(e) => {
                            signals.errored(Some(id), format!("Failed waiting for eSpeak: {}", e))
                        }
                    }
                }
                start_next(&command, &mut queue, &mut current, &signals, &speaking);
            }
        }
    }
}

async fn wait_current(
    current: &mut Option<(u64, Child)>,
) -> std::io::Result<std::process::ExitStatus> {
    match current.as_mut() {
        Some((_, child)) => child.wait().await,
        None => std::future::pending().await,
    }
}

fn start_next(
    command: &str,
    queue: &mut VecDeque<SpeakJob>,
    current: &mut Option<(u64, Child)>,
    signals: &SignalSender,
    speaking: &Arc<AtomicBool>,
) {
    while let Some(job) = queue.pop_front() {
        let spawned = Command::new(command)
            .args(&job.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();
        match spawned {
            Ok(child) => {
                debug!(utterance_id = job.id, "eSpeak child started");
                signals.started(job.id);
                speaking.store(true, Ordering::SeqCst);
                *current = Some((job.id, child));
                return;
            }
            Err(e) => {
                warn!("Failed to spawn eSpeak: {}", e);
                signals.errored(Some(job.id), format!("Failed to start eSpeak: {}", e));
            }
        }
    }
    speaking.store(false, Ordering::SeqCst);
}

async fn cancel_all(
    current: &mut Option<(u64, Child)>,
    queue: &mut VecDeque<SpeakJob>,
    speaking: &Arc<AtomicBool>,
) {
    if let Some((id, mut child)) = current.take() {
        if let Err(e) = child.kill().await {
            debug!(utterance_id = id, "Failed to kill eSpeak child: {}", e);
        }
    }
    queue.clear();
    speaking.store(false, Ordering::SeqCst);
}

/// Build the espeak invocation for one utterance. Absent parameters are
/// simply not passed, leaving espeak's own defaults in force.
fn build_args(utterance: &NormalizedUtterance) -> Vec<String> {
    let mut args = Vec::new();
    match &utterance.selection {
        // espeak accepts both voice names and bare language codes for -v
        VoiceSelection::Voice(info) => {
            args.push("-v".to_string());
            args.push(info.id.clone());
        }
        VoiceSelection::Language(tag) => {
            args.push("-v".to_string());
            args.push(tag.clone());
        }
        VoiceSelection::EngineDefault => {}
    }
    if let Some(rate) = utterance.params.rate {
        args.push("-s".to_string());
        args.push(words_per_minute(rate).to_string());
    }
    if let Some(pitch) = utterance.params.pitch {
        args.push("-p".to_string());
        args.push(pitch_value(pitch).to_string());
    }
    if let Some(volume) = utterance.params.volume {
        args.push("-a".to_string());
        args.push(amplitude_value(volume).to_string());
    }
    args.push(utterance.text.clone());
    args
}

/// eSpeak rates are words per minute with 175 as the engine default.
fn words_per_minute(rate: f32) -> u32 {
    ((rate * 175.0).round() as i64).clamp(80, 450) as u32
}

/// eSpeak pitch runs 0-99 with 50 as the default.
fn pitch_value(pitch: f32) -> u32 {
    ((pitch * 50.0).round() as i64).clamp(0, 99) as u32
}

/// eSpeak amplitude runs 0-200.
fn amplitude_value(volume: f32) -> u32 {
    ((volume * 200.0).round() as i64).clamp(0, 200) as u32
}

/// Parse `espeak --voices` output.
///
/// Classic espeak prints `Pty Language Age/Gender VoiceName File ...` with a
/// bare M/F gender column; espeak-ng widens that column to forms like
/// `--/M`, so the gender group accepts both.
fn parse_voice_list(output: &str) -> Vec<VoiceInfo> {
    let mut voices = Vec::new();

    let row = match Regex::new(r"^\s*(\d+)\s+([\w-]+)\s+([\w/+-]*)\s+([\w\-_]+)\s+") {
        Ok(re) => re,
        Err(_) => return voices,
    };

    for line in output.lines().skip(1) {
        if let Some(captures) = row.captures(line) {
            let language = captures.get(2).map_or("unknown", |m| m.as_str()).to_string();
            let id = captures.get(4).map_or("unknown", |m| m.as_str()).to_string();
            voices.push(VoiceInfo {
                name: format!("{} ({})", language, id),
                id,
                language,
            });
        }
    }

    voices
}
