//! Session controller
//!
//! Drives one session at a time through idle -> recording -> analyzing -> done.
//! Background work (the elapsed-time ticker and the analysis task) reports
//! back over a single channel that the controller drains itself, so stage
//! transitions only ever happen on the controller's own task.

pub mod session;

use crate::analysis::{AnalysisClient, AnalysisError, Analyzer};
use crate::capture::CaptureBackend;
use crate::config::{AppConfig, CredentialStore};
use crate::error::AppResult;
use crate::recorder::{RecorderSettings, SessionRecorder};
use crate::report::ReportRenderer;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

pub use session::{format_elapsed, Session, Stage, StageKind};

const TIMER_PERIOD: Duration = Duration::from_secs(1);

/// What subscribers are told
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    StageChanged(StageKind),
    /// Elapsed recording time, `HH:MM:SS`
    Timer(String),
    Status(String),
    /// `[HH:MM:SS] message`
    Log(String),
    Error(String),
    ReportReady(PathBuf),
}

/// Receives controller notifications, on the controller's task
pub trait SessionObserver: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Sent by background workers, consumed only by the controller
#[derive(Debug)]
pub enum WorkerMessage {
    Tick {
        session_id: Uuid,
        elapsed: Duration,
    },
    AnalysisFinished {
        session_id: Uuid,
        result: Result<String, AnalysisError>,
    },
}

pub struct SessionController {
    config: AppConfig,
    recorder: SessionRecorder,
    analyzer: Option<Arc<dyn Analyzer>>,
    renderer: ReportRenderer,
    credentials: CredentialStore,
    observers: Vec<Arc<dyn SessionObserver>>,
    stage: Stage,
    timer_running: Option<Arc<AtomicBool>>,
    tx: UnboundedSender<WorkerMessage>,
    rx: UnboundedReceiver<WorkerMessage>,
}

impl SessionController {
    /// Controller using `backend` for capture. The analysis client is built
    /// from the stored credential; without one, analysis fails until
    /// `update_api_key` is called.
    pub fn new(config: AppConfig, backend: CaptureBackend, credentials: CredentialStore) -> Self {
        let settings = RecorderSettings {
            fps: config.fps,
            window_poll_interval: config.window_poll_interval(),
        };

        let analyzer: Option<Arc<dyn Analyzer>> =
            match AnalysisClient::from_config(&config, credentials.api_key().as_deref()) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::warn!("Analysis unavailable: {}", e);
                    None
                }
            };

        let (tx, rx) = unbounded_channel();

        Self {
            recorder: SessionRecorder::new(backend, settings),
            renderer: ReportRenderer::new(config.reports_dir.clone()),
            config,
            analyzer,
            credentials,
            observers: Vec::new(),
            stage: Stage::Idle,
            timer_running: None,
            tx,
            rx,
        }
    }

    /// Replace the analysis client
    pub fn with_analyzer(mut self, analyzer: Option<Arc<dyn Analyzer>>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn subscribe(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn stage_kind(&self) -> StageKind {
        self.stage.kind()
    }

    pub fn has_analyzer(&self) -> bool {
        self.analyzer.is_some()
    }

    /// Report of the finished session
    pub fn report_path(&self) -> Option<&Path> {
        match &self.stage {
            Stage::Done { report_path, .. } => Some(report_path),
            _ => None,
        }
    }

    fn emit(&self, notification: Notification) {
        for observer in &self.observers {
            observer.notify(&notification);
        }
    }

    fn log(&self, message: &str) {
        tracing::info!("{}", message);
        self.emit(Notification::Log(format!(
            "[{}] {}",
            Local::now().format("%H:%M:%S"),
            message
        )));
    }

    fn set_stage(&mut self, stage: Stage) {
        let kind = stage.kind();
        self.stage = stage;
        tracing::debug!("Stage -> {}", kind);
        self.emit(Notification::StageChanged(kind));
    }

    fn fail(&mut self, message: String) {
        tracing::error!("Session failed: {}", message);
        self.log(&format!("ERRO na análise: {}", message));
        self.emit(Notification::Error(message));
        self.set_stage(Stage::Idle);
    }

    /// Begin recording. Ignored unless idle.
    pub async fn start(&mut self, language: &str) -> AppResult<()> {
        if !matches!(self.stage, Stage::Idle) {
            tracing::debug!("Ignoring start while {}", self.stage.kind());
            return Ok(());
        }

        let now = Local::now();
        let file_name = format!("recording_{}.mp4", now.format("%Y%m%d_%H%M%S"));
        let video_path = self.config.recordings_dir.join(&file_name);

        if let Err(e) = self.recorder.start(&video_path).await {
            let message = e.to_string();
            self.log(&format!("Falha ao iniciar gravação: {}", message));
            self.emit(Notification::Error(message));
            return Err(e.into());
        }

        let session = Session::new(video_path, language, now);
        let session_id = session.id;
        self.set_stage(Stage::Recording { session });
        self.log(&format!("Gravação iniciada: {}", file_name));
        self.emit(Notification::Status("Gravando...".to_string()));
        self.start_timer(session_id);
        Ok(())
    }

    fn start_timer(&mut self, session_id: Uuid) {
        let running = Arc::new(AtomicBool::new(true));
        self.timer_running = Some(running.clone());

        let tx = self.tx.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let mut interval = tokio::time::interval(TIMER_PERIOD);
            loop {
                interval.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let message = WorkerMessage::Tick {
                    session_id,
                    elapsed: started.elapsed(),
                };
                if tx.send(message).is_err() {
                    break;
                }
            }
        });
    }

    fn stop_timer(&mut self) {
        if let Some(running) = self.timer_running.take() {
            running.store(false, Ordering::SeqCst);
        }
    }

    /// Stop recording and hand the recording to the analyzer. Ignored
    /// unless recording.
    pub async fn stop(&mut self) -> AppResult<()> {
        if !matches!(self.stage, Stage::Recording { .. }) {
            tracing::debug!("Ignoring stop while {}", self.stage.kind());
            return Ok(());
        }
        let Stage::Recording { mut session } = std::mem::take(&mut self.stage) else {
            return Ok(());
        };

        self.stop_timer();
        self.log("Parando gravação...");

        match self.recorder.stop().await {
            Ok(log) => session.activity_log = log,
            Err(e) => {
                self.fail(e.to_string());
                return Err(e.into());
            }
        }

        let Some(analyzer) = self.analyzer.clone() else {
            self.log("ERRO: Agente de IA não inicializado ou sem API Key.");
            self.emit(Notification::Error("Configure a API Key antes de continuar.".to_string()));
            self.set_stage(Stage::Idle);
            return Err(AnalysisError::Configuration("API Key not configured.".to_string()).into());
        };

        self.log("Vídeo salvo. Iniciando análise...");
        self.emit(Notification::Status("Processando vídeo...".to_string()));

        let tx = self.tx.clone();
        let session_id = session.id;
        let video_path = session.video_path.clone();
        let activity_log = session.activity_log.clone();
        let language = session.language.clone();
        tokio::spawn(async move {
            let result = analyzer.analyze(&video_path, &activity_log, &language).await;
            // The controller may be gone already
            let _ = tx.send(WorkerMessage::AnalysisFinished { session_id, result });
        });

        self.set_stage(Stage::Analyzing { session });
        Ok(())
    }

    /// Discard the finished session. Ignored unless done.
    pub fn reset(&mut self) {
        if !matches!(self.stage, Stage::Done { .. }) {
            tracing::debug!("Ignoring reset while {}", self.stage.kind());
            return;
        }
        self.set_stage(Stage::Idle);
        self.emit(Notification::Status("Pronto para gravar.".to_string()));
    }

    /// Store a new API key and rebuild the analysis client with it
    pub fn update_api_key(&mut self, api_key: &str) -> AppResult<()> {
        self.credentials.save_api_key(api_key)?;
        let client = AnalysisClient::from_config(&self.config, Some(api_key))?;
        self.analyzer = Some(Arc::new(client));
        self.log("API Key salva. Reinicializando IA...");
        Ok(())
    }

    /// Handle every message already queued, without waiting. Returns how
    /// many were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.handle(message);
            handled += 1;
        }
        handled
    }

    /// Wait for one message and handle it
    pub async fn process_next(&mut self) {
        if let Some(message) = self.rx.recv().await {
            self.handle(message);
        }
    }

    /// Handle messages until the analysis of the current session settles
    pub async fn wait_for_analysis(&mut self) {
        while matches!(self.stage, Stage::Analyzing { .. }) {
            self.process_next().await;
        }
    }

    fn handle(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Tick { session_id, elapsed } => match &self.stage {
                Stage::Recording { session } if session.id == session_id => {
                    self.emit(Notification::Timer(format_elapsed(elapsed)));
                }
                _ => tracing::trace!("Dropping stale timer tick"),
            },
            WorkerMessage::AnalysisFinished { session_id, result } => {
                let current = matches!(&self.stage, Stage::Analyzing { session } if session.id == session_id);
                if !current {
                    tracing::debug!("Dropping analysis result of session {}", session_id);
                    return;
                }
                let Stage::Analyzing { session } = std::mem::take(&mut self.stage) else {
                    return;
                };
                self.finish_analysis(session, result);
            }
        }
    }

    fn finish_analysis(&mut self, session: Session, result: Result<String, AnalysisError>) {
        let raw_text = match result {
            Ok(text) => text,
            Err(e) => return self.fail(e.to_string()),
        };

        self.log("Gerando HTML...");
        let report = match self.renderer.render(&raw_text) {
            Ok(report) => report,
            Err(e) => return self.fail(e.to_string()),
        };

        let name = report
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.log(&format!("Relatório pronto: {}", name));
        self.emit(Notification::Status("Relatório gerado com sucesso.".to_string()));

        let report_path = report.path;
        self.set_stage(Stage::Done {
            session,
            report_path: report_path.clone(),
        });
        self.emit(Notification::ReportReady(report_path));
    }
}
