use axum::extract::Extension;
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::RwLock;
use tokio::sync::mpsc;

#[derive(Debug)]
pub struct JobReport {
    pub job: &'static str,
    /// Units handled in the last tick.
    pub processed: usize,
    /// Units that failed and were requeued.
    pub failed: usize,
}

impl JobReport {
    pub fn new(job: &'static str, processed: usize, failed: usize) -> Self {
        Self {
            job,
            processed,
            failed,
        }
    }
}

#[derive(Debug)]
pub enum MonitorMessage {
    Job(JobReport),
}

#[derive(Default, Clone)]
struct JobStats {
    ticks: u64,
    processed: usize,
    failed: usize,
}

#[derive(Default)]
struct MonitorData {
    jobs: HashMap<&'static str, JobStats>,
}

type SharedState = Arc<RwLock<MonitorData>>;

pub struct Monitor {
    tx: mpsc::Sender<MonitorMessage>,
    rx: mpsc::Receiver<MonitorMessage>,
}

impl Monitor {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(32);
        Self { tx, rx }
    }

    pub fn sender(&self) -> mpsc::Sender<MonitorMessage> {
        self.tx.clone()
    }

    pub async fn start(&mut self) {
        let state = SharedState::default();

        self.start_server(state.clone());

        loop {
            match self.rx.recv().await.expect("some message") {
                MonitorMessage::Job(report) => {
                    let mut data = state.write().unwrap();
                    let stats = data.jobs.entry(report.job).or_default();
                    stats.ticks += 1;
                    stats.processed += report.processed;
                    stats.failed += report.failed;
                }
            };
        }
    }

    fn start_server(&self, state: SharedState) {
        let app = Router::new()
            .route(
                "/",
                get(|| async { "Hey there, you're probably after /status" }),
            )
            .route("/status", get(status))
            .layer(Extension(state));

        let address = SocketAddr::from(([0, 0, 0, 0], 3005));
        tokio::spawn(async move {
            tracing::info!("listening on {}", &address);

            axum::Server::bind(&address)
                .serve(app.into_make_service())
                .await
                .unwrap()
        });
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

async fn status(Extension(state): Extension<SharedState>) -> String {
    let data = &state.read().unwrap();

    let mut jobs: Vec<(&&'static str, &JobStats)> = data.jobs.iter().collect();
    jobs.sort_by_key(|(name, _)| **name);

    jobs.iter()
        .map(|(name, stats)| {
            format!(
                "{}: {} ticks, {} processed, {} failed",
                name, stats.ticks, stats.processed, stats.failed
            )
        })
        .collect::<Vec<String>>()
        .join("\n")
}
