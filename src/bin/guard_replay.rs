//! Replay a recorded detection trace through the monitor and print the
//! resulting event log as JSON lines.
//!
//! The trace is a JSON document with the enrolled profiles and, per frame,
//! the visible faces (box plus embedding) and the poses found in the scene:
//!
//! ```json
//! {
//!   "width": 640, "height": 480,
//!   "profiles": [{ "name": "alice", "embedding": [0.1, 0.2] }],
//!   "frames": [{
//!     "timestamp": 0.0,
//!     "faces": [{ "tlbr": [100, 80, 160, 150], "embedding": [0.1, 0.2] }],
//!     "poses": [{ "anchor": [130, 240], "landmarks": [...] }]
//!   }]
//! }
//! ```
//!
//! A pose is handed to whichever body region contains its anchor point.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;
use nalgebra::DVector;
use serde::Deserialize;

use poseguard_rs::integration::{EventLog, EventRecord, SirenTask, SnapshotJanitor};
use poseguard_rs::{
    Alert, AlertSink, Error, FaceDetectionBuilder, FaceDetector, Frame, Landmark, MonitorConfig,
    MonitorPipeline, PoseEstimator, PoseObservation, Rect, Result, TargetProfile, TrackerFactory,
    VisualTracker,
};
use poseguard_rs::tracker::FaceDetection;

/// Minimum IoU between a replay track and a recorded face to keep following it.
const FOLLOW_IOU: f32 = 0.1;

/// How often expired alert snapshots are purged.
const JANITOR_PERIOD: Duration = Duration::from_secs(3600);

#[derive(Parser, Debug)]
#[command(name = "guard_replay", about = "Replay a recorded trace through the guard monitor")]
struct Args {
    /// Trace file (JSON).
    trace: PathBuf,
    /// Monitor configuration (JSON); defaults are used when omitted.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Start with alert mode enabled.
    #[arg(long)]
    alert_mode: bool,
    /// Write the event log here instead of stdout.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Trace {
    width: u32,
    height: u32,
    profiles: Vec<TraceProfile>,
    #[serde(default)]
    wanted: Option<TraceProfile>,
    frames: Vec<TraceFrame>,
}

#[derive(Debug, Deserialize)]
struct TraceProfile {
    name: String,
    embedding: Vec<f32>,
    #[serde(default)]
    reference_poses: BTreeMap<poseguard_rs::Action, Vec<Landmark>>,
}

#[derive(Debug, Default, Deserialize)]
struct TraceFrame {
    timestamp: f64,
    #[serde(default)]
    faces: Vec<TraceFace>,
    #[serde(default)]
    poses: Vec<TracePose>,
}

#[derive(Debug, Clone, Deserialize)]
struct TraceFace {
    tlbr: [f32; 4],
    embedding: Vec<f32>,
}

impl TraceFace {
    fn rect(&self) -> Rect {
        let [x1, y1, x2, y2] = self.tlbr;
        Rect::from_tlbr(x1, y1, x2, y2)
    }

    fn detection(&self) -> FaceDetection {
        let [x1, y1, x2, y2] = self.tlbr;
        FaceDetectionBuilder::new()
            .tlbr(x1, y1, x2, y2)
            .embedding(&self.embedding)
            .build()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TracePose {
    anchor: [f32; 2],
    #[serde(flatten)]
    observation: PoseObservation,
}

type Scene = Rc<RefCell<TraceFrame>>;

/// Reports the faces recorded for the current frame.
struct ReplayDetector(Scene);

impl FaceDetector for ReplayDetector {
    type Error = Infallible;

    fn detect(&mut self, _frame: &Frame<'_>) -> std::result::Result<Vec<FaceDetection>, Infallible> {
        Ok(self.0.borrow().faces.iter().map(TraceFace::detection).collect())
    }
}

/// Hands out the recorded pose whose anchor falls inside the region.
struct ReplayPose(Scene);

impl PoseEstimator for ReplayPose {
    type Error = Infallible;

    fn estimate(
        &mut self,
        _frame: &Frame<'_>,
        region: Rect,
    ) -> std::result::Result<PoseObservation, Infallible> {
        let [x1, y1, x2, y2] = region.to_tlbr();
        let found = self.0.borrow().poses.iter().find_map(|pose| {
            let [ax, ay] = pose.anchor;
            (ax >= x1 && ax <= x2 && ay >= y1 && ay <= y2).then(|| pose.observation.clone())
        });
        Ok(found.unwrap_or_default())
    }
}

/// Follows the recorded face that overlaps its last box the most.
struct ReplayTracker {
    scene: Scene,
    last: Rect,
}

impl VisualTracker for ReplayTracker {
    fn update(&mut self, _frame: &Frame<'_>) -> Option<Rect> {
        let next = self
            .scene
            .borrow()
            .faces
            .iter()
            .map(TraceFace::rect)
            .map(|r| (self.last.iou(&r), r))
            .filter(|(iou, _)| *iou >= FOLLOW_IOU)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, r)| r)?;
        self.last = next;
        Some(next)
    }
}

struct ReplayTrackers(Scene);

impl TrackerFactory for ReplayTrackers {
    type Tracker = ReplayTracker;

    fn create(&mut self, _frame: &Frame<'_>, face: Rect) -> Option<ReplayTracker> {
        Some(ReplayTracker {
            scene: Rc::clone(&self.0),
            last: face,
        })
    }
}

/// Collects events and drives a logging siren.
#[derive(Default)]
struct ReplaySink {
    log: EventLog,
    siren: Option<SirenTask>,
}

impl AlertSink for ReplaySink {
    fn snapshot(&mut self, alert: &Alert, _frame: &Frame<'_>, region: Option<Rect>) -> Option<PathBuf> {
        log::info!("snapshot requested for {} ({:?}) region {region:?}", alert.name, alert.kind);
        None
    }

    fn start_siren(&mut self, duration: Duration) {
        self.stop_siren();
        log::warn!("siren on for {:.1}s", duration.as_secs_f64());
        self.siren = Some(SirenTask::spawn(duration, || log::debug!("siren tick")));
    }

    fn stop_siren(&mut self) {
        if let Some(siren) = self.siren.take() {
            let ticks = siren.stop();
            log::info!("siren off after {ticks} ticks");
        }
    }

    fn record(&mut self, event: &EventRecord) {
        self.log.push(event.clone());
    }
}

fn profile(entry: TraceProfile) -> Result<TargetProfile> {
    Ok(TargetProfile::new(entry.name, DVector::from_vec(entry.embedding))?
        .with_reference_poses(entry.reference_poses))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    config.validate()?;

    let text = std::fs::read_to_string(&args.trace).map_err(|e| Error::Io {
        path: args.trace.clone(),
        source: e,
    })?;
    let trace: Trace = serde_json::from_str(&text)?;
    log::info!(
        "replaying {} frames with {} profiles",
        trace.frames.len(),
        trace.profiles.len()
    );

    let janitor = SnapshotJanitor::from_config(&config.storage, JANITOR_PERIOD);
    let scene: Scene = Rc::new(RefCell::new(TraceFrame::default()));
    let mut pipeline = MonitorPipeline::new(
        config,
        ReplayDetector(Rc::clone(&scene)),
        ReplayPose(Rc::clone(&scene)),
        ReplayTrackers(Rc::clone(&scene)),
        ReplaySink::default(),
    );

    let start = trace.frames.first().map_or(0.0, |f| f.timestamp);
    for entry in trace.profiles {
        pipeline.engine_mut().select_profile(profile(entry)?, start)?;
    }
    if let Some(wanted) = trace.wanted {
        pipeline
            .engine_mut()
            .watch_for(wanted.name, DVector::from_vec(wanted.embedding));
    }
    pipeline.engine_mut().set_alert_mode(args.alert_mode, start);

    let mut alerts = 0;
    let mut last = start;
    for recorded in trace.frames {
        let timestamp = recorded.timestamp;
        last = timestamp;
        *scene.borrow_mut() = recorded;
        let report = pipeline.process_frame(&Frame::new(&[], trace.width, trace.height, timestamp));
        alerts += report.alerts.len();
        for (name, reason) in &report.losses {
            log::debug!("frame {}: {name} lost ({reason:?})", report.frame_id);
        }
    }

    pipeline.sink_mut().stop_siren();
    janitor.stop();
    for target in pipeline.engine().status(last) {
        log::info!(
            "{}: {:?}, last action {}",
            target.name,
            target.phase,
            target.action.label()
        );
    }
    log::info!("{alerts} alerts, {} events", pipeline.sink().log.len());

    match &args.output {
        Some(path) => {
            let file = File::create(path).map_err(|e| Error::Io {
                path: path.clone(),
                source: e,
            })?;
            let mut out = BufWriter::new(file);
            pipeline.sink().log.write_json_lines(&mut out)?;
            out.flush().map_err(|e| Error::Io {
                path: path.clone(),
                source: e,
            })?;
        }
        None => pipeline.sink().log.write_json_lines(std::io::stdout().lock())?,
    }
    Ok(())
}
