use super::*;
use crate::encode::sink::InMemorySink;
use crate::foundation::core::{Canvas, Fps};
use crate::page::bundle::{Bundle, CompositionEntry};
use crate::page::responder::BundleFactory;
use crate::page::scene::{Scene, SceneCtx};
use serde_json::json;
use std::sync::Arc;

/// Encodes the frame index into the red and green channels.
struct IndexScene {
    fail_at: Option<u64>,
}

impl Scene for IndexScene {
    fn render(&self, ctx: &SceneCtx<'_>) -> DriveResult<FrameRGBA> {
        if self.fail_at == Some(ctx.frame.0) {
            return Err(DriveError::validation(format!("boom at {}", ctx.frame)));
        }
        let c = crate::foundation::core::Rgba8Premul {
            r: (ctx.frame.0 % 256) as u8,
            g: (ctx.frame.0 / 256) as u8,
            b: 0,
            a: 255,
        };
        Ok(FrameRGBA::filled(ctx.canvas, c))
    }
}

fn factory(fail_at: Option<u64>) -> BundleFactory {
    let mut bundle = Bundle::new(".");
    bundle
        .register(CompositionEntry::new(
            "Counter",
            Canvas::new(4, 2).unwrap(),
            Fps::from_int(30).unwrap(),
            40,
            Arc::new(IndexScene { fail_at }),
        ))
        .unwrap();
    BundleFactory::new(Arc::new(bundle), json!({}))
}

fn red_of(frame: &FrameRGBA) -> u8 {
    frame.data[0]
}

#[test]
fn plan_defaults_to_full_range_and_checks_bounds() {
    let f = factory(None);
    let mut driver = Driver::new(f.open().unwrap(), DriverOpts::default());
    let plan = plan_job(&mut driver, &RenderJob::new("Counter")).unwrap();
    assert_eq!(plan.range, FrameRange::full(40));
    assert_eq!(plan.sink_config().unwrap().width, 4);

    let mut job = RenderJob::new("Counter");
    job.range = Some(FrameRange::parse("30-40").unwrap());
    assert!(matches!(
        plan_job(&mut driver, &job),
        Err(DriveError::FrameOutOfRange(_))
    ));

    job.range = Some(FrameRange::new(FrameIndex(3), FrameIndex(3)).unwrap());
    assert!(matches!(
        plan_job(&mut driver, &job),
        Err(DriveError::Validation(_))
    ));

    let err = plan_job(&mut driver, &RenderJob::new("Missing")).unwrap_err();
    assert!(err.to_string().contains("available: [Counter]"));
}

#[test]
fn parallel_range_is_ordered_and_matches_sequential() {
    let f = factory(None);
    let mut job = RenderJob::new("Counter");
    job.range = Some(FrameRange::parse("5-24").unwrap());

    let mut seq = InMemorySink::new();
    let stats = render_range(&f, &job, &mut seq).unwrap();
    assert_eq!(stats.frames_total, 20);
    assert_eq!(stats.frames_rendered, 20);
    assert_eq!(stats.workers, 1);

    job.workers = 3;
    job.channel_capacity = 1;
    let mut par = InMemorySink::new();
    let stats = render_range(&f, &job, &mut par).unwrap();
    assert_eq!(stats.workers, 3);
    assert!(par.is_finished());

    let idx: Vec<u64> = par.frames().iter().map(|(i, _)| i.0).collect();
    assert_eq!(idx, (5..25).collect::<Vec<_>>());
    for (i, frame) in par.frames() {
        assert_eq!(u64::from(red_of(frame)), i.0);
    }
    assert_eq!(seq.frames(), par.frames());
    assert_eq!(par.config().unwrap().fps.num, 30);
}

#[test]
fn workers_are_capped_by_frame_count() {
    let f = factory(None);
    let mut job = RenderJob::new("Counter");
    job.range = Some(FrameRange::parse("0-1").unwrap());
    job.workers = 8;
    let mut sink = InMemorySink::new();
    let stats = render_range(&f, &job, &mut sink).unwrap();
    assert_eq!(stats.workers, 2);
    assert_eq!(sink.frames().len(), 2);
}

#[test]
fn worker_failure_aborts_the_job() {
    let f = factory(Some(7));
    let mut job = RenderJob::new("Counter");
    job.workers = 2;
    let mut sink = InMemorySink::new();
    let err = render_range(&f, &job, &mut sink).unwrap_err();
    assert!(matches!(err, DriveError::Validation(_)));
    assert!(err.to_string().contains("boom at 7"));
    assert!(sink.frames().len() <= 7);
    assert!(!sink.is_finished());
}

#[test]
fn render_frame_seeks_a_fresh_page() {
    let f = factory(None);
    let frame = render_frame(&f, &RenderJob::new("Counter"), FrameIndex(12)).unwrap();
    assert_eq!(red_of(&frame), 12);
    assert!(matches!(
        render_frame(&f, &RenderJob::new("Counter"), FrameIndex(40)),
        Err(DriveError::FrameOutOfRange(_))
    ));
}
