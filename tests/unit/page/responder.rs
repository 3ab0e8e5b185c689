use super::*;
use crate::page::assets::DecodedImage;
use crate::protocol::wire::PageReply;
use serde_json::json;
use std::path::Path;
use std::sync::Mutex;

const MANIFEST: &str = r##"{
  "compositions": [
    {
      "id": "HelloWorld",
      "width": 16, "height": 8, "fps": 30, "durationInFrames": 150,
      "defaultProps": {"titleText": "Welcome", "titleColor": "#ff0000"},
      "schema": {"fields": {"titleText": {"type": "string"}, "titleColor": {"type": "color"}}},
      "scene": {"background": "#ffffff", "layers": [
        {"type": "box", "color": "$titleColor", "size": 6, "degreesPerFrame": 2.0},
        {"type": "progress", "color": "#0000ff", "height": 1}
      ]}
    },
    {
      "id": "Broken",
      "width": 4, "height": 4, "fps": 30, "durationInFrames": 10,
      "defaultProps": {"count": "three"},
      "schema": {"fields": {"count": {"type": "integer"}}}
    },
    {
      "id": "Logo",
      "width": 4, "height": 4, "fps": 30, "durationInFrames": 10,
      "scene": {"layers": [{"type": "image", "asset": "logo.png"}]}
    }
  ]
}"##;

#[derive(Default)]
struct CountingSource {
    loads: Mutex<usize>,
    missing: bool,
}

impl AssetSource for CountingSource {
    fn load(&self, key: &str) -> DriveResult<DecodedImage> {
        *self.loads.lock().unwrap() += 1;
        if self.missing {
            return Err(DriveError::asset(format!("404 {key}")));
        }
        Ok(DecodedImage {
            width: 2,
            height: 2,
            data: vec![0, 255, 0, 255].repeat(4),
        })
    }
}

fn bundle() -> Arc<Bundle> {
    Arc::new(Bundle::from_json(MANIFEST, Path::new("/unused")).unwrap())
}

fn page_with(source: Arc<CountingSource>) -> PageResponder {
    PageResponder::with_assets(bundle(), json!({}), source)
}

fn page() -> PageResponder {
    page_with(Arc::new(CountingSource::default()))
}

fn descriptor(page: &PageResponder, id: &str) -> CompositionDescriptor {
    let comps = page.get_static_compositions().unwrap();
    let comp = comps.iter().find(|c| c.id == id).unwrap();
    CompositionDescriptor::from_composition(comp, None).unwrap()
}

#[test]
fn discovery_excludes_and_reports_invalid_props() {
    let p = page();
    let report = p.discover();
    let ids: Vec<&str> = report.compositions.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["HelloWorld", "Logo"]);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].id, "Broken");
    assert!(matches!(
        report.rejected[0].error,
        DriveError::SchemaValidation(_)
    ));

    let hello = &report.compositions[0];
    assert_eq!(
        hello.serialized_resolved_props_with_custom_schema,
        r##"{"titleText":"Welcome","titleColor":"#ff0000"}"##
    );
    assert_eq!(
        hello.serialized_default_props_with_custom_schema,
        hello.serialized_resolved_props_with_custom_schema
    );
}

#[test]
fn input_props_override_defaults_in_discovery() {
    let p = PageResponder::with_assets(
        bundle(),
        json!({"titleText": "Hi"}),
        Arc::new(CountingSource::default()),
    );
    let comps = p.get_static_compositions().unwrap();
    assert_eq!(
        comps[0].serialized_resolved_props_with_custom_schema,
        r##"{"titleText":"Hi","titleColor":"#ff0000"}"##
    );
    assert_eq!(
        comps[0].serialized_default_props_with_custom_schema,
        r##"{"titleText":"Welcome","titleColor":"#ff0000"}"##
    );
}

#[test]
fn composition_mode_renders_frame_zero_and_blocks_discovery() {
    let mut p = page();
    let desc = descriptor(&p, "HelloWorld");
    p.set_bundle_mode(&BundleMode::Composition(desc), Deadline::none())
        .unwrap();
    assert_eq!(p.mode_name(), "composition");
    assert_eq!(
        p.cursor(),
        Some(&FrameCursor {
            frame: FrameIndex(0),
            composition: "HelloWorld".to_owned()
        })
    );
    let f = p.capture_frame().unwrap();
    assert_eq!((f.width, f.height), (16, 8));
    // box centre is red, top-left corner is background
    assert_eq!(f.pixel(8, 4), Some([255, 0, 0, 255]));
    assert_eq!(f.pixel(0, 0), Some([255, 255, 255, 255]));

    assert!(matches!(
        p.get_static_compositions(),
        Err(DriveError::InvalidMode(_))
    ));
}

#[test]
fn seek_rejections_keep_state() {
    let mut p = page();
    let desc = descriptor(&p, "HelloWorld");
    assert!(matches!(
        p.set_frame(FrameIndex(0), "HelloWorld", Deadline::none()),
        Err(DriveError::InvalidMode(_))
    ));

    p.set_bundle_mode(&BundleMode::Composition(desc), Deadline::none())
        .unwrap();
    p.set_frame(FrameIndex(7), "HelloWorld", Deadline::none())
        .unwrap();
    let before = p.capture_frame().unwrap();

    assert!(matches!(
        p.set_frame(FrameIndex(3), "Logo", Deadline::none()),
        Err(DriveError::StaleSeek(_))
    ));
    assert!(matches!(
        p.set_frame(FrameIndex(150), "HelloWorld", Deadline::none()),
        Err(DriveError::FrameOutOfRange(_))
    ));
    assert_eq!(p.cursor().unwrap().frame, FrameIndex(7));
    assert_eq!(p.capture_frame().unwrap(), before);

    let ack = p
        .set_frame(FrameIndex(149), "HelloWorld", Deadline::none())
        .unwrap();
    assert_eq!(ack.frame, FrameIndex(149));
    assert_eq!(ack.settled_assets, 0);
}

#[test]
fn invalid_props_reject_transition_and_keep_mode() {
    let mut p = page();
    let mut desc = descriptor(&p, "HelloWorld");
    desc.serialized_resolved_props_with_schema = r#"{"titleText": 5}"#.to_owned();
    let err = p
        .set_bundle_mode(&BundleMode::Composition(desc.clone()), Deadline::none())
        .unwrap_err();
    assert!(matches!(err, DriveError::SchemaValidation(_)));
    assert_eq!(p.mode_name(), "evaluation");
    assert_eq!(p.get_static_compositions().unwrap().len(), 2);

    desc.serialized_resolved_props_with_schema = "not json".to_owned();
    assert!(matches!(
        p.set_bundle_mode(&BundleMode::Composition(desc.clone()), Deadline::none()),
        Err(DriveError::SchemaValidation(_))
    ));
    desc.serialized_resolved_props_with_schema = "[1, 2]".to_owned();
    assert!(matches!(
        p.set_bundle_mode(&BundleMode::Composition(desc), Deadline::none()),
        Err(DriveError::SchemaValidation(_))
    ));
    assert_eq!(p.mode_name(), "evaluation");
}

#[test]
fn descriptor_dimensions_override_registration() {
    let mut p = page();
    let mut desc = descriptor(&p, "HelloWorld");
    desc.composition_width = 10;
    desc.composition_height = 10;
    desc.composition_duration_in_frames = 5;
    p.set_bundle_mode(&BundleMode::Composition(desc), Deadline::none())
        .unwrap();
    assert_eq!(p.capture_frame().unwrap().canvas(), Canvas::new(10, 10).unwrap());
    assert!(matches!(
        p.set_frame(FrameIndex(5), "HelloWorld", Deadline::none()),
        Err(DriveError::FrameOutOfRange(_))
    ));
}

#[test]
fn assets_settle_once_per_composition_state() {
    let source = Arc::new(CountingSource::default());
    let mut p = page_with(Arc::clone(&source));
    let desc = descriptor(&p, "Logo");
    p.set_bundle_mode(&BundleMode::Composition(desc.clone()), Deadline::none())
        .unwrap();
    assert_eq!(*source.loads.lock().unwrap(), 1);
    assert_eq!(p.capture_frame().unwrap().pixel(1, 1), Some([0, 255, 0, 255]));
    assert_eq!(p.capture_frame().unwrap().pixel(3, 3), Some([0, 0, 0, 0]));

    let ack = p.set_frame(FrameIndex(4), "Logo", Deadline::none()).unwrap();
    assert_eq!(ack.settled_assets, 0);
    assert_eq!(*source.loads.lock().unwrap(), 1);

    p.set_bundle_mode(&BundleMode::Evaluation, Deadline::none())
        .unwrap();
    p.set_bundle_mode(&BundleMode::Composition(desc), Deadline::none())
        .unwrap();
    assert_eq!(*source.loads.lock().unwrap(), 2);
}

#[test]
fn failed_assets_reject_the_transition() {
    let source = Arc::new(CountingSource {
        missing: true,
        ..Default::default()
    });
    let mut p = page_with(source);
    let desc = descriptor(&p, "Logo");
    let err = p
        .set_bundle_mode(&BundleMode::Composition(desc), Deadline::none())
        .unwrap_err();
    assert!(matches!(err, DriveError::AssetSettlement(_)));
    assert_eq!(p.mode_name(), "evaluation");
}

#[test]
fn handle_wraps_results_in_reply_envelopes() {
    let mut p = page();
    let PageReply::Ok(Value::String(list)) =
        p.handle(&PageCall::GetStaticCompositions, Deadline::none())
    else {
        panic!("discovery should reply with a JSON string");
    };
    assert!(
        list.starts_with(r#"[{"width":16,"height":8,"fps":30,"durationInFrames":150,"id":"HelloWorld""#)
    );

    let reply = p.handle(
        &PageCall::SetFrame {
            frame: FrameIndex(0),
            composition: "HelloWorld".to_owned(),
        },
        Deadline::none(),
    );
    let PageReply::Error(e) = reply else {
        panic!("seek in evaluation mode must fail");
    };
    assert_eq!(e.kind, "invalid_mode");
}

#[test]
fn factory_opens_independent_pages() {
    let factory = BundleFactory::with_assets(
        bundle(),
        json!({}),
        Arc::new(CountingSource::default()),
    );
    let mut a = factory.open().unwrap();
    let b = factory.open().unwrap();
    let desc = descriptor(&a, "HelloWorld");
    a.set_bundle_mode(&BundleMode::Composition(desc), Deadline::none())
        .unwrap();
    assert_eq!(a.mode_name(), "composition");
    assert_eq!(b.mode_name(), "evaluation");
}
