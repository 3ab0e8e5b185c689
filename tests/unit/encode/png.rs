use super::*;
use crate::foundation::core::{Canvas, Fps, Rgba8Premul};

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("reeldrive_png_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn cfg() -> SinkConfig {
    SinkConfig {
        width: 3,
        height: 2,
        fps: Fps::from_int(30).unwrap(),
    }
}

fn frame(color: Rgba8Premul) -> FrameRGBA {
    FrameRGBA::filled(Canvas::new(3, 2).unwrap(), color)
}

#[test]
fn writes_numbered_pngs_that_decode_back() {
    let dir = temp_dir("roundtrip");
    let mut sink = PngSequenceSink::new(&dir);
    sink.begin(cfg()).unwrap();
    let red = frame(Rgba8Premul::from_straight_rgba(255, 0, 0, 255));
    sink.push_frame(FrameIndex(3), &red).unwrap();
    sink.push_frame(FrameIndex(5), &red).unwrap();
    sink.end().unwrap();

    assert_eq!(
        sink.written(),
        &[dir.join("frame-3.png"), dir.join("frame-5.png")]
    );
    let bytes = std::fs::read(sink.frame_path(FrameIndex(5))).unwrap();
    assert_eq!(FrameRGBA::from_png(&bytes).unwrap(), red);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn rejects_out_of_order_and_wrong_size() {
    let dir = temp_dir("order");
    let mut sink = PngSequenceSink::new(&dir);
    sink.begin(cfg()).unwrap();
    let f = frame(Rgba8Premul::transparent());
    sink.push_frame(FrameIndex(2), &f).unwrap();
    assert!(sink.push_frame(FrameIndex(2), &f).is_err());
    assert!(sink.push_frame(FrameIndex(1), &f).is_err());

    let wrong = FrameRGBA::filled(Canvas::new(2, 2).unwrap(), Rgba8Premul::transparent());
    assert!(matches!(
        sink.push_frame(FrameIndex(9), &wrong),
        Err(DriveError::Validation(_))
    ));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn no_overwrite_refuses_existing_files() {
    let dir = temp_dir("no_overwrite");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("frame-0.png"), b"old").unwrap();
    let mut sink = PngSequenceSink::new(&dir).no_overwrite();
    sink.begin(cfg()).unwrap();
    assert!(
        sink.push_frame(FrameIndex(0), &frame(Rgba8Premul::transparent()))
            .is_err()
    );
    assert_eq!(std::fs::read(dir.join("frame-0.png")).unwrap(), b"old");
    let _ = std::fs::remove_dir_all(&dir);
}
