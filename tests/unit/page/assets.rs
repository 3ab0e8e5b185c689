use super::*;
use std::sync::Mutex;
use std::time::Duration;

struct MapSource {
    images: HashMap<String, DecodedImage>,
    loads: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MapSource {
    fn new(keys: &[&str]) -> Self {
        let images = keys
            .iter()
            .map(|k| {
                (
                    (*k).to_owned(),
                    DecodedImage {
                        width: 1,
                        height: 1,
                        data: vec![1, 2, 3, 255],
                    },
                )
            })
            .collect();
        Self {
            images,
            loads: Mutex::new(Vec::new()),
            delay: None,
        }
    }
}

impl AssetSource for MapSource {
    fn load(&self, key: &str) -> DriveResult<DecodedImage> {
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }
        self.loads.lock().unwrap().push(key.to_owned());
        self.images
            .get(key)
            .cloned()
            .ok_or_else(|| DriveError::asset(format!("no such asset '{key}'")))
    }
}

fn keys(ks: &[&str]) -> Vec<String> {
    ks.iter().map(|k| (*k).to_owned()).collect()
}

#[test]
fn settle_loads_missing_keys_once() {
    let src = Arc::new(MapSource::new(&["a.png", "b.png"]));
    let dyn_src: Arc<dyn AssetSource> = src.clone();
    let mut cache = AssetCache::default();

    let n = settle(&dyn_src, &keys(&["a.png", "b.png", "a.png"]), &mut cache, Deadline::none())
        .unwrap();
    assert_eq!(n, 2);
    assert_eq!(cache.len(), 2);

    let n = settle(&dyn_src, &keys(&["a.png"]), &mut cache, Deadline::none()).unwrap();
    assert_eq!(n, 0);
    assert_eq!(src.loads.lock().unwrap().len(), 2);
}

#[test]
fn settle_reports_every_failure() {
    let src: Arc<dyn AssetSource> = Arc::new(MapSource::new(&["ok.png"]));
    let mut cache = AssetCache::default();
    let err = settle(
        &src,
        &keys(&["ok.png", "missing-b.png", "missing-a.png"]),
        &mut cache,
        Deadline::none(),
    )
    .unwrap_err();
    assert!(matches!(err, DriveError::AssetSettlement(_)));
    let msg = err.to_string();
    assert!(msg.contains("missing-a.png: no such asset"));
    assert!(msg.contains("missing-b.png: no such asset"));
    assert!(cache.get("missing-a.png").is_none());
}

#[test]
fn settle_times_out_on_slow_sources() {
    let mut src = MapSource::new(&["slow.png"]);
    src.delay = Some(Duration::from_millis(200));
    let src: Arc<dyn AssetSource> = Arc::new(src);
    let mut cache = AssetCache::default();
    let err = settle(
        &src,
        &keys(&["slow.png"]),
        &mut cache,
        Deadline::after(Duration::from_millis(10)),
    )
    .unwrap_err();
    assert!(matches!(err, DriveError::Timeout(_)));
}

#[test]
fn rel_paths_cannot_escape_bundle() {
    assert_eq!(
        normalize_rel_path("./img/logo.png").unwrap(),
        PathBuf::from("img/logo.png")
    );
    assert!(normalize_rel_path("../secret.png").is_err());
    assert!(normalize_rel_path("/etc/passwd").is_err());
    assert!(normalize_rel_path("").is_err());
}

#[test]
fn fs_source_reports_missing_files_as_settlement_errors() {
    let src = FsAssetSource::new(std::env::temp_dir().join("reeldrive_no_such_bundle"));
    assert!(matches!(
        src.load("nope.png"),
        Err(DriveError::AssetSettlement(_))
    ));
}
