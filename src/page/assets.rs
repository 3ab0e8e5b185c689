use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{DriveError, DriveResult};
use crate::protocol::channel::Deadline;
use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, mpsc};

/// A decoded image asset, premultiplied RGBA8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Premultiplied RGBA8 bytes, row-major.
    pub data: Vec<u8>,
}

impl DecodedImage {
    /// Decode an encoded image (any format `image` understands).
    pub fn decode(bytes: &[u8]) -> DriveResult<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| DriveError::asset(format!("image decode failed: {e}")))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        let mut data = img.into_raw();
        for px in data.chunks_exact_mut(4) {
            let c = Rgba8Premul::from_straight_rgba(px[0], px[1], px[2], px[3]);
            px.copy_from_slice(&c.to_array());
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }
}

/// Where a page fetches assets from. Loads may run concurrently.
pub trait AssetSource: Send + Sync {
    /// Load and decode one asset.
    fn load(&self, key: &str) -> DriveResult<DecodedImage>;
}

/// Loads assets from files relative to a bundle root.
#[derive(Clone, Debug)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    /// Serve assets from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> DriveResult<PathBuf> {
        let rel = normalize_rel_path(key)?;
        Ok(self.root.join(rel))
    }
}

impl AssetSource for FsAssetSource {
    fn load(&self, key: &str) -> DriveResult<DecodedImage> {
        let path = self.resolve(key)?;
        let bytes = std::fs::read(&path)
            .map_err(|e| DriveError::asset(format!("read '{}': {e}", path.display())))?;
        DecodedImage::decode(&bytes)
            .map_err(|e| DriveError::asset(format!("asset '{key}': {}", e.message())))
    }
}

/// Normalize a bundle-relative asset path, rejecting absolute paths and `..` escapes.
pub fn normalize_rel_path(key: &str) -> DriveResult<PathBuf> {
    let key = key.replace('\\', "/");
    let mut out = PathBuf::new();
    for comp in Path::new(&key).components() {
        match comp {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(DriveError::asset(format!(
                    "asset path '{key}' must stay inside the bundle"
                )));
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(DriveError::asset("asset path must be non-empty"));
    }
    Ok(out)
}

/// Assets settled for the active composition.
#[derive(Debug, Default)]
pub struct AssetCache {
    images: HashMap<String, Arc<DecodedImage>>,
}

impl AssetCache {
    /// A settled asset, if present.
    pub fn get(&self, key: &str) -> Option<&DecodedImage> {
        self.images.get(key).map(|a| a.as_ref())
    }

    /// Number of settled assets.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// `true` when nothing has settled yet.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Load every key missing from `cache` concurrently and wait until all of them settle.
///
/// Returns the number of assets loaded by this call. Any failed load fails the whole
/// settlement with [`DriveError::AssetSettlement`] listing every failure; a missed deadline
/// fails it with [`DriveError::Timeout`]. Loads that finish after a timeout are discarded.
pub fn settle(
    source: &Arc<dyn AssetSource>,
    keys: &[String],
    cache: &mut AssetCache,
    deadline: Deadline,
) -> DriveResult<usize> {
    let missing: BTreeSet<&str> = keys
        .iter()
        .map(|k| k.as_str())
        .filter(|k| !cache.images.contains_key(*k))
        .collect();
    if missing.is_empty() {
        return Ok(0);
    }

    let (tx, rx) = mpsc::channel::<(String, DriveResult<DecodedImage>)>();
    for key in &missing {
        let tx = tx.clone();
        let source = Arc::clone(source);
        let key = (*key).to_owned();
        rayon::spawn(move || {
            let res = source.load(&key);
            let _ = tx.send((key, res));
        });
    }
    drop(tx);

    let mut failures = Vec::new();
    let mut loaded = 0usize;
    for _ in 0..missing.len() {
        let msg = match deadline.remaining() {
            None => rx
                .recv()
                .map_err(|_| DriveError::asset("asset loader disconnected before settling"))?,
            Some(left) => rx.recv_timeout(left).map_err(|e| match e {
                mpsc::RecvTimeoutError::Timeout => DriveError::timeout(format!(
                    "asset settlement did not finish before the deadline ({} pending)",
                    missing.len() - loaded - failures.len()
                )),
                mpsc::RecvTimeoutError::Disconnected => {
                    DriveError::asset("asset loader disconnected before settling")
                }
            })?,
        };
        match msg {
            (key, Ok(img)) => {
                cache.images.insert(key, Arc::new(img));
                loaded += 1;
            }
            (key, Err(e)) => failures.push(format!("{key}: {}", e.message())),
        }
    }

    if !failures.is_empty() {
        failures.sort();
        return Err(DriveError::asset(failures.join("; ")));
    }
    tracing::debug!(loaded, "assets settled");
    Ok(loaded)
}

#[cfg(test)]
#[path = "../../tests/unit/page/assets.rs"]
mod tests;
