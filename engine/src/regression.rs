//! Engine-level regression testing helpers.
//!
//! Renders are reduced to one SHA-256 per frame and compared against a JSON golden under the
//! calling crate's `tests/goldens/`. Set `QUADRA_UPDATE_GOLDENS=1` to rewrite goldens in place.

use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Environment flag helper: accepts `1/true/yes/on` (case-insensitive).
pub fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// If set, regression tests may update golden files in-place.
pub fn update_goldens_enabled() -> bool {
    env_flag("QUADRA_UPDATE_GOLDENS")
}

pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[macro_export]
macro_rules! regression_golden_path {
    ($name:expr) => {{
        let base = $crate::regression::sanitize_filename($name);
        ::std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("goldens")
            .join(format!("{base}.json"))
    }};
}

pub fn rgba_sha256_hex(rgba: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rgba);
    let digest = hasher.finalize();
    hex::encode(digest)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameHashGolden {
    pub version: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub hash_alg: String,
    /// One hash per rendered frame.
    pub hashes: Vec<String>,
}

impl FrameHashGolden {
    pub fn new(name: impl Into<String>, width: u32, height: u32, hashes: Vec<String>) -> Self {
        Self {
            version: 1,
            name: name.into(),
            width,
            height,
            hash_alg: "sha256".to_string(),
            hashes,
        }
    }
}

pub fn load_golden_json(path: impl AsRef<Path>) -> io::Result<FrameHashGolden> {
    let path = path.as_ref();
    let file = fs::File::open(path)?;
    let reader = io::BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("failed parsing golden json {}: {e}", path.display()),
        )
    })
}

pub fn save_golden_json(path: impl AsRef<Path>, golden: &FrameHashGolden) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = fs::File::create(path)?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, golden).map_err(io::Error::other)?;
    writer.flush()?;
    Ok(())
}

/// Compares `golden` with the file at `path`, writing it when missing or when `update` is set.
pub fn assert_or_update_golden_json(
    path: impl AsRef<Path>,
    golden: &FrameHashGolden,
    update: bool,
) -> io::Result<()> {
    let path = path.as_ref();
    let exists = path.exists();

    if update || !exists {
        save_golden_json(path, golden)?;
        if !exists {
            info!("wrote golden: {}", path.display());
        } else {
            info!("updated golden: {}", path.display());
        }
        return Ok(());
    }

    let expected = load_golden_json(path)?;
    if expected.version != golden.version
        || expected.hash_alg != golden.hash_alg
        || expected.width != golden.width
        || expected.height != golden.height
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "golden metadata mismatch at {}:\nexpected: v{} alg={} {}x{}\nactual:   v{} alg={} {}x{}\n(hint: set QUADRA_UPDATE_GOLDENS=1 to rewrite)",
                path.display(),
                expected.version,
                expected.hash_alg,
                expected.width,
                expected.height,
                golden.version,
                golden.hash_alg,
                golden.width,
                golden.height
            ),
        ));
    }

    if expected.hashes.len() != golden.hashes.len() {
        return Err(io::Error::other(format!(
            "golden frame count mismatch at {}: expected {} hashes, got {}\n(hint: set QUADRA_UPDATE_GOLDENS=1 to rewrite)",
            path.display(),
            expected.hashes.len(),
            golden.hashes.len()
        )));
    }

    for (i, (a, b)) in expected.hashes.iter().zip(golden.hashes.iter()).enumerate() {
        if a != b {
            return Err(io::Error::other(format!(
                "golden mismatch at {} (frame {i}):\nexpected: {a}\nactual:   {b}\n(hint: set QUADRA_UPDATE_GOLDENS=1 to rewrite)",
                path.display()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_filename_replaces_separators() {
        assert_eq!(sanitize_filename("wolf hour/nebula"), "wolf_hour_nebula");
    }

    #[test]
    fn sha256_of_empty_input_is_the_well_known_digest() {
        assert_eq!(
            rgba_sha256_hex(&[]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn golden_mismatch_is_reported_without_update() {
        let dir = std::env::temp_dir().join(format!("quadra_golden_{}", std::process::id()));
        let path = dir.join("mismatch.json");
        let first = FrameHashGolden::new("mismatch", 2, 2, vec!["aa".into()]);
        assert_or_update_golden_json(&path, &first, false).expect("first write");

        let second = FrameHashGolden::new("mismatch", 2, 2, vec!["bb".into()]);
        let err = assert_or_update_golden_json(&path, &second, false).expect_err("mismatch");
        assert!(err.to_string().contains("frame 0"));

        assert_or_update_golden_json(&path, &second, true).expect("update");
        assert_eq!(load_golden_json(&path).expect("load"), second);
        let _ = fs::remove_dir_all(dir);
    }
}
