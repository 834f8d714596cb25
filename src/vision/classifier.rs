//! Perceptual-hash scene classification
//!
//! Each known UI scene is represented by one or more reference screenshots
//! under `<dataset_root>/<scene_name>/`. At load time every template is
//! reduced to a DCT perceptual hash; a live capture is classified by a
//! linear nearest-neighbor scan over all template hashes by Hamming
//! distance. The index is small (tens to low hundreds of templates) and
//! classification runs at roughly 1 Hz, so the linear scan is fine.

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbaImage};
use image_hasher::{HashAlg, Hasher, HasherConfig, ImageHash};
use log::{debug, info, warn};

use super::VisionError;

/// Hash side length; 16x16 = 256 bits per fingerprint.
pub const HASH_SIZE: u32 = 16;

/// Image extensions accepted as templates.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Reserved dataset subdirectory holding UI-element crops, not scenes.
pub const RESERVED_DIR: &str = "templates";

/// One reference image reduced to its perceptual hash.
#[derive(Debug, Clone)]
pub struct Template {
    pub hash: ImageHash,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
struct SceneTemplates {
    scene: String,
    templates: Vec<Template>,
}

/// Result of classifying one capture: the nearest scene, how far it was,
/// and which template won.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneMatch {
    pub scene: String,
    pub distance: u32,
    pub template: PathBuf,
}

/// Nearest-neighbor scene classifier over perceptual hashes.
///
/// The hash configuration is fixed at construction so template and query
/// fingerprints are always comparable.
pub struct SceneClassifier {
    hasher: Hasher,
    scenes: Vec<SceneTemplates>,
}

impl std::fmt::Debug for SceneClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneClassifier")
            .field("scenes", &self.scenes)
            .finish_non_exhaustive()
    }
}

impl SceneClassifier {
    pub fn new() -> Self {
        let hasher = HasherConfig::new()
            .hash_size(HASH_SIZE, HASH_SIZE)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();
        Self {
            hasher,
            scenes: Vec::new(),
        }
    }

    /// Build a classifier from a dataset directory, failing on an empty
    /// index - an automation run must not proceed without templates.
    pub fn from_dataset(root: &Path) -> Result<Self, VisionError> {
        let mut classifier = Self::new();
        let total = classifier.load(root)?;
        if total == 0 {
            return Err(VisionError::EmptyDataset(root.to_path_buf()));
        }
        info!("Loaded {total} scene templates from {}", root.display());
        Ok(classifier)
    }

    /// Load templates from every scene subdirectory of `root`.
    ///
    /// Subdirectories are visited in name order and their image files in
    /// name order, which fixes the tie-break order of `classify`. Decode
    /// failures are skipped; directories yielding no valid image are left
    /// out of the index. Returns the total number of templates loaded.
    pub fn load(&mut self, root: &Path) -> Result<usize, VisionError> {
        let entries = std::fs::read_dir(root)
            .map_err(|e| VisionError::DatasetUnreadable(root.to_path_buf(), e))?;
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        let mut total = 0;
        for dir in dirs {
            let scene = match dir.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            if scene.eq_ignore_ascii_case(RESERVED_DIR) {
                continue;
            }

            let mut templates = Vec::new();
            let mut files: Vec<PathBuf> = match std::fs::read_dir(&dir) {
                Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
                Err(e) => {
                    warn!("Cannot read scene directory {}: {e}", dir.display());
                    continue;
                }
            };
            files.sort();

            for path in files {
                if !has_supported_extension(&path) {
                    continue;
                }
                match image::open(&path) {
                    Ok(img) => {
                        let hash = self.hash_dynamic(&img);
                        templates.push(Template { hash, path });
                        total += 1;
                    }
                    Err(e) => {
                        debug!("Skip template {}: {e}", path.display());
                    }
                }
            }

            if !templates.is_empty() {
                info!("Loaded {} templates for scene '{scene}'", templates.len());
                self.scenes.push(SceneTemplates { scene, templates });
            }
        }
        Ok(total)
    }

    /// Total number of templates across all scenes.
    pub fn len(&self) -> usize {
        self.scenes.iter().map(|s| s.templates.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Scene names with their template counts, in load order.
    pub fn scene_counts(&self) -> Vec<(String, usize)> {
        self.scenes
            .iter()
            .map(|s| (s.scene.clone(), s.templates.len()))
            .collect()
    }

    /// Perceptual hash of a capture, normalized the same way templates are.
    pub fn hash(&self, image: &RgbaImage) -> ImageHash {
        self.hash_dynamic(&DynamicImage::ImageRgba8(image.clone()))
    }

    fn hash_dynamic(&self, image: &DynamicImage) -> ImageHash {
        // Fixed color mode keeps template and query hashes comparable
        // regardless of the source pixel format.
        let rgb = image.to_rgb8();
        self.hasher.hash_image(&DynamicImage::ImageRgb8(rgb))
    }

    /// Classify a capture. `None` only when the index is empty; otherwise
    /// the nearest scene is always returned, however large the distance.
    pub fn classify(&self, image: &RgbaImage) -> Option<SceneMatch> {
        if self.scenes.is_empty() {
            warn!("No scene templates loaded");
            return None;
        }
        let hash = self.hash(image);
        self.classify_hash(&hash)
    }

    /// Nearest-neighbor scan at the hash level. Ties resolve to the first
    /// pair in load order.
    pub fn classify_hash(&self, hash: &ImageHash) -> Option<SceneMatch> {
        let mut best: Option<SceneMatch> = None;
        for scene in &self.scenes {
            for template in &scene.templates {
                let distance = hash.dist(&template.hash);
                if best.as_ref().map_or(true, |b| distance < b.distance) {
                    best = Some(SceneMatch {
                        scene: scene.scene.clone(),
                        distance,
                        template: template.path.clone(),
                    });
                }
            }
        }
        best
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, scene: &str, hash: ImageHash, path: &str) {
        if let Some(existing) = self.scenes.iter_mut().find(|s| s.scene == scene) {
            existing.templates.push(Template {
                hash,
                path: PathBuf::from(path),
            });
        } else {
            self.scenes.push(SceneTemplates {
                scene: scene.to_string(),
                templates: vec![Template {
                    hash,
                    path: PathBuf::from(path),
                }],
            });
        }
    }
}

impl Default for SceneClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::scene_image;

    fn hash_from_bits(set_bits: &[usize]) -> ImageHash {
        // 16x16 hash = 32 bytes.
        let mut bytes = [0u8; 32];
        for &bit in set_bits {
            bytes[bit / 8] |= 1 << (bit % 8);
        }
        ImageHash::from_bytes(&bytes).expect("valid hash bytes")
    }

    #[test]
    fn test_empty_index_returns_none() {
        let classifier = SceneClassifier::new();
        let img = scene_image(1, 96, 96);
        assert!(classifier.classify(&img).is_none());
    }

    #[test]
    fn test_nearest_scene_wins() {
        // Index: login_menu at H1 (all zero), main_menu at H2 (22 bits set).
        // A query 3 bits away from H1 and 25 away from H2 must match
        // login_menu at distance 3.
        let mut classifier = SceneClassifier::new();
        classifier.insert("login_menu", hash_from_bits(&[]), "login_menu/a.png");
        let h2: Vec<usize> = (3..25).collect();
        classifier.insert("main_menu", hash_from_bits(&h2), "main_menu/a.png");

        let query = hash_from_bits(&[0, 1, 2]);
        let m = classifier.classify_hash(&query).unwrap();
        assert_eq!(m.scene, "login_menu");
        assert_eq!(m.distance, 3);
    }

    #[test]
    fn test_ties_resolve_to_first_loaded() {
        let mut classifier = SceneClassifier::new();
        classifier.insert("scene_a", hash_from_bits(&[0]), "scene_a/a.png");
        classifier.insert("scene_b", hash_from_bits(&[1]), "scene_b/a.png");

        // Equidistant (1 bit) from both entries.
        let query = hash_from_bits(&[]);
        let m = classifier.classify_hash(&query).unwrap();
        assert_eq!(m.scene, "scene_a");
        assert_eq!(m.distance, 1);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for (scene, seed) in [("main_menu", 3u32), ("login_menu", 8u32)] {
            let scene_dir = root.join(scene);
            std::fs::create_dir_all(&scene_dir).unwrap();
            scene_image(seed, 96, 96)
                .save(scene_dir.join("ref.png"))
                .unwrap();
        }

        let classifier = SceneClassifier::from_dataset(root).unwrap();
        let query = scene_image(3, 96, 96);
        let first = classifier.classify(&query).unwrap();
        let second = classifier.classify(&query).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.scene, "main_menu");
        assert_eq!(first.distance, 0);
    }

    #[test]
    fn test_load_is_idempotent_for_distances() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for (scene, seed) in [("a", 2u32), ("b", 5u32), ("c", 11u32)] {
            let scene_dir = root.join(scene);
            std::fs::create_dir_all(&scene_dir).unwrap();
            scene_image(seed, 64, 64)
                .save(scene_dir.join("ref.png"))
                .unwrap();
        }

        let first = SceneClassifier::from_dataset(root).unwrap();
        let second = SceneClassifier::from_dataset(root).unwrap();
        for seed in [2u32, 5, 7, 11, 13] {
            let query = scene_image(seed, 64, 64);
            let a = first.classify(&query).unwrap();
            let b = second.classify(&query).unwrap();
            assert_eq!(a.scene, b.scene);
            assert_eq!(a.distance, b.distance);
        }
    }

    #[test]
    fn test_reserved_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let reserved = root.join(RESERVED_DIR);
        std::fs::create_dir_all(&reserved).unwrap();
        scene_image(1, 64, 64).save(reserved.join("btn.png")).unwrap();

        let scene_dir = root.join("main_menu");
        std::fs::create_dir_all(&scene_dir).unwrap();
        scene_image(2, 64, 64)
            .save(scene_dir.join("ref.png"))
            .unwrap();

        let classifier = SceneClassifier::from_dataset(root).unwrap();
        assert_eq!(classifier.len(), 1);
    }

    #[test]
    fn test_empty_dataset_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("empty_scene")).unwrap();
        let err = SceneClassifier::from_dataset(dir.path()).unwrap_err();
        assert!(matches!(err, VisionError::EmptyDataset(_)));
    }

    #[test]
    fn test_undecodable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let scene_dir = dir.path().join("main_menu");
        std::fs::create_dir_all(&scene_dir).unwrap();
        std::fs::write(scene_dir.join("broken.png"), b"not an image").unwrap();
        scene_image(4, 64, 64)
            .save(scene_dir.join("ok.png"))
            .unwrap();
        // Unsupported extension is ignored outright.
        std::fs::write(scene_dir.join("notes.txt"), b"hello").unwrap();

        let classifier = SceneClassifier::from_dataset(dir.path()).unwrap();
        assert_eq!(classifier.len(), 1);
    }
}
