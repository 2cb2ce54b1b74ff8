use crate::error::AppError;
use crate::models::classify_types::Category;
use crate::models::fs_types::{CategoryStats, ClearReport, DeleteFailure, StoredImage};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

// Upper bound on fresh tokens tried when a stored name is taken.
const MAX_NAME_ATTEMPTS: usize = 16;

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Keeps only the final path component so a desired name cannot escape the
/// category directory.
fn sanitize_file_name(desired: &str) -> Result<String, AppError> {
    let name = Path::new(desired.trim())
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        return Err(format!("Invalid file name: '{}'", desired).into());
    }
    Ok(name)
}

/// `photo.jpg` -> `photo_1a2b3c4d.jpg`
fn with_unique_token(file_name: &str) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    let token = uuid::Uuid::new_v4().simple().to_string();
    match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, &token[..8], ext.to_string_lossy()),
        None => format!("{}_{}", stem, &token[..8]),
    }
}

fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let written = file.write_all(bytes).and_then(|_| file.sync_all());
    if let Err(e) = written {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

/// Directory-per-category image storage. The filesystem is the only source
/// of truth; nothing is cached between calls.
#[derive(Clone)]
pub struct CategoryStore {
    base_dir: PathBuf,
    // One writer at a time per category directory.
    locks: Arc<Vec<Mutex<()>>>,
}

impl CategoryStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            locks: Arc::new(Category::ALL.iter().map(|_| Mutex::new(())).collect()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.base_dir.join(category.name())
    }

    fn lock(&self, category: Category) -> MutexGuard<'_, ()> {
        let idx = Category::ALL
            .iter()
            .position(|c| *c == category)
            .unwrap_or(0);
        self.locks[idx].lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates the base directory and every category directory.
    pub fn ensure_layout(&self) -> Result<(), AppError> {
        for category in Category::ALL {
            self.ensure_category_dir(category)?;
        }
        Ok(())
    }

    fn ensure_category_dir(&self, category: Category) -> Result<PathBuf, AppError> {
        let dir = self.category_dir(category);
        std::fs::create_dir_all(&dir).map_err(|e| AppError {
            message: format!("Failed to create directory {}: {}", dir.display(), e),
        })?;
        Ok(dir)
    }

    /// Writes `bytes` into the category directory under `desired_name`, or
    /// under a tokenized variant of it when that name is taken. Never
    /// overwrites an existing file.
    pub fn place(
        &self,
        category: Category,
        bytes: &[u8],
        desired_name: &str,
    ) -> Result<PathBuf, AppError> {
        let file_name = sanitize_file_name(desired_name)?;
        let dir = self.ensure_category_dir(category)?;
        let _guard = self.lock(category);

        let mut candidate = dir.join(&file_name);
        for _ in 0..MAX_NAME_ATTEMPTS {
            match write_new(&candidate, bytes) {
                Ok(()) => {
                    debug!("Stored {} as {}", file_name, candidate.display());
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = dir.join(with_unique_token(&file_name));
                }
                Err(e) => {
                    return Err(AppError {
                        message: format!("Failed to write {}: {}", candidate.display(), e),
                    });
                }
            }
        }

        Err(format!(
            "Could not find a free name for {} in {}",
            file_name,
            dir.display()
        )
        .into())
    }

    fn image_paths(&self, category: Category) -> Result<Vec<PathBuf>, AppError> {
        let dir = self.category_dir(category);
        let read_dir = match std::fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError {
                    message: format!("Cannot read directory {}: {}", dir.display(), e),
                })
            }
        };

        let mut paths = Vec::new();
        for entry in read_dir {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let ft = match entry.file_type() {
                Ok(ft) => ft,
                Err(_) => continue,
            };
            if !ft.is_file() {
                continue;
            }
            let path = entry.path();
            if is_image_file(&path) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Rescans every category directory.
    pub fn stats(&self) -> Result<CategoryStats, AppError> {
        let mut counts = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            counts.push((category, self.image_paths(category)?.len()));
        }
        Ok(CategoryStats { counts })
    }

    /// Stored images of one category, sorted by name.
    pub fn list_images(&self, category: Category) -> Result<Vec<StoredImage>, AppError> {
        let mut images: Vec<StoredImage> = self
            .image_paths(category)?
            .into_iter()
            .map(|path| {
                let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                let name = path
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();
                StoredImage { name, path, size }
            })
            .collect();
        images.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(images)
    }

    pub fn remove_image(&self, category: Category, name: &str) -> Result<PathBuf, AppError> {
        let file_name = sanitize_file_name(name)?;
        let path = self.category_dir(category).join(&file_name);
        if !is_image_file(&path) || !path.is_file() {
            return Err(format!("No image named {} in {}", file_name, category).into());
        }
        let _guard = self.lock(category);
        std::fs::remove_file(&path).map_err(|e| AppError {
            message: format!("Failed to delete {}: {}", path.display(), e),
        })?;
        info!("Removed {}", path.display());
        Ok(path)
    }

    /// Deletes every stored image in every category. Keeps going past
    /// individual failures and reports each one.
    pub fn clear_all(&self) -> ClearReport {
        self.clear_all_with(|path| std::fs::remove_file(path))
    }

    pub(crate) fn clear_all_with<F>(&self, mut remove: F) -> ClearReport
    where
        F: FnMut(&Path) -> std::io::Result<()>,
    {
        let mut report = ClearReport::default();
        for category in Category::ALL {
            let paths = match self.image_paths(category) {
                Ok(paths) => paths,
                Err(e) => {
                    warn!("{}", e);
                    report.failures.push(DeleteFailure {
                        path: self.category_dir(category),
                        reason: e.message,
                    });
                    continue;
                }
            };

            let _guard = self.lock(category);
            for path in paths {
                match remove(&path) {
                    Ok(()) => report.removed += 1,
                    Err(e) => {
                        warn!("Failed to delete {}: {}", path.display(), e);
                        report.failures.push(DeleteFailure {
                            path,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
        info!(
            "Cleared {} images ({} failures)",
            report.removed,
            report.failures.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn store() -> (tempfile::TempDir, CategoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CategoryStore::new(dir.path().join("sorted"));
        (dir, store)
    }

    #[test]
    fn recognizes_image_extensions() {
        assert!(is_image_file(Path::new("a.PNG")));
        assert!(is_image_file(Path::new("a.jpeg")));
        assert!(is_image_file(Path::new("dir/a.Bmp")));
        assert!(!is_image_file(Path::new("a.gif")));
        assert!(!is_image_file(Path::new("a.txt")));
        assert!(!is_image_file(Path::new("png")));
    }

    #[test]
    fn places_under_desired_name_first() {
        let (_tmp, store) = store();
        let path = store.place(Category::Food, b"pizza", "lunch.jpg").unwrap();
        assert_eq!(path, store.category_dir(Category::Food).join("lunch.jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), b"pizza");
    }

    #[test]
    fn never_overwrites_on_collision() {
        let (_tmp, store) = store();
        let first = store.place(Category::People, b"first", "me.png").unwrap();
        let second = store.place(Category::People, b"second", "me.png").unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"first");
        assert_eq!(std::fs::read(&second).unwrap(), b"second");

        let name = second.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("me_"));
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), "me_".len() + 8 + ".png".len());
    }

    #[test]
    fn concurrent_placements_keep_every_file() {
        let (_tmp, store) = store();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .place(Category::Vehicles, format!("car {}", i).as_bytes(), "car.jpg")
                        .unwrap()
                })
            })
            .collect();
        let paths: HashSet<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(paths.len(), 8);
        assert_eq!(store.stats().unwrap().count(Category::Vehicles), 8);
    }

    #[test]
    fn strips_directories_from_desired_name() {
        let (_tmp, store) = store();
        let path = store
            .place(Category::Technical, b"x", "../../etc/board.bmp")
            .unwrap();
        assert_eq!(path, store.category_dir(Category::Technical).join("board.bmp"));
        assert!(store.place(Category::Technical, b"x", "..").is_err());
    }

    #[test]
    fn stats_count_only_images() {
        let (_tmp, store) = store();
        store.ensure_layout().unwrap();
        let dir = store.category_dir(Category::Landscapes);
        for name in ["a.png", "b.JPG", "c.jpeg"] {
            std::fs::write(dir.join(name), b"img").unwrap();
        }
        for name in ["notes.txt", "clip.gif"] {
            std::fs::write(dir.join(name), b"other").unwrap();
        }
        std::fs::create_dir(dir.join("nested.png")).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.count(Category::Landscapes), 3);
        assert_eq!(stats.count(Category::Food), 0);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn stats_of_missing_layout_are_zero() {
        let (_tmp, store) = store();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total(), 0);
        assert_eq!(stats.counts.len(), Category::ALL.len());
    }

    #[test]
    fn lists_sorted_images() {
        let (_tmp, store) = store();
        store.place(Category::Food, b"1", "b.png").unwrap();
        store.place(Category::Food, b"22", "A.png").unwrap();
        let names: Vec<String> = store
            .list_images(Category::Food)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["A.png", "b.png"]);
    }

    #[test]
    fn removes_single_image() {
        let (_tmp, store) = store();
        store.place(Category::Food, b"1", "soup.png").unwrap();
        store.remove_image(Category::Food, "soup.png").unwrap();
        assert_eq!(store.stats().unwrap().count(Category::Food), 0);
        assert!(store.remove_image(Category::Food, "soup.png").is_err());
    }

    #[test]
    fn clear_is_best_effort() {
        let (_tmp, store) = store();
        store.place(Category::Food, b"1", "a.png").unwrap();
        store.place(Category::Food, b"2", "b.png").unwrap();
        let stuck = store.place(Category::People, b"3", "stuck.jpg").unwrap();
        store.place(Category::Vehicles, b"4", "d.bmp").unwrap();
        std::fs::write(store.category_dir(Category::Food).join("keep.txt"), b"t").unwrap();

        let report = store.clear_all_with(|path| {
            if path == stuck.as_path() {
                Err(std::io::Error::new(ErrorKind::PermissionDenied, "denied"))
            } else {
                std::fs::remove_file(path)
            }
        });

        assert_eq!(report.removed, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, stuck);
        assert!(stuck.exists());
        assert!(store.category_dir(Category::Food).join("keep.txt").exists());
        assert_eq!(store.stats().unwrap().total(), 1);
    }
}
