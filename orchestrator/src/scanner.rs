use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};
use worker::Task;

use crate::{OrchestratorError, Result};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const NAME_SEPARATOR: char = '-';

/// The classes found under a dataset root and every image to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDataset {
    /// Display names, index = label index.
    pub class_names: Vec<String>,
    /// Every accepted image, grouped by class in class order.
    pub tasks: Vec<Task>,
}

/// Lists the class subdirectories of `root` and the images inside each of them.
///
/// Subdirectories are visited in lexicographic order of their names, that order defines the
/// label indices. Files whose extension is not jpg, jpeg or png (any case) are ignored, as is
/// anything nested deeper than one level.
///
/// # Arguments
/// * `root` - The dataset root.
///
/// # Returns
/// The scanned dataset or `DatasetNotFound` if `root` is not a directory.
pub fn scan<P: AsRef<Path>>(root: P) -> Result<ScannedDataset> {
    let root = root.as_ref();

    if !root.is_dir() {
        return Err(OrchestratorError::DatasetNotFound(root.to_path_buf()));
    }

    let class_dirs = sorted_entries(root, |path| path.is_dir())?;

    let mut class_names = Vec::with_capacity(class_dirs.len());
    let mut tasks = Vec::new();

    for (label, dir) in class_dirs.iter().enumerate() {
        let dir_name = dir.file_name().unwrap_or_default().to_string_lossy();
        let name = class_name(&dir_name);

        let images = sorted_entries(dir, |path| path.is_file() && is_image(path))?;
        debug!(label = label, images = images.len(); "class {name} from {dir_name}");

        tasks.extend(images.into_iter().map(|path| Task::new(path, label)));
        class_names.push(name);
    }

    info!(classes = class_names.len(), tasks = tasks.len(); "dataset scanned");

    Ok(ScannedDataset { class_names, tasks })
}

/// Derives the display name of a class directory: everything after the first `-`, or the
/// whole name when there is no `-` or nothing follows it.
pub fn class_name(dir_name: &str) -> String {
    match dir_name.split_once(NAME_SEPARATOR) {
        Some((_, rest)) if !rest.is_empty() => rest.to_string(),
        _ => dir_name.to_string(),
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}

fn sorted_entries<F>(dir: &Path, keep: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if keep(&path) {
            entries.push(path);
        }
    }

    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn class_name_splits_on_first_separator() {
        assert_eq!(class_name("n02085620-Chihuahua"), "Chihuahua");
        assert_eq!(class_name("n02-golden-retriever"), "golden-retriever");
        assert_eq!(class_name("beagle"), "beagle");
        assert_eq!(class_name("trailing-"), "trailing-");
    }

    #[test]
    fn scan_orders_classes_and_filters_extensions() {
        let root = tempfile::tempdir().unwrap();
        let pug = root.path().join("n02-pug");
        let beagle = root.path().join("n01-beagle");
        fs::create_dir(&pug).unwrap();
        fs::create_dir(&beagle).unwrap();

        touch(&pug.join("b.PNG"));
        touch(&pug.join("a.jpeg"));
        touch(&pug.join("notes.txt"));
        touch(&beagle.join("x.JpG"));
        touch(&beagle.join("y.gif"));
        touch(&root.path().join("stray.png"));
        fs::create_dir(beagle.join("nested.png")).unwrap();

        let scanned = scan(root.path()).unwrap();

        assert_eq!(scanned.class_names, ["beagle", "pug"]);
        assert_eq!(
            scanned.tasks,
            vec![
                Task::new(beagle.join("x.JpG"), 0),
                Task::new(pug.join("a.jpeg"), 1),
                Task::new(pug.join("b.PNG"), 1),
            ]
        );
    }

    #[test]
    fn empty_class_keeps_its_index() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("a-empty")).unwrap();
        fs::create_dir(root.path().join("b-full")).unwrap();
        touch(&root.path().join("b-full").join("1.png"));

        let scanned = scan(root.path()).unwrap();

        assert_eq!(scanned.class_names, ["empty", "full"]);
        assert_eq!(scanned.tasks.len(), 1);
        assert_eq!(scanned.tasks[0].label, 1);
    }

    #[test]
    fn missing_root_is_dataset_not_found() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");

        let err = scan(&missing).unwrap_err();
        assert!(matches!(err, OrchestratorError::DatasetNotFound(p) if p == missing));
    }
}
