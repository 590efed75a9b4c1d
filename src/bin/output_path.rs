//! Timestamped output directory helper, the same role the reference driver's
//! `output::path` module plays: every run gets its own directory name built
//! from a prefix and a local timestamp, so repeated runs never collide.

use std::fs;
use std::path::{Path, PathBuf};
use time::format_description;
use time::OffsetDateTime;

pub struct OutputPath {
    dir: PathBuf,
    id: String,
}

impl OutputPath {
    pub fn new(root: &Path, prefix: &str) -> OutputPath {
        let id = create_output_id(prefix);
        OutputPath {
            dir: root.join(&id),
            id,
        }
    }

    pub fn create(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Joins the output directory and id with a new file extension, for
    /// files (like the saved parameter file) that live alongside the
    /// per-iteration diagnostic records.
    pub fn with_extension(&self, ext: &str) -> PathBuf {
        self.dir.join(&self.id).with_extension(ext)
    }
}

fn create_output_id(prefix: &str) -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let format = format_description::parse("[year]-[month]-[day]_[hour][minute][second]")
        .expect("static timestamp format description is valid");
    let stamp = now
        .format(&format)
        .expect("OffsetDateTime is always formattable with this description");
    format!("{}-{}", prefix, stamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_extension_joins_the_id_and_extension() {
        let op = OutputPath::new(Path::new("/tmp"), "zigzag-pic");
        let p = op.with_extension("toml");
        assert!(p.to_str().unwrap().ends_with(".toml"));
        assert!(p.to_str().unwrap().contains(op.id()));
    }

    #[test]
    fn distinct_prefixes_give_distinct_directories() {
        let a = OutputPath::new(Path::new("/tmp"), "electrons-run");
        let b = OutputPath::new(Path::new("/tmp"), "ion-run");
        assert_ne!(a.dir(), b.dir());
    }
}
