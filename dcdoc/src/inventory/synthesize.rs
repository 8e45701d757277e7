use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::model::{Format, Group, PolicyRule};
use crate::naming::clean_up_name;

/// Objects that have an OMA-URI form.
pub trait OmaUriSource: Sized {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    /// This object as its own OMA-URI file reads back, without a path.
    fn as_oma_uri(&self) -> Self;
    fn set_path(&mut self, path: Option<PathBuf>);
    fn to_xml(&self, indent: &str) -> String;
}

impl OmaUriSource for Group {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn as_oma_uri(&self) -> Self {
        if self.origin == Format::Mac {
            let (windows, notes) = self.to_windows(Format::OmaUri);
            for note in &notes {
                warn!(event = "Synthesize", id = %self.id, note = %note, "dropped from oma-uri group");
            }
            return windows;
        }
        let mut copy = self.clone();
        copy.format = Format::OmaUri;
        copy.path = None;
        copy
    }

    fn set_path(&mut self, path: Option<PathBuf>) {
        self.path = path;
    }

    fn to_xml(&self, indent: &str) -> String {
        Group::to_xml(self, indent)
    }
}

impl OmaUriSource for PolicyRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn as_oma_uri(&self) -> Self {
        let mut copy = self.clone();
        copy.format = Format::OmaUri;
        copy.path = None;
        copy
    }

    fn set_path(&mut self, path: Option<PathBuf>) {
        self.path = path;
    }

    fn to_xml(&self, indent: &str) -> String {
        PolicyRule::to_xml(self, indent)
    }
}

/// File an OMA-URI object is written to under `dir`.
pub fn oma_uri_file(dir: &Path, name: &str, id: &str) -> PathBuf {
    dir.join(format!("{}_{id}.xml", clean_up_name(name, "_")))
}

/// The OMA-URI form of `object` (see [`OmaUriSource::as_oma_uri`]).
///
/// With `dir`, the copy's XML is written to [`oma_uri_file`] and the copy
/// points at it; parsing that file gives back an equal object. A failed
/// write is logged and leaves the copy without a path.
pub fn missing_oma_uri<T: OmaUriSource>(object: &T, dir: Option<&Path>) -> T {
    warn!(event = "Synthesize", id = %object.id(), "missing oma-uri");
    let mut copy = object.as_oma_uri();

    if let Some(dir) = dir {
        let path = oma_uri_file(dir, copy.name(), copy.id());
        match fs::write(&path, copy.to_xml("")) {
            Ok(()) => {
                info!(event = "Synthesize", path = %path.display(), "generated oma-uri file");
                copy.set_path(Some(path));
            }
            Err(err) => {
                error!(event = "Synthesize", path = %path.display(), error = %err, "failed to write oma-uri file");
            }
        }
    }
    copy
}
