//! Writing and reading artifact documents

use super::{Artifact, DatasetError, DatasetResult, NearByRow, NearByStation, SeparateArtifacts};
use crate::models::{Clinic, School};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File names of the separate layout, in document order
pub const SEPARATE_FILES: [&str; 5] = [
    "clinics.json",
    "nearByMRTs.json",
    "nearByClinics.json",
    "nearBySchools.json",
    "schools.json",
];

/// Written next to the separate documents when the run was incomplete
pub const UNRESOLVED_FILE: &str = "unresolved.json";

/// Present in a separate-layout directory while its documents are being replaced
pub const PARTIAL_MARKER: &str = ".goodtooth-partial";

impl Artifact {
    /// Serialize into `(file name, bytes)` pairs.
    ///
    /// Output is compact and key order is fixed, so the same inputs always
    /// give byte-identical documents.
    pub fn documents(&self, inline_file: &str) -> DatasetResult<Vec<(String, Vec<u8>)>> {
        match self {
            Artifact::Inline(dataset) => Ok(vec![(inline_file.to_string(), to_bytes(dataset)?)]),
            Artifact::Separate(s) => {
                let mut docs = vec![
                    (SEPARATE_FILES[0].to_string(), to_bytes(&s.clinics)?),
                    (SEPARATE_FILES[1].to_string(), to_bytes(&s.near_by_mrts)?),
                    (SEPARATE_FILES[2].to_string(), to_bytes(&s.near_by_clinics)?),
                    (SEPARATE_FILES[3].to_string(), to_bytes(&s.near_by_schools)?),
                    (SEPARATE_FILES[4].to_string(), to_bytes(&s.schools)?),
                ];
                if !s.unresolved.is_empty() {
                    docs.push((UNRESOLVED_FILE.to_string(), to_bytes(&s.unresolved)?));
                }
                Ok(docs)
            }
        }
    }
}

impl Artifact {
    /// Write the artifact into `dir`.
    ///
    /// The separate layout is bracketed by [`PARTIAL_MARKER`]: it is created
    /// before the first document and removed after the last, so an
    /// interrupted write is never read back as a complete set. An
    /// `unresolved.json` left by an earlier run is removed when this run has
    /// nothing to report.
    pub fn write(&self, dir: &Path, inline_file: &str) -> DatasetResult<Vec<PathBuf>> {
        let docs = self.documents(inline_file)?;
        let Artifact::Separate(separate) = self else {
            return write_documents(dir, &docs);
        };

        fs::create_dir_all(dir).map_err(|source| DatasetError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
        let marker = dir.join(PARTIAL_MARKER);
        write_atomic(&marker, &[])?;

        let written = write_documents(dir, &docs)?;
        if separate.unresolved.is_empty() {
            remove_if_present(&dir.join(UNRESOLVED_FILE))?;
        }
        remove_if_present(&marker)?;
        Ok(written)
    }
}

fn remove_if_present(path: &Path) -> DatasetResult<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(DatasetError::Write {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn to_bytes<T: Serialize + ?Sized>(value: &T) -> DatasetResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Write every document into `dir`, creating it if needed.
///
/// Each file goes to a temp sibling first and is then renamed into place,
/// so a reader never sees a half-written document.
pub fn write_documents(dir: &Path, docs: &[(String, Vec<u8>)]) -> DatasetResult<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|source| DatasetError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(docs.len());
    for (name, bytes) in docs {
        let path = dir.join(name);
        write_atomic(&path, bytes)?;
        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        written.push(path);
    }
    info!("Wrote {} documents to {}", written.len(), dir.display());
    Ok(written)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> DatasetResult<()> {
    let tmp = path.with_extension("json.tmp");
    let io_err = |source: std::io::Error| DatasetError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::create(&tmp).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}

/// Read a separate-layout artifact back from `dir`.
///
/// `nearBySchools.json`, `schools.json` and `unresolved.json` may be absent.
/// A directory still carrying [`PARTIAL_MARKER`] is rejected.
pub fn read_separate(dir: &Path) -> DatasetResult<SeparateArtifacts> {
    if dir.join(PARTIAL_MARKER).exists() {
        return Err(DatasetError::Incomplete {
            path: dir.to_path_buf(),
        });
    }
    let clinics: Vec<Clinic> = read_json(&dir.join(SEPARATE_FILES[0]))?;
    let near_by_mrts: Vec<NearByStation> = read_json(&dir.join(SEPARATE_FILES[1]))?;
    let near_by_clinics: Vec<NearByRow> = read_json(&dir.join(SEPARATE_FILES[2]))?;
    let near_by_schools: Vec<NearByRow> = read_optional(&dir.join(SEPARATE_FILES[3]))?;
    let schools: Vec<School> = read_optional(&dir.join(SEPARATE_FILES[4]))?;
    let unresolved = read_optional(&dir.join(UNRESOLVED_FILE))?;

    debug!("Read {} clinics from {}", clinics.len(), dir.display());
    Ok(SeparateArtifacts {
        clinics,
        near_by_mrts,
        near_by_clinics,
        near_by_schools,
        schools,
        unresolved,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> DatasetResult<T> {
    let file = File::open(path).map_err(|source| DatasetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| DatasetError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn read_optional<T: DeserializeOwned + Default>(path: &Path) -> DatasetResult<T> {
    if path.exists() {
        read_json(path)
    } else {
        Ok(T::default())
    }
}
