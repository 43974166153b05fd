use crate::models::BackendKind;
use std::path::{Path, PathBuf};

/// Marker files checked in each directory, in priority order.
const MARKERS: [(&str, BackendKind); 4] = [
    ("pnpm-lock.yaml", BackendKind::Pnpm),
    ("pnpm-workspace.yaml", BackendKind::Pnpm),
    ("yarn.lock", BackendKind::Yarn),
    (".yarnrc.yml", BackendKind::Yarn),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Found { kind: BackendKind, marker: PathBuf },
    Unsupported,
}

impl Detection {
    pub fn kind(&self) -> Option<BackendKind> {
        match self {
            Detection::Found { kind, .. } => Some(*kind),
            Detection::Unsupported => None,
        }
    }
}

/// Walks from `start` up to the filesystem root; the nearest marker wins.
pub fn detect_backend(start: &Path) -> Detection {
    for dir in start.ancestors() {
        for (file, kind) in MARKERS {
            let marker = dir.join(file);
            if marker.is_file() {
                tracing::debug!("Detected {} from {:?}", kind, marker);
                return Detection::Found { kind, marker };
            }
        }
    }
    Detection::Unsupported
}
