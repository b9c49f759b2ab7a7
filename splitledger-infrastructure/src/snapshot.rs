use splitledger_application::{LedgerSnapshot, SnapshotLoadError, SnapshotSource};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

/// Reads a whole snapshot from a JSON document on disk.
///
/// The file is re-read on every `load`, so an edited file is picked up by the
/// next pipeline run.
pub struct JsonSnapshotSource {
    path: PathBuf,
}

impl JsonSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parse(document: &str) -> Result<LedgerSnapshot, SnapshotLoadError> {
        let snapshot: LedgerSnapshot = serde_json::from_str(document)
            .map_err(|err| SnapshotLoadError::Malformed(err.to_string()))?;
        check_unique_ids(&snapshot)?;
        Ok(snapshot)
    }
}

impl SnapshotSource for JsonSnapshotSource {
    fn load(&self) -> Result<LedgerSnapshot, SnapshotLoadError> {
        let document = std::fs::read_to_string(&self.path).map_err(|err| {
            SnapshotLoadError::Unavailable(format!("{}: {err}", self.path.display()))
        })?;
        let snapshot = Self::parse(&document)?;

        tracing::debug!(
            path = %self.path.display(),
            participants = snapshot.participants.len(),
            groups = snapshot.groups.len(),
            expenses = snapshot.expenses.len(),
            settlements = snapshot.settlements.len(),
            "Snapshot loaded"
        );

        Ok(snapshot)
    }
}

fn check_unique_ids(snapshot: &LedgerSnapshot) -> Result<(), SnapshotLoadError> {
    fn first_duplicate<T: Ord + Copy>(ids: impl IntoIterator<Item = T>) -> Option<T> {
        let mut seen = BTreeSet::new();
        ids.into_iter().find(|id| !seen.insert(*id))
    }

    if let Some(id) = first_duplicate(snapshot.participants.iter().map(|p| p.id)) {
        return Err(SnapshotLoadError::Malformed(format!(
            "participant {id} is listed twice"
        )));
    }
    if let Some(id) = first_duplicate(snapshot.groups.iter().map(|group| group.id)) {
        return Err(SnapshotLoadError::Malformed(format!(
            "group {id} is listed twice"
        )));
    }
    if let Some(id) = first_duplicate(snapshot.expenses.iter().map(|expense| expense.id)) {
        return Err(SnapshotLoadError::Malformed(format!(
            "expense {} is listed twice",
            id.0
        )));
    }
    if let Some(id) = first_duplicate(snapshot.settlements.iter().map(|record| record.id)) {
        return Err(SnapshotLoadError::Malformed(format!(
            "settlement {} is listed twice",
            id.0
        )));
    }

    Ok(())
}
