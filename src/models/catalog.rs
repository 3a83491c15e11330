use crate::error::{HubError, Result};

use super::manifest::ModelRecord;

/// Query layer over a fetched manifest.
pub struct ModelCatalog;

impl ModelCatalog {
    /// Records matching `name` (case-insensitive) and carrying every tag in
    /// `tags` (case-sensitive), in manifest order.
    #[must_use]
    pub fn list<'a, S: AsRef<str>>(
        records: &'a [ModelRecord],
        name: Option<&str>,
        tags: &[S],
    ) -> Vec<&'a ModelRecord> {
        records
            .iter()
            .filter(|record| name.map_or(true, |name| record.matches_name(name)))
            .filter(|record| tags.iter().all(|tag| record.tags.contains(tag.as_ref())))
            .collect()
    }

    /// Picks the record for `name`. A given `opset` must match exactly;
    /// otherwise the highest opset wins, earliest manifest entry on ties.
    pub fn resolve<'a>(
        records: &'a [ModelRecord],
        name: &str,
        opset: Option<i64>,
    ) -> Result<&'a ModelRecord> {
        let opset = validate_opset(opset)?;
        let mut candidates = records.iter().filter(|record| record.matches_name(name));

        let selected = match opset {
            Some(opset) => candidates.find(|record| record.opset_version == opset),
            None => candidates.fold(None, |best: Option<&ModelRecord>, record| match best {
                Some(best) if best.opset_version >= record.opset_version => Some(best),
                _ => Some(record),
            }),
        };

        selected.ok_or_else(|| {
            tracing::debug!(
                name,
                requested = ?opset,
                available = ?Self::opsets(records, name),
                "No matching manifest record"
            );
            HubError::NotFound {
                name: name.to_string(),
                opset,
            }
        })
    }

    pub fn get_info<'a>(
        records: &'a [ModelRecord],
        name: &str,
        opset: Option<i64>,
    ) -> Result<&'a ModelRecord> {
        Self::resolve(records, name, opset)
    }

    /// Distinct opsets published for `name`, ascending.
    #[must_use]
    pub fn opsets(records: &[ModelRecord], name: &str) -> Vec<u32> {
        let mut opsets: Vec<u32> = records
            .iter()
            .filter(|record| record.matches_name(name))
            .map(|record| record.opset_version)
            .collect();
        opsets.sort_unstable();
        opsets.dedup();
        opsets
    }
}

pub(crate) fn validate_opset(opset: Option<i64>) -> Result<Option<u32>> {
    match opset {
        None => Ok(None),
        Some(value) if value < 0 => Err(HubError::InvalidArgument(format!(
            "opset must be a non-negative integer, got {value}"
        ))),
        Some(value) => u32::try_from(value).map(Some).map_err(|_| {
            HubError::InvalidArgument(format!("opset {value} is out of range"))
        }),
    }
}
