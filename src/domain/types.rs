//! Shared domain enumerations.

use serde::{Deserialize, Serialize};

/// Background job kinds, also used as apalis storage namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    DrainViews,
    RefreshTrending,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::DrainViews => "drain_views",
            JobType::RefreshTrending => "refresh_trending",
        }
    }
}

impl TryFrom<&str> for JobType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "drain_views" => Ok(JobType::DrainViews),
            "refresh_trending" => Ok(JobType::RefreshTrending),
            _ => Err(()),
        }
    }
}

/// Kind of structural neighbour a thread links to in the graph store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborKind {
    Tag,
    Category,
}

impl NeighborKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NeighborKind::Tag => "tag",
            NeighborKind::Category => "category",
        }
    }
}

impl TryFrom<&str> for NeighborKind {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "tag" => Ok(NeighborKind::Tag),
            "category" => Ok(NeighborKind::Category),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_round_trips_through_namespace() {
        for job_type in [JobType::DrainViews, JobType::RefreshTrending] {
            assert_eq!(JobType::try_from(job_type.as_str()), Ok(job_type));
        }
        assert!(JobType::try_from("render_post").is_err());
    }

    #[test]
    fn neighbor_kind_parses_known_labels() {
        assert_eq!(NeighborKind::try_from("tag"), Ok(NeighborKind::Tag));
        assert_eq!(NeighborKind::try_from("category"), Ok(NeighborKind::Category));
        assert!(NeighborKind::try_from("user").is_err());
    }
}
