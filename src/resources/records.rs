use serde::{Deserialize, Serialize};

/// One line of `image ls --format "{{json .}}"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageRecord {
    #[serde(rename = "ID")]
    pub id: String,
    pub repository: String,
    pub tag: String,
    pub size: String,
    pub created_since: String,
}

impl ImageRecord {
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// One line of `container ls --format "{{json .}}"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerRecord {
    #[serde(rename = "ID")]
    pub id: String,
    pub image: String,
    pub status: String,
    pub size: String,
    pub names: String,
}

/// A pod, flattened from the platform's nested pod object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPod")]
pub struct PodRecord {
    pub name: String,
    pub phase: String,
    pub creation_timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PodList {
    pub items: Vec<PodRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPod {
    metadata: RawPodMetadata,
    status: RawPodStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawPodMetadata {
    name: String,
    creation_timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPodStatus {
    phase: String,
}

impl From<RawPod> for PodRecord {
    fn from(raw: RawPod) -> Self {
        Self {
            name: raw.metadata.name,
            phase: raw.status.phase,
            creation_timestamp: raw.metadata.creation_timestamp,
        }
    }
}
