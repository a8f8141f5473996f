use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a running service instance, reported by `/info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub instance_id: Uuid,
}

impl ServiceInfo {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            instance_id: Uuid::new_v4(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_info_carries_name_and_version() {
        let info = ServiceInfo::new("jobfeed-ingest");
        assert_eq!(info.name, "jobfeed-ingest");
        assert!(!info.version.is_empty());
    }

    #[test]
    fn service_info_serializes() {
        let info = ServiceInfo::new("jobfeed-ingest");
        let json = serde_json::to_value(&info).expect("should serialize");
        assert_eq!(json["name"], "jobfeed-ingest");
        assert!(json["instance_id"].is_string());
    }
}
