//! ServiceTarget - one unit of deploy work.

use serde::{Deserialize, Serialize};

use super::image::ImageTag;

/// A service to roll onto a new image tag.
///
/// `cluster` and `family` default to the service name; this matches the
/// naming convention where cluster, service and task family share one name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTarget {
    pub service: String,
    pub cluster: String,
    pub family: String,
    pub tag: ImageTag,
}

impl ServiceTarget {
    /// Target with cluster and family named after the service.
    pub fn new(service: impl Into<String>, tag: ImageTag) -> Self {
        let service = service.into();
        Self {
            cluster: service.clone(),
            family: service.clone(),
            service,
            tag,
        }
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = family.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_and_family_default_to_service_name() {
        let target = ServiceTarget::new("parrot-dev-backend", ImageTag::new("1").unwrap());
        assert_eq!(target.cluster, "parrot-dev-backend");
        assert_eq!(target.family, "parrot-dev-backend");
    }

    #[test]
    fn overrides_apply() {
        let target = ServiceTarget::new("backend", ImageTag::new("1").unwrap())
            .with_cluster("parrot-dev")
            .with_family("backend-td");
        assert_eq!(target.service, "backend");
        assert_eq!(target.cluster, "parrot-dev");
        assert_eq!(target.family, "backend-td");
    }
}
