//! Pod image listing.
//!
//! Parses the output of [`crate::command::IMAGE_JSONPATH`]: one line per pod,
//! `name<TAB>image|imageID image|imageID ...`.

use serde::{Deserialize, Serialize};

/// One container's image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerImage {
    /// Image reference as written in the pod spec.
    pub image: String,
    /// Resolved image ID reported by the runtime.
    pub image_id: String,
}

impl ContainerImage {
    /// The `sha256:...` digest, if the image ID carries one.
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        self.image_id.rsplit_once('@').map(|(_, digest)| digest)
    }
}

/// The images of one pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodImages {
    /// Pod name.
    pub pod: String,
    /// Containers in status order.
    pub containers: Vec<ContainerImage>,
}

/// Parses the image listing. Lines without a pod name are skipped; a
/// container without a reported image ID keeps an empty one.
#[must_use]
pub fn parse_image_listing(raw: &str) -> Vec<PodImages> {
    raw.lines()
        .filter_map(|line| {
            let line = line.trim_end();
            let (pod, rest) = line.split_once('\t').unwrap_or((line, ""));
            let pod = pod.trim();
            if pod.is_empty() {
                return None;
            }
            let containers = rest
                .split_whitespace()
                .filter_map(|entry| {
                    let (image, image_id) = entry.split_once('|').unwrap_or((entry, ""));
                    (!image.is_empty()).then(|| ContainerImage {
                        image: image.to_string(),
                        image_id: image_id.to_string(),
                    })
                })
                .collect();
            Some(PodImages {
                pod: pod.to_string(),
                containers,
            })
        })
        .collect()
}
