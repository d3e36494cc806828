//! Prints the Kairos provider CRDs as a multi-document YAML stream.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/kairos.yaml`

use crds::{KairosConfig, KairosConfigTemplate, KairosControlPlane, KairosControlPlaneTemplate};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [
        KairosConfig::crd(),
        KairosConfigTemplate::crd(),
        KairosControlPlane::crd(),
        KairosControlPlaneTemplate::crd(),
    ];

    for crd in &crds {
        print!("---\n{}", serde_yaml::to_string(crd)?);
    }

    Ok(())
}
