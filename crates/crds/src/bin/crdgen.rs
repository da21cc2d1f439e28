//! Prints the ServerDistribution CRD as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/server_distribution.yaml`

use anyhow::Result;
use crds::ServerDistribution;
use kube::CustomResourceExt;

fn main() -> Result<()> {
    let crd = ServerDistribution::crd();
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
