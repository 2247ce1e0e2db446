use dbcluster_operator::crd::{DatabaseBackup, DatabaseCluster};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&DatabaseCluster::crd())?);
    println!("---");
    print!("{}", serde_yaml::to_string(&DatabaseBackup::crd())?);
    Ok(())
}
