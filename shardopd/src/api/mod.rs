pub mod etcdstore;
pub mod store;

pub use etcdstore::EtcdStore;
pub use store::{ClusterStore, StoreError};
