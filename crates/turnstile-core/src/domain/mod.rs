//! Domain types - buckets, policies, decisions and block records.

mod block;
mod bucket;
mod decision;
mod policy;

pub use block::{AddressStatus, BlockRecord, ViolationRecord};
pub use bucket::{ANONYMOUS, Bucket, BucketKey};
pub use decision::Decision;
pub use policy::{DEFAULT_POLICY, Policy, PolicyTable};
