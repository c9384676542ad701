//! Record identity: ids, timestamps, the identity slot and record handles.

mod embed;
mod id;
mod identity;
mod rec;
pub(crate) mod record;
mod timestamp;

pub use embed::{check_record, embed, unmarshal};
pub use id::ModelId;
pub use identity::{Identity, Timestamps};
pub use rec::Rec;
pub use record::{decode_envelope, encode_envelope, short_type_name, Model, Record, Slot};
pub use timestamp::Timestamp;
