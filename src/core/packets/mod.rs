pub mod store;
pub mod types;

pub use store::PacketStore;
pub use types::{
    AckRecord, FeeInfo, PacketDelayRecord, PacketKey, RecvRecord, SendRecord,
};
