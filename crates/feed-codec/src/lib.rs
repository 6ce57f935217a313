pub mod encode;

pub mod pb {
    include!(concat!(env!("OUT_DIR"), "/protobuf/transit_realtime.rs"));
}

pub use encode::encode_feed;
