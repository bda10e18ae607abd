//! Fabric protocol buffers, generated by `build.rs`
//!
//! Only the messages the gateway client needs. Package layout mirrors
//! fabric-protos so cross-package references resolve as siblings.

pub mod common {
    include!(concat!(env!("OUT_DIR"), "/common.rs"));
}

pub mod msp {
    include!(concat!(env!("OUT_DIR"), "/msp.rs"));
}

pub mod protos {
    include!(concat!(env!("OUT_DIR"), "/protos.rs"));
}

pub mod gateway {
    include!(concat!(env!("OUT_DIR"), "/gateway.rs"));
}

pub mod google {
    pub mod rpc {
        include!(concat!(env!("OUT_DIR"), "/google.rpc.rs"));
    }
}
