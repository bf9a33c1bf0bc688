//! Protobuf messages generated from `proto/laminar.proto`.

#![allow(missing_docs)]

include!(concat!(env!("OUT_DIR"), "/laminar.rs"));
