// Wire-level bindings for osquery's Thrift extension API.
//
// Users of osquery-sdk are not allowed to touch the osquery API directly;
// everything in here stays crate-private behind the client and server types.
pub(crate) mod osquery;

pub(crate) use osquery::*;
