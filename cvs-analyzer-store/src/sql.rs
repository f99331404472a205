//! Helpers for types that don't natively implement `ToSql`.

use std::{
    ffi::OsStr,
    os::unix::prelude::OsStrExt,
    time::{SystemTime, UNIX_EPOCH},
};

use rusqlite::ToSql;

pub(crate) fn os_str(os: &OsStr) -> impl ToSql + '_ {
    os.as_bytes()
}

pub(crate) fn time(time: &SystemTime) -> impl ToSql {
    time.duration_since(UNIX_EPOCH).unwrap().as_secs()
}

pub(crate) fn expansion_mode(mode: Option<cvs_analyzer_core::file::ExpansionMode>) -> Option<&'static str> {
    use cvs_analyzer_core::file::ExpansionMode::*;

    mode.map(|mode| match mode {
        Default => "default",
        Binary => "binary",
        Kv => "kv",
        KvAndLocker => "kvl",
        Oldlog => "oldlog",
        Value => "value",
    })
}
