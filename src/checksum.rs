//! Checksum algorithms known to the editor and their default parameters.

use serde_json::{Map, Value as Json};

/// Algorithm new `Checksum` fields start with.
pub const DEFAULT_ALGORITHM: &str = "crc16-modbus";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Text(&'static str),
    Bool(bool),
}

#[derive(Debug, Clone, Copy)]
pub struct ChecksumAlgorithm {
    pub name: &'static str,
    pub label: &'static str,
    pub params: &'static [(&'static str, ParamDefault)],
}

use ParamDefault::{Bool, Text};

pub const ALGORITHMS: &[ChecksumAlgorithm] = &[
    ChecksumAlgorithm {
        name: "crc16-modbus",
        label: "CRC16-MODBUS",
        params: &[
            ("polynomial", Text("0x8005")),
            ("initialValue", Text("0xFFFF")),
            ("finalXorValue", Text("0x0000")),
            ("inputReflected", Bool(true)),
            ("outputReflected", Bool(true)),
        ],
    },
    ChecksumAlgorithm {
        name: "crc32",
        label: "CRC32",
        params: &[
            ("polynomial", Text("0x04C11DB7")),
            ("initialValue", Text("0xFFFFFFFF")),
            ("finalXorValue", Text("0xFFFFFFFF")),
            ("inputReflected", Bool(true)),
            ("outputReflected", Bool(true)),
        ],
    },
    ChecksumAlgorithm {
        name: "crc16-ccitt",
        label: "CRC16-CCITT",
        params: &[
            ("polynomial", Text("0x1021")),
            ("initialValue", Text("0xFFFF")),
            ("finalXorValue", Text("0x0000")),
            ("inputReflected", Bool(false)),
            ("outputReflected", Bool(false)),
        ],
    },
    ChecksumAlgorithm {
        name: "crc16-xmodem",
        label: "CRC16-XMODEM",
        params: &[
            ("polynomial", Text("0x1021")),
            ("initialValue", Text("0x0000")),
            ("finalXorValue", Text("0x0000")),
            ("inputReflected", Bool(false)),
            ("outputReflected", Bool(false)),
        ],
    },
    ChecksumAlgorithm {
        name: "sum8",
        label: "SUM8",
        params: &[("initialValue", Text("0x00")), ("complement", Text("none"))],
    },
    ChecksumAlgorithm {
        name: "sum16",
        label: "SUM16",
        params: &[
            ("initialValue", Text("0x0000")),
            ("complement", Text("none")),
            ("byteOrder", Text("big")),
        ],
    },
    ChecksumAlgorithm {
        name: "xor",
        label: "XOR",
        params: &[("initialValue", Text("0x00"))],
    },
    ChecksumAlgorithm {
        name: "custom",
        label: "Custom",
        params: &[("customExpression", Text("")), ("customDescription", Text(""))],
    },
];

pub fn find(name: &str) -> Option<&'static ChecksumAlgorithm> {
    ALGORITHMS.iter().find(|a| a.name == name)
}

/// Default `parameters` object for `name`; empty for unknown algorithms.
pub fn default_parameters(name: &str) -> Map<String, Json> {
    let mut out = Map::new();
    if let Some(alg) = find(name) {
        for (key, default) in alg.params {
            let v = match default {
                Text(s) => Json::String(s.to_string()),
                Bool(b) => Json::Bool(*b),
            };
            out.insert(key.to_string(), v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modbus_defaults() {
        let p = default_parameters(DEFAULT_ALGORITHM);
        assert_eq!(p.get("polynomial").and_then(Json::as_str), Some("0x8005"));
        assert_eq!(p.get("inputReflected").and_then(Json::as_bool), Some(true));
        assert_eq!(p.len(), 5);
    }

    #[test]
    fn unknown_algorithm_has_no_parameters() {
        assert!(default_parameters("md5").is_empty());
        assert!(find("sum16").is_some());
    }
}
