use hostns_core::frame::{self, ExecutionResult};
use hostns_core::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Listing {
    entries: Vec<String>,
    total: usize,
}

/// Split an encoded frame into uneven chunks, the way a pipe may deliver it
fn chunked(frame: &[u8], sizes: &[usize]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut rest = frame;
    for size in sizes.iter().cycle() {
        if rest.is_empty() {
            break;
        }
        let n = (*size).min(rest.len());
        out.push(rest[..n].to_vec());
        rest = &rest[n..];
    }
    out
}

#[test]
fn test_frame_over_chunked_stream() {
    let listing = Listing {
        entries: vec!["a".to_string(), "b".to_string()],
        total: 2,
    };
    let encoded = ExecutionResult::Success(listing.clone()).encode();

    let mut chunks = chunked(&encoded, &[1, 3, 7]).into_iter();
    let frame = frame::read_frame(|buf| {
        let Some(chunk) = chunks.next() else {
            return Ok(0);
        };
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    })
    .unwrap();

    let value = ExecutionResult::<Listing>::decode(&frame)
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(value, listing);
}

#[test]
fn test_from_result_failure_round_trip() {
    let result: std::result::Result<u32, Error> = Err(Error::Namespace {
        message: "setns mnt failed".to_string(),
    });
    let encoded = ExecutionResult::from_result(result).encode();
    assert!(encoded.starts_with(frame::ERR_TAG));

    let err = ExecutionResult::<u32>::decode(&encoded)
        .unwrap()
        .into_result()
        .unwrap_err();
    assert_eq!(err.to_string(), "Namespace error: setns mnt failed");
}

#[test]
fn test_read_error_propagates() {
    let err = frame::read_frame(|_| {
        Err(Error::Namespace {
            message: "read failed".to_string(),
        })
    })
    .unwrap_err();
    assert!(matches!(err, Error::Namespace { .. }));
}

#[test]
fn test_process_id_display() {
    assert_eq!(ProcessId::from_raw(4242).to_string(), "4242");
    assert_eq!(ProcessId::INIT.as_raw(), 1);
}
