// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn line_ends_are_normalised_to_crlf() {
    assert_eq!(normalise_line_ends(b"one\ntwo\n"), b"one\r\ntwo\r\n".to_vec());
    assert_eq!(normalise_line_ends(b"no newline"), b"no newline".to_vec());
    assert_eq!(normalise_line_ends(b""), Vec::<u8>::new());
}

#[test]
fn escape_sequences_survive_normalisation() {
    let rendered = b"\x1b[31mRED\x1b[0m\n";
    assert_eq!(normalise_line_ends(rendered), b"\x1b[31mRED\x1b[0m\r\n".to_vec());
}
