
use crate::{
    frame::{decode, SCREEN_HEIGHT, SCREEN_WIDTH},
    hex_parser::decode_from_string,
};

use manifest_dir_macros::exist_relative_path;

const SINGLE_FRAME: &str = include_str!(exist_relative_path!("resources/test/single_frame_example.txt"));

#[test]
fn decode_single_frame() {
    let frames = decode_from_string(SINGLE_FRAME).unwrap();
    assert_eq!(frames.len(), 1);

    // Captured screen is an empty box drawn along the edges
    let grid = decode(&frames[0]).unwrap();
    assert_eq!(grid.count_set(), 2 * SCREEN_WIDTH + 2 * (SCREEN_HEIGHT - 2));
    for (x, y) in [(0, 0), (SCREEN_WIDTH - 1, 0), (0, SCREEN_HEIGHT - 1), (64, SCREEN_HEIGHT - 1)] {
        assert!(grid.pixel(x, y), "({x}, {y}) should be lit");
    }
    assert!(!grid.pixel(1, 1));
    assert!(!grid.pixel(64, 32));
}
