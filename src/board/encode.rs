use crate::board::piece::{Piece, NUM_PIECE_CLASSES};
use crate::board::square::{NUM_SQUARES, TRAVERSAL_SQUARES};

pub const NUM_BOARD_BITS: usize = NUM_PIECE_CLASSES * NUM_SQUARES; // 336 occupancy bits, one 56-entry block per piece class
pub const NUM_FEATURE_BITS: usize = NUM_BOARD_BITS + 1; // + 1 side-to-move bit
pub const SIDE_TO_MOVE_BIT: usize = NUM_BOARD_BITS;

const RANK_DELIMITER: char = '/';
/// Side-to-move token of the second player (Romans).
const SECOND_PLAYER_TOKEN: &str = "r";

pub type FeatureVector = [f32; NUM_FEATURE_BITS];

/// Encodes a board token (`<rank-groups> <side-to-move>`) into its feature
/// vector. Total and deterministic: every input produces a vector. Digits
/// advance the square cursor by their run length, the rank delimiter is
/// skipped, and any other character consumes one square; recognized piece
/// characters set the bit at `block_offset + canonical index`, unrecognized
/// ones set nothing. Ill-formed tokens (wrong total square count, unknown
/// characters) are tolerated silently and yield under- or over-populated
/// vectors; a cursor that runs past the last square stops placing pieces.
pub fn encode(token: &str) -> FeatureVector {
    let mut fields = token.split_whitespace();
    let board = fields.next().unwrap_or("");
    let side_to_move = fields.next().unwrap_or("");

    let mut features = [0.0; NUM_FEATURE_BITS];
    let mut square_cursor = 0usize;
    for c in board.chars() {
        if let Some(run_length) = c.to_digit(10) {
            square_cursor += run_length as usize;
        } else if c != RANK_DELIMITER {
            if square_cursor < NUM_SQUARES {
                if let Some(piece) = Piece::from_char(c) {
                    features[piece.block_offset() + TRAVERSAL_SQUARES[square_cursor] as usize] = 1.0;
                }
            }
            square_cursor += 1;
        }
    }
    if side_to_move != SECOND_PLAYER_TOKEN {
        features[SIDE_TO_MOVE_BIT] = 1.0;
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::square::Square;

    const EMPTY_BOARD: &str = "8/8/8/8/8/8/8";

    fn num_set_bits(features: &FeatureVector) -> usize {
        features.iter().filter(|&&v| v == 1.0).count()
    }

    #[test]
    fn test_empty_board_second_player_to_move() {
        let features = encode("8/8/8/8/8/8/8 r");
        assert_eq!(features.len(), NUM_FEATURE_BITS);
        assert!(features.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_empty_board_first_player_to_move() {
        let features = encode("8/8/8/8/8/8/8 g");
        assert_eq!(features[SIDE_TO_MOVE_BIT], 1.0);
        assert_eq!(num_set_bits(&features), 1);
    }

    #[test]
    fn test_single_piece_on_first_scanned_square() {
        // A Gaul wall on a7, the first square the scan visits.
        let features = encode("w7/8/8/8/8/8/8 r");
        assert_eq!(features[Square::A7 as usize], 1.0);
        assert_eq!(Square::A7 as usize, 6);
        assert_eq!(num_set_bits(&features), 1);
    }

    #[test]
    fn test_piece_class_blocks() {
        // One piece per class, all on a7.
        for piece in Piece::iter_all() {
            let token = format!("{}7/8/8/8/8/8/8 r", piece.to_char());
            let features = encode(&token);
            assert_eq!(features[piece.block_offset() + Square::A7 as usize], 1.0);
            assert_eq!(num_set_bits(&features), 1);
        }
    }

    #[test]
    fn test_digit_runs_position_the_cursor() {
        // Three empty squares, then a Roman tower on d4 (traversal row 3, column 3).
        let features = encode("8/8/8/3T4/8/8/8 r");
        assert_eq!(features[Piece::RomanTower.block_offset() + Square::D4 as usize], 1.0);
        assert_eq!(num_set_bits(&features), 1);
    }

    #[test]
    fn test_set_bit_count_matches_piece_count() {
        let features = encode("tttttttt/8/8/8/8/8/TTTTTTTT g");
        assert_eq!(num_set_bits(&features), 16 + 1);
        let gaul_block = &features[Piece::GaulTower.block_offset()..Piece::GaulCatapult.block_offset()];
        assert_eq!(gaul_block.iter().sum::<f32>(), 8.0);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let token = "t1c4t/8/2W5/8/8/8/T6C r";
        assert_eq!(encode(token), encode(token));
    }

    #[test]
    fn test_unrecognized_characters_consume_a_square() {
        // 'x' is no piece class; it occupies a square but sets no bit.
        let with_unknown = encode("xw6/8/8/8/8/8/8 r");
        let shifted = encode("1w6/8/8/8/8/8/8 r");
        assert_eq!(with_unknown, shifted);
    }

    #[test]
    fn test_overlong_tokens_do_not_panic() {
        let features = encode("tttttttt/tttttttt/tttttttt/tttttttt/tttttttt/tttttttt/tttttttt/tttttttt r");
        assert_eq!(num_set_bits(&features), NUM_SQUARES);

        let features = encode("8/8/8/8/8/8/8/8/w r");
        assert_eq!(num_set_bits(&features), 0);
    }

    #[test]
    fn test_missing_side_field_counts_as_first_player() {
        let features = encode(EMPTY_BOARD);
        assert_eq!(features[SIDE_TO_MOVE_BIT], 1.0);
    }
}
