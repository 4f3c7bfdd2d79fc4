use crate::board::square::NUM_SQUARES;

pub const NUM_PIECE_CLASSES: usize = 6;

/// The six piece classes of Murus Gallicus: three piece kinds for each side.
/// Discriminants fix the order of the per-class blocks in the feature vector.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Piece {
    GaulWall=0,
    GaulTower=1,
    GaulCatapult=2,
    RomanWall=3,
    RomanTower=4,
    RomanCatapult=5
}

impl Piece {
    pub const LIMIT: u8 = NUM_PIECE_CLASSES as u8;

    pub const unsafe fn from(piece_number: u8) -> Piece {
        assert!(piece_number < Piece::LIMIT, "Piece number out of bounds");
        std::mem::transmute::<u8, Piece>(piece_number)
    }

    pub const fn from_char(c: char) -> Option<Piece> {
        match c {
            'w' => Some(Piece::GaulWall),
            't' => Some(Piece::GaulTower),
            'c' => Some(Piece::GaulCatapult),
            'W' => Some(Piece::RomanWall),
            'T' => Some(Piece::RomanTower),
            'C' => Some(Piece::RomanCatapult),
            _ => None
        }
    }

    pub const fn to_char(&self) -> char {
        match self {
            Piece::GaulWall => 'w',
            Piece::GaulTower => 't',
            Piece::GaulCatapult => 'c',
            Piece::RomanWall => 'W',
            Piece::RomanTower => 'T',
            Piece::RomanCatapult => 'C'
        }
    }

    /// Offset of this class's 56-entry block in the feature vector.
    pub const fn block_offset(&self) -> usize {
        *self as usize * NUM_SQUARES
    }

    pub fn iter_all() -> impl Iterator<Item = Piece> {
        (0..Piece::LIMIT).map(|n| unsafe { Piece::from(n) })
    }
}
